use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// fleet release whose registry layout this crate reads and writes.
pub const LINKED_FLEET_VERSION: &str = "0.11.5";

/// A fleet daemon version as advertised in the machine registry.
///
/// Ordered by semantic version precedence: numeric core first, then a
/// pre-release sorts before the matching release. Build metadata is kept
/// for display but ignored when comparing.
#[derive(Debug, Clone)]
pub struct DaemonVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<String>,
    build: Option<String>,
}

impl DaemonVersion {
    /// The version this crate was built against.
    pub fn linked() -> Self {
        // Constant input; a parse failure here is a bad constant.
        LINKED_FLEET_VERSION.parse().unwrap_or(Self {
            major: 0,
            minor: 0,
            patch: 0,
            pre: Vec::new(),
            build: None,
        })
    }
}

/// Version text that is not `MAJOR.MINOR.PATCH[-PRE][+BUILD]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version {0:?}")]
pub struct ParseVersionError(String);

impl FromStr for DaemonVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseVersionError(s.to_owned());
        let text = s.trim();
        let text = text.strip_prefix('v').unwrap_or(text);

        let (text, build) = match text.split_once('+') {
            Some((head, build)) => (head, Some(build.to_owned())),
            None => (text, None),
        };
        let (core, pre) = match text.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (text, None),
        };

        let mut parts = core.split('.');
        let mut number = || -> Result<u64, ParseVersionError> {
            parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)
        };
        let (major, minor, patch) = (number()?, number()?, number()?);
        if parts.next().is_some() {
            return Err(invalid());
        }

        let pre = match pre {
            Some(pre) => {
                let ids: Vec<String> = pre.split('.').map(str::to_owned).collect();
                if ids.iter().any(String::is_empty) {
                    return Err(invalid());
                }
                ids
            }
            None => Vec::new(),
        };

        Ok(Self {
            major,
            minor,
            patch,
            pre,
            build,
        })
    }
}

impl fmt::Display for DaemonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre.join("."))?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{build}")?;
        }
        Ok(())
    }
}

impl PartialEq for DaemonVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DaemonVersion {}

impl PartialOrd for DaemonVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DaemonVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => compare_pre(&self.pre, &other.pre),
            })
    }
}

// Numeric identifiers compare numerically and sort below alphanumeric ones.
fn compare_pre(a: &[String], b: &[String]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

// ── Mismatch warning ────────────────────────────────────────────────

/// The cluster runs a newer fleet than the one this crate links against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMismatch {
    pub linked: DaemonVersion,
    pub latest: DaemonVersion,
}

impl VersionMismatch {
    /// `Some` when `latest` is strictly newer than `linked`.
    pub fn check(linked: DaemonVersion, latest: DaemonVersion) -> Option<Self> {
        (latest > linked).then_some(Self { linked, latest })
    }
}

const BANNER: &str = "####################################################################";

impl fmt::Display for VersionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{BANNER}")?;
        writeln!(
            f,
            "WARNING: The linked fleet client ({}) is older than the latest",
            self.linked
        )?;
        writeln!(
            f,
            "registered version of fleet found in the cluster ({}). You are strongly",
            self.latest
        )?;
        writeln!(
            f,
            "recommended to upgrade the fleet client and rebuild to prevent"
        )?;
        writeln!(f, "incompatibility issues.")?;
        write!(f, "{BANNER}")
    }
}
