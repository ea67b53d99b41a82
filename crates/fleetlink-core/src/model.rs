// ── Domain model ──
//
// Units as the reconciliation layer sees them: named sections holding
// ordered options. The wire layer flattens these into (section, name,
// value) triples; see `convert`.

use serde::{Deserialize, Serialize};

pub use fleetlink_api::models::{JobState, Machine, UnitState};

/// One `Name=Value` entry inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOption {
    pub name: String,
    pub value: String,
}

impl UnitOption {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A `[Section]` of a unit file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSection {
    pub name: String,
    pub options: Vec<UnitOption>,
}

impl UnitSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(UnitOption::new(name, value));
        self
    }
}

/// A unit known to (or destined for) the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// Stable identity.
    pub name: String,
    pub desired_state: JobState,
    pub sections: Vec<UnitSection>,
    /// Observed state; lags `desired_state` while the scheduler catches up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<JobState>,
    /// Machine the unit is scheduled to; `None` when unscheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
}

impl Unit {
    pub fn new(name: impl Into<String>, desired_state: JobState) -> Self {
        Self {
            name: name.into(),
            desired_state,
            sections: Vec::new(),
            current_state: None,
            machine_id: None,
        }
    }

    pub fn with_section(mut self, section: UnitSection) -> Self {
        self.sections.push(section);
        self
    }

    /// First section with this name.
    pub fn section(&self, name: &str) -> Option<&UnitSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Value of the first matching option.
    pub fn option(&self, section: &str, name: &str) -> Option<&str> {
        self.section(section)?
            .options
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.value.as_str())
    }
}
