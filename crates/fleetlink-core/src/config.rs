// ── Runtime connection configuration ──
//
// These types describe *how* to reach a fleet cluster. They carry paths
// and tuning but never touch disk themselves; fleetlink-config (or any
// other caller) builds a `ConnectionConfig` and hands it to the resolver.

use std::path::PathBuf;
use std::time::Duration;

use fleetlink_api::registry::DEFAULT_KEY_PREFIX;
use fleetlink_api::{HostKeyChecker, SshOptions, TlsConfig};
use strum::Display;

use crate::error::CoreError;

/// Which backend the resolver builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Driver {
    /// fleet's HTTP API.
    #[default]
    Direct,
    /// fleet's registry in etcd.
    Registry,
    /// fleet's HTTP API through an SSH tunnel; needs a tunnel target.
    Tunnel,
    /// No backend; every operation fails with a not-connected error.
    Null,
}

impl Driver {
    /// Map a driver name onto a driver. Unknown names select `Null`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "direct" | "api" => Self::Direct,
            "registry" | "etcd" => Self::Registry,
            "tunnel" => Self::Tunnel,
            _ => Self::Null,
        }
    }
}

/// Optional TLS material paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsFiles {
    pub ca_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

impl TlsFiles {
    pub fn is_empty(&self) -> bool {
        self.ca_file.is_none() && self.cert_file.is_none() && self.key_file.is_none()
    }

    /// Load the configured material; `None` when nothing is configured.
    pub fn load(&self) -> Result<Option<TlsConfig>, CoreError> {
        if self.is_empty() {
            return Ok(None);
        }
        TlsConfig::load(
            self.ca_file.as_deref(),
            self.cert_file.as_deref(),
            self.key_file.as_deref(),
        )
        .map(Some)
        .map_err(|e| CoreError::Tls {
            message: e.to_string(),
        })
    }
}

/// Everything the resolver needs to reach a fleet cluster.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub driver: Driver,
    /// One endpoint, or a comma-separated list for the registry driver.
    /// Empty means there is nothing to connect to yet.
    pub endpoint: String,
    pub tls: TlsFiles,
    /// SSH tunnel host (`host` or `host:port`).
    pub tunnel: Option<String>,
    pub ssh_username: String,
    /// Private key for the tunnel; the SSH agent is used when unset.
    pub ssh_identity_file: Option<PathBuf>,
    pub known_hosts_file: PathBuf,
    pub strict_host_key_checking: bool,
    pub ssh_timeout: Duration,
    pub request_timeout: Duration,
    pub max_connection_retries: u32,
    pub registry_key_prefix: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            driver: Driver::Direct,
            endpoint: "unix:///var/run/fleet.sock".into(),
            tls: TlsFiles::default(),
            tunnel: None,
            ssh_username: "core".into(),
            ssh_identity_file: None,
            known_hosts_file: PathBuf::from(".fleetctl/known_hosts"),
            strict_host_key_checking: true,
            ssh_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(3),
            max_connection_retries: 3,
            registry_key_prefix: DEFAULT_KEY_PREFIX.into(),
        }
    }
}

impl ConnectionConfig {
    /// The tunnel host, if one is configured.
    pub fn tunnel_target(&self) -> Option<&str> {
        self.tunnel
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub(crate) fn ssh_options(&self, target: &str) -> SshOptions {
        SshOptions {
            username: self.ssh_username.clone(),
            target: target.to_owned(),
            host_key_checker: self
                .strict_host_key_checking
                .then(|| HostKeyChecker::new(&self.known_hosts_file)),
            timeout: self.ssh_timeout,
            identity_file: self.ssh_identity_file.clone(),
        }
    }
}
