//! Configuration for fleetlink.
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! `FLEETLINK_*` environment variables. [`Settings::to_connection_config`]
//! validates the result and turns it into a
//! [`fleetlink_core::ConnectionConfig`]. The CLI overlays its own flags on
//! top before converting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fleetlink_core::{ConnectionConfig, Driver, TlsFiles};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "FLEETLINK_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Connection settings as written in the config file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// `direct`, `registry` or `tunnel`. Anything else disables the
    /// connection.
    pub driver: String,

    /// fleet API endpoint, or comma-separated etcd endpoints for the
    /// registry driver. Empty means not connected.
    pub endpoint: String,

    /// Keyspace for fleet data in etcd.
    pub registry_key_prefix: String,

    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,

    /// SSH tunnel host, `host` or `host:port`.
    pub tunnel: Option<String>,
    pub ssh_username: String,
    /// Private key for the tunnel; unset uses the SSH agent.
    pub ssh_identity_file: Option<String>,
    pub known_hosts_file: String,
    pub strict_host_key_checking: bool,

    /// Seconds, fractional.
    pub ssh_timeout: f64,
    /// Seconds, fractional.
    pub request_timeout: f64,
    pub max_connection_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            driver: "direct".into(),
            endpoint: "unix:///var/run/fleet.sock".into(),
            registry_key_prefix: "/_coreos.com/fleet/".into(),
            ca_file: None,
            cert_file: None,
            key_file: None,
            tunnel: None,
            ssh_username: "core".into(),
            ssh_identity_file: None,
            known_hosts_file: "~/.fleetctl/known_hosts".into(),
            strict_host_key_checking: true,
            ssh_timeout: 10.0,
            request_timeout: 3.0,
            max_connection_retries: 3,
        }
    }
}

impl Settings {
    /// Validate and convert into the resolver's configuration.
    pub fn to_connection_config(&self) -> Result<ConnectionConfig, ConfigError> {
        Ok(ConnectionConfig {
            driver: Driver::parse(&self.driver),
            endpoint: self.endpoint.trim().to_owned(),
            tls: TlsFiles {
                ca_file: optional_path(self.ca_file.as_deref()),
                cert_file: optional_path(self.cert_file.as_deref()),
                key_file: optional_path(self.key_file.as_deref()),
            },
            tunnel: self
                .tunnel
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned),
            ssh_username: self.ssh_username.clone(),
            ssh_identity_file: optional_path(self.ssh_identity_file.as_deref()),
            known_hosts_file: expand_tilde(&self.known_hosts_file),
            strict_host_key_checking: self.strict_host_key_checking,
            ssh_timeout: seconds("ssh_timeout", self.ssh_timeout)?,
            request_timeout: seconds("request_timeout", self.request_timeout)?,
            max_connection_retries: self.max_connection_retries,
            registry_key_prefix: self.registry_key_prefix.clone(),
        })
    }

    /// Render as TOML, the same shape the loader reads.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("expected a non-negative number of seconds, got {value}"),
    })
}

fn optional_path(value: Option<&str>) -> Option<PathBuf> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(expand_tilde)
}

/// Expand a leading `~/` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path {
        "~" => "",
        p => match p.strip_prefix("~/") {
            Some(rest) => rest,
            None => return PathBuf::from(p),
        },
    };
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "fleetlink", "fleetlink").map_or_else(
        || expand_tilde("~/.config/fleetlink/config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Layer defaults, the config file (if present), and the environment.
pub fn layered(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
}

/// Load settings from `path`, or from [`config_path`] when `None`. A
/// missing file is not an error.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    Ok(layered(&path).extract()?)
}
