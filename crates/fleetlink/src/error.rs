//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text
//! and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use fleetlink_config::ConfigError;
use fleetlink_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const CONFIG: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(fleetlink::not_connected),
        help(
            "No live fleet endpoint is configured.\n\
             Set --endpoint (or FLEETLINK_ENDPOINT) and use --driver direct, registry or tunnel."
        )
    )]
    NotConnected { message: String },

    #[error("Could not connect to {target}")]
    #[diagnostic(
        code(fleetlink::connection_failed),
        help("Check that fleet (or etcd) is running and reachable at {target}.\n{reason}")
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("SSH tunnel to {target} failed")]
    #[diagnostic(
        code(fleetlink::tunnel),
        help("{reason}\nCheck --tunnel, --ssh-username and your SSH agent or --ssh-identity-file.")
    )]
    Tunnel { target: String, reason: String },

    #[error("{message}")]
    #[diagnostic(
        code(fleetlink::timeout),
        help("Raise --request-timeout or --ssh-timeout, or check the cluster's responsiveness.")
    )]
    Timeout { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Unit '{name}' not found")]
    #[diagnostic(
        code(fleetlink::not_found),
        help("Run: fleetlink units list to see submitted units")
    )]
    UnitNotFound { name: String },

    #[error("{message}")]
    #[diagnostic(code(fleetlink::not_found))]
    NotFound { message: String },

    #[error("{message}")]
    #[diagnostic(code(fleetlink::conflict))]
    Conflict { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("fleet error: {message}")]
    #[diagnostic(code(fleetlink::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    #[diagnostic(code(fleetlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(fleetlink::config),
        help("Check the endpoint and TLS settings. Run: fleetlink config show")
    )]
    Config { message: String },

    #[error(transparent)]
    #[diagnostic(code(fleetlink::settings))]
    Settings(#[from] ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error("Cannot read {path}: {source}")]
    #[diagnostic(code(fleetlink::io))]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not serialize output: {0}")]
    #[diagnostic(code(fleetlink::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotConnected { .. } | Self::ConnectionFailed { .. } | Self::Tunnel { .. } => {
                exit_code::CONNECTION
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::UnitNotFound { .. } | Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Config { .. } | Self::Settings(_) => exit_code::CONFIG,
            Self::Api { .. } | Self::ReadFile { .. } | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        if err.is_config_error() {
            return Self::Config {
                message: err.to_string(),
            };
        }

        match err {
            e @ CoreError::NotConnected { .. } => Self::NotConnected {
                message: e.to_string(),
            },
            CoreError::ConnectionFailed { target, reason } => {
                Self::ConnectionFailed { target, reason }
            }
            CoreError::Tunnel { target, reason } => Self::Tunnel { target, reason },
            e @ CoreError::Timeout { .. } => Self::Timeout {
                message: e.to_string(),
            },
            CoreError::NotFound { message } => Self::NotFound { message },
            CoreError::Conflict { message } => Self::Conflict { message },
            CoreError::InvalidUnit { message } => Self::Validation {
                field: "unit file".into(),
                reason: message,
            },
            other => Self::Api {
                message: other.to_string(),
            },
        }
    }
}
