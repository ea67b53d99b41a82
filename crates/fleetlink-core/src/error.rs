// ── Core error types ──
//
// Capability-level errors from fleetlink-core. Callers never match on HTTP
// status codes or etcd error codes; the `From<fleetlink_api::Error>` impl
// translates wire-level failures into these variants.

use fleetlink_api::SshError;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error(
        "Endpoint {endpoint:?} has no URL scheme (expected http://, https://, unix:// or file://)"
    )]
    MissingScheme { endpoint: String },

    #[error("Invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error(
        "Socket endpoint {endpoint:?} has a host component ({host:?}); \
         socket paths need three slashes, e.g. unix:///var/run/fleet.sock"
    )]
    SocketHost { endpoint: String, host: String },

    #[error("Unsupported scheme {scheme:?} in endpoint {endpoint:?}")]
    UnsupportedScheme { endpoint: String, scheme: String },

    #[error("TLS configuration error: {message}")]
    Tls { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {target}: {reason}")]
    ConnectionFailed { target: String, reason: String },

    #[error("SSH tunnel to {target} failed: {reason}")]
    Tunnel { target: String, reason: String },

    #[error("Timed out: {message}")]
    Timeout { message: String },

    /// Returned by every operation of the placeholder client.
    #[error("can't {operation}: not connected to a live fleet endpoint")]
    NotConnected { operation: &'static str },

    // ── Remote errors ────────────────────────────────────────────────
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid unit definition: {message}")]
    InvalidUnit { message: String },

    #[error("Fleet error: {message}")]
    Api {
        message: String,
        /// HTTP status from the fleet API, if any.
        status: Option<u16>,
        /// etcd error code from the registry, if any.
        code: Option<u16>,
    },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Errors caused by the connection configuration itself. These are
    /// raised at resolution time, before any operation runs.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingScheme { .. }
                | Self::InvalidEndpoint { .. }
                | Self::SocketHost { .. }
                | Self::UnsupportedScheme { .. }
                | Self::Tls { .. }
                | Self::Config { .. }
        )
    }

    /// Errors from the placeholder client.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Translate a tunnel establishment failure, keeping timeouts apart.
    pub(crate) fn tunnel(target: &str, err: fleetlink_api::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                message: err.to_string(),
            };
        }
        Self::Tunnel {
            target: target.to_owned(),
            reason: err.to_string(),
        }
    }
}

// ── Conversion from wire-level errors ────────────────────────────────

impl From<fleetlink_api::Error> for CoreError {
    fn from(err: fleetlink_api::Error) -> Self {
        use fleetlink_api::Error as E;

        if err.is_timeout() {
            return CoreError::Timeout {
                message: err.to_string(),
            };
        }
        if err.is_not_found() {
            return CoreError::NotFound {
                message: err.to_string(),
            };
        }
        if err.is_conflict() {
            let message = match err {
                E::Api { message, .. } | E::Registry { message, .. } => message,
                other => other.to_string(),
            };
            return CoreError::Conflict { message };
        }

        match err {
            E::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            E::Tls(message) => CoreError::Tls { message },
            E::UnsupportedTransport(what) => CoreError::Config {
                message: format!("{what} are not supported on this platform"),
            },
            E::Transport(e) => {
                if e.is_connect() {
                    CoreError::ConnectionFailed {
                        target: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                        code: None,
                    }
                }
            }
            E::Connect { target, source } => CoreError::ConnectionFailed {
                target,
                reason: source.to_string(),
            },
            E::Protocol(message) => CoreError::ConnectionFailed {
                target: String::new(),
                reason: message,
            },
            E::Ssh(e) => {
                let target = match &e {
                    SshError::Connect { target, .. } | SshError::Timeout { target, .. } => {
                        target.clone()
                    }
                    _ => "tunnel host".into(),
                };
                CoreError::Tunnel {
                    target,
                    reason: e.to_string(),
                }
            }
            E::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
                code: None,
            },
            E::Registry {
                code,
                message,
                cause,
            } => CoreError::Api {
                message: match cause {
                    Some(cause) => format!("{message} ({cause})"),
                    None => message,
                },
                status: None,
                code: Some(code),
            },
            E::CorruptEntry { key, reason } => CoreError::Internal(format!(
                "corrupt registry entry at {key}: {reason}"
            )),
            E::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            E::UnitFile { line, reason } => CoreError::InvalidUnit {
                message: format!("line {line}: {reason}"),
            },
            E::Timeout { .. } => CoreError::Timeout {
                message: "request timed out".into(),
            },
        }
    }
}
