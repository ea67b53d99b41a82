use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::registry::etcd::{ERROR_CODE_KEY_NOT_FOUND, ERROR_CODE_NODE_EXIST};
use crate::retry::Retryable;
use crate::ssh::SshError;

/// Top-level error type for the `fleetlink-api` crate.
///
/// Covers every failure mode below the capability layer: endpoint parsing,
/// TLS material, dialing, SSH tunnels, the fleet HTTP API and the etcd
/// registry. `fleetlink-core` maps these into capability-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Configuration ───────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS material could not be read, parsed or assembled.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The selected dialer is not available on this platform.
    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(&'static str),

    // ── Transport ───────────────────────────────────────────────────
    /// Pooled HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Dialing a byte stream failed.
    #[error("Failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    /// HTTP framing failed on a dialed stream.
    #[error("HTTP protocol error: {0}")]
    Protocol(String),

    /// Request timed out.
    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    // ── SSH ─────────────────────────────────────────────────────────
    #[error(transparent)]
    Ssh(#[from] SshError),

    // ── Fleet API ───────────────────────────────────────────────────
    /// Non-success response from the fleet HTTP API.
    #[error("Fleet API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Registry ────────────────────────────────────────────────────
    /// Error envelope returned by the etcd keys API.
    #[error("Registry error {code}: {message}")]
    Registry {
        code: u16,
        message: String,
        cause: Option<String>,
    },

    /// Registry data that does not match fleet's key layout.
    #[error("Corrupt registry entry at {key}: {reason}")]
    CorruptEntry { key: String, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Unit file text could not be parsed.
    #[error("Invalid unit file at line {line}: {reason}")]
    UnitFile { line: usize, reason: String },
}

impl Error {
    /// Returns `true` if this failure was classified as a timeout by the
    /// layer that produced it.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(e) => e.is_timeout(),
            Self::Connect { source, .. } => source.kind() == io::ErrorKind::TimedOut,
            Self::Ssh(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if the remote side reported the entity as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { status: 404, .. } => true,
            Self::Registry { code, .. } => *code == ERROR_CODE_KEY_NOT_FOUND,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Returns `true` if the remote side rejected a create because the
    /// entity already exists.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Api { status: 409, .. } => true,
            Self::Registry { code, .. } => *code == ERROR_CODE_NODE_EXIST,
            _ => false,
        }
    }

    /// Returns `true` if the failure happened before any bytes reached
    /// the remote service.
    pub fn is_connect(&self) -> bool {
        match self {
            Self::Connect { .. } => true,
            Self::Transport(e) => e.is_connect(),
            _ => false,
        }
    }

    pub(crate) fn deserialization(err: &serde_json::Error, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body).into_owned();
        let preview: String = body.chars().take(200).collect();
        Self::Deserialization {
            message: format!("{err} (body preview: {preview:?})"),
            body,
        }
    }
}

impl Retryable for Error {
    fn is_timeout(&self) -> bool {
        Error::is_timeout(self)
    }
}
