//! SSH tunnel client.
//!
//! Wraps an authenticated `russh` session to a bastion host and exposes the
//! two connectors the transports need: a direct-tcpip channel to an
//! arbitrary remote address, and a remote command whose stdio is used as a
//! byte stream (how a remote Unix socket is proxied through
//! `fleetctl fd-forward`).
//!
//! The session lives as long as the [`SshTunnel`]; dropping the last
//! handle tears it down.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::agent::client::AgentClient;
use russh::keys::{HashAlg, PrivateKeyWithHashAlg, PublicKey};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::retry::retry;
use crate::transport::BoxedStream;

/// Port appended to tunnel targets that carry none.
pub const DEFAULT_SSH_PORT: u16 = 22;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SshError {
    #[error("SSH connection to {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    #[error("SSH connection to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid SSH target {0:?}")]
    InvalidTarget(String),

    #[error(
        "host key for {host} does not match {path}:{line}; \
         the remote host identification has changed"
    )]
    HostKeyMismatch {
        host: String,
        path: PathBuf,
        line: usize,
    },

    #[error(
        "host key for {host}:{port} ({fingerprint}) is not in {path}; \
         add it to the known-hosts file or disable strict host key checking"
    )]
    UnknownHostKey {
        host: String,
        port: u16,
        fingerprint: String,
        path: PathBuf,
    },

    #[error("SSH authentication as {username} failed: {reason}")]
    Authentication { username: String, reason: String },

    #[error("SSH agent unavailable: {0}")]
    Agent(String),

    #[error("SSH key error: {0}")]
    Keys(#[from] russh::keys::Error),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),
}

impl SshError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Connect { source, .. } => source.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

// ── Target parsing ──────────────────────────────────────────────────

/// Append the default SSH port to a target that has none.
pub fn normalize_target(target: &str) -> String {
    if target.contains(':') {
        target.to_owned()
    } else {
        format!("{target}:{DEFAULT_SSH_PORT}")
    }
}

fn split_target(target: &str) -> Result<(String, u16), SshError> {
    let normalized = normalize_target(target);
    let (host, port) = normalized
        .rsplit_once(':')
        .ok_or_else(|| SshError::InvalidTarget(target.to_owned()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(SshError::InvalidTarget(target.to_owned()));
    }
    let port = port
        .parse()
        .map_err(|_| SshError::InvalidTarget(target.to_owned()))?;
    Ok((host.to_owned(), port))
}

// ── Host key verification ───────────────────────────────────────────

/// Verifies remote host keys against a persisted known-hosts file.
///
/// Unknown hosts and changed keys both fail closed. The file is never
/// written; hosts are added with the usual ssh tooling.
#[derive(Debug, Clone)]
pub struct HostKeyChecker {
    known_hosts: PathBuf,
}

impl HostKeyChecker {
    pub fn new(known_hosts: impl Into<PathBuf>) -> Self {
        Self {
            known_hosts: known_hosts.into(),
        }
    }

    /// Check `key` for `host:port` against the known-hosts file.
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> Result<(), SshError> {
        let known = if self.known_hosts.exists() {
            match russh::keys::check_known_hosts_path(host, port, key, &self.known_hosts) {
                Ok(known) => known,
                Err(russh::keys::Error::KeyChanged { line }) => {
                    return Err(SshError::HostKeyMismatch {
                        host: host.to_owned(),
                        path: self.known_hosts.clone(),
                        line,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            false
        };

        if known {
            return Ok(());
        }
        let fingerprint = key.fingerprint(HashAlg::Sha256).to_string();
        warn!(
            host,
            port,
            %fingerprint,
            known_hosts = %self.known_hosts.display(),
            "rejecting unknown host key"
        );
        Err(SshError::UnknownHostKey {
            host: host.to_owned(),
            port,
            fingerprint,
            path: self.known_hosts.clone(),
        })
    }
}

struct TunnelHandler {
    host: String,
    port: u16,
    checker: Option<HostKeyChecker>,
}

impl client::Handler for TunnelHandler {
    type Error = SshError;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, SshError> {
        match &self.checker {
            Some(checker) => checker
                .verify(&self.host, self.port, server_public_key)
                .map(|()| true),
            None => Ok(true),
        }
    }
}

// ── Tunnel ──────────────────────────────────────────────────────────

/// Everything needed to establish a tunnel.
#[derive(Debug, Clone)]
pub struct SshOptions {
    pub username: String,
    /// `host` or `host:port` of the bastion.
    pub target: String,
    /// `None` disables host key verification.
    pub host_key_checker: Option<HostKeyChecker>,
    /// Bound on TCP connect, handshake and authentication together.
    pub timeout: Duration,
    /// Private key to authenticate with; the SSH agent is used when unset.
    pub identity_file: Option<PathBuf>,
}

/// An authenticated SSH session to a tunnel host.
pub struct SshTunnel {
    handle: client::Handle<TunnelHandler>,
    target: String,
}

impl std::fmt::Debug for SshTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTunnel")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl SshTunnel {
    /// Establish a tunnel, retrying timed-out attempts up to `max_attempts`.
    pub async fn connect_with_retry(options: &SshOptions, max_attempts: u32) -> Result<Self, Error> {
        retry(max_attempts, || Self::connect(options)).await
    }

    /// Make a single bounded attempt at establishing a tunnel.
    pub async fn connect(options: &SshOptions) -> Result<Self, Error> {
        let target = normalize_target(&options.target);
        match tokio::time::timeout(options.timeout, Self::establish(options, &target)).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(SshError::Timeout {
                target,
                timeout: options.timeout,
            }
            .into()),
        }
    }

    async fn establish(options: &SshOptions, target: &str) -> Result<Self, SshError> {
        let (host, port) = split_target(target)?;
        debug!(%target, username = %options.username, "dialing SSH tunnel host");

        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|source| SshError::Connect {
                target: target.to_owned(),
                source,
            })?;

        let handler = TunnelHandler {
            host,
            port,
            checker: options.host_key_checker.clone(),
        };
        let config = Arc::new(client::Config::default());
        let mut handle = client::connect_stream(config, stream, handler).await?;

        match &options.identity_file {
            Some(path) => authenticate_with_key(&mut handle, &options.username, path).await?,
            None => authenticate_with_agent(&mut handle, &options.username).await?,
        }

        info!(%target, "SSH tunnel established");
        Ok(Self {
            handle,
            target: target.to_owned(),
        })
    }

    /// The `host:port` this tunnel is connected to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Open a stream to `host:port` as seen from the tunnel host.
    pub async fn dial_tcp(&self, host: &str, port: u16) -> Result<BoxedStream, Error> {
        debug!(tunnel = %self.target, %host, port, "opening direct-tcpip channel");
        let channel = self
            .handle
            .channel_open_direct_tcpip(host, u32::from(port), "127.0.0.1", 0)
            .await
            .map_err(SshError::from)?;
        Ok(Box::new(channel.into_stream()))
    }

    /// Run `command` on the tunnel host and use its stdio as a stream.
    pub async fn dial_command(&self, command: &str) -> Result<BoxedStream, Error> {
        debug!(tunnel = %self.target, %command, "starting remote proxy command");
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(SshError::from)?;
        channel
            .exec(true, command)
            .await
            .map_err(SshError::from)?;
        Ok(Box::new(channel.into_stream()))
    }

    /// Politely end the session.
    pub async fn close(&self) -> Result<(), Error> {
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(SshError::from)?;
        Ok(())
    }
}

async fn authenticate_with_key(
    handle: &mut client::Handle<TunnelHandler>,
    username: &str,
    path: &Path,
) -> Result<(), SshError> {
    let key = russh::keys::load_secret_key(path, None)?;
    let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
    let result = handle
        .authenticate_publickey(username, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
        .await?;
    if result.success() {
        Ok(())
    } else {
        Err(SshError::Authentication {
            username: username.to_owned(),
            reason: format!("key {} was rejected", path.display()),
        })
    }
}

async fn authenticate_with_agent(
    handle: &mut client::Handle<TunnelHandler>,
    username: &str,
) -> Result<(), SshError> {
    let mut agent = AgentClient::connect_env()
        .await
        .map_err(|e| SshError::Agent(e.to_string()))?;
    let identities = agent
        .request_identities()
        .await
        .map_err(|e| SshError::Agent(e.to_string()))?;
    if identities.is_empty() {
        return Err(SshError::Authentication {
            username: username.to_owned(),
            reason: "the SSH agent holds no identities".into(),
        });
    }

    let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
    for key in identities {
        let result = handle
            .authenticate_publickey_with(username, key, hash_alg, &mut agent)
            .await
            .map_err(|e| SshError::Agent(e.to_string()))?;
        if result.success() {
            return Ok(());
        }
    }
    Err(SshError::Authentication {
        username: username.to_owned(),
        reason: "no agent identity was accepted".into(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fixture_key(name: &str) -> PublicKey {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures/ssh")
            .join(name);
        let line = std::fs::read_to_string(path).unwrap();
        PublicKey::from_openssh(line.trim()).unwrap()
    }

    #[test]
    fn default_port_is_appended() {
        assert_eq!(normalize_target("bastion.example.com"), "bastion.example.com:22");
        assert_eq!(normalize_target("10.0.0.5:2222"), "10.0.0.5:2222");
    }

    #[test]
    fn targets_split_into_host_and_port() {
        assert_eq!(split_target("core-01").unwrap(), ("core-01".into(), 22));
        assert_eq!(split_target("core-01:2200").unwrap(), ("core-01".into(), 2200));
        assert!(matches!(
            split_target("core-01:ssh"),
            Err(SshError::InvalidTarget(_))
        ));
        assert!(matches!(split_target(":22"), Err(SshError::InvalidTarget(_))));
    }

    #[test]
    fn unknown_host_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let known_hosts = dir.path().join("known_hosts");
        let key = fixture_key("host_a.pub");
        let checker = HostKeyChecker::new(&known_hosts);

        let err = checker.verify("10.0.0.5", 22, &key).unwrap_err();
        assert!(matches!(
            err,
            SshError::UnknownHostKey { ref host, port: 22, ref fingerprint, .. }
                if host == "10.0.0.5" && fingerprint.starts_with("SHA256:")
        ));
        assert!(!known_hosts.exists());

        russh::keys::known_hosts::learn_known_hosts_path("10.0.0.6", 22, &key, &known_hosts).unwrap();
        let err = checker.verify("10.0.0.5", 22, &key).unwrap_err();
        assert!(matches!(err, SshError::UnknownHostKey { .. }));
        assert!(err.to_string().contains("known_hosts"));
    }

    #[test]
    fn matching_key_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let known_hosts = dir.path().join("known_hosts");
        let key = fixture_key("host_a.pub");
        russh::keys::known_hosts::learn_known_hosts_path("10.0.0.5", 22, &key, &known_hosts).unwrap();

        let checker = HostKeyChecker::new(&known_hosts);
        checker.verify("10.0.0.5", 22, &key).unwrap();
    }

    #[test]
    fn changed_key_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let known_hosts = dir.path().join("known_hosts");
        russh::keys::known_hosts::learn_known_hosts_path("10.0.0.5", 22, &fixture_key("host_a.pub"), &known_hosts)
            .unwrap();
        let before = std::fs::read_to_string(&known_hosts).unwrap();

        let checker = HostKeyChecker::new(&known_hosts);
        let err = checker
            .verify("10.0.0.5", 22, &fixture_key("host_b.pub"))
            .unwrap_err();

        assert!(matches!(err, SshError::HostKeyMismatch { ref host, .. } if host == "10.0.0.5"));
        assert_eq!(std::fs::read_to_string(&known_hosts).unwrap(), before);
    }

    #[test]
    fn timeouts_are_classified() {
        let timeout = SshError::Timeout {
            target: "core-01:22".into(),
            timeout: Duration::from_secs(10),
        };
        assert!(timeout.is_timeout());
        assert!(Error::from(timeout).is_timeout());

        let refused = SshError::Connect {
            target: "core-01:22".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert!(!refused.is_timeout());

        let auth = SshError::Authentication {
            username: "core".into(),
            reason: "no agent identity was accepted".into(),
        };
        assert!(!Error::from(auth).is_timeout());
    }

    #[tokio::test]
    async fn connect_times_out_against_a_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and then say nothing, so the SSH banner exchange stalls.
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let options = SshOptions {
            username: "core".into(),
            target: addr.to_string(),
            host_key_checker: None,
            timeout: Duration::from_millis(200),
            identity_file: None,
        };
        let err = SshTunnel::connect_with_retry(&options, 2).await.unwrap_err();
        assert!(err.is_timeout(), "expected a timeout, got {err}");
    }
}
