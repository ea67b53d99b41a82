// ── Connectivity resolver ──
//
// Turns a `ConnectionConfig` into a `FleetClient`. Configuration problems
// (endpoint syntax, TLS material) are reported before anything touches the
// network. With no usable target the resolver hands back the placeholder
// client instead of failing, so planning can proceed without a cluster.

use std::path::PathBuf;
use std::sync::Arc;

use fleetlink_api::{
    Dialer, EtcdKeys, FleetHttpClient, RegistryClient, SshTunnel, TlsConfig, TransportConfig,
};
use percent_encoding::percent_decode_str;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::FleetClient;
use crate::config::{ConnectionConfig, Driver};
use crate::error::CoreError;
use crate::null::NullClient;

/// Base URL for requests carried over a socket. The host is never dialed;
/// it only makes the request line and logs readable.
pub const SOCKET_BASE_URL: &str = "http://domain-sock/";

/// Remote helper that relays a Unix socket over its stdio.
const FD_FORWARD: &str = "fleetctl fd-forward";

/// A parsed endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// An `http://` or `https://` URL.
    Http(Url),
    /// A `unix://` or `file://` socket path.
    Socket(PathBuf),
}

impl Endpoint {
    /// Parse one endpoint string.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        let url = Url::parse(raw).map_err(|e| match e {
            url::ParseError::RelativeUrlWithoutBase => CoreError::MissingScheme {
                endpoint: raw.to_owned(),
            },
            other => CoreError::InvalidEndpoint {
                endpoint: raw.to_owned(),
                reason: other.to_string(),
            },
        })?;

        match url.scheme() {
            "http" | "https" => Ok(Self::Http(url)),
            "unix" | "file" => {
                if let Some(host) = url.host_str().filter(|h| !h.is_empty()) {
                    return Err(CoreError::SocketHost {
                        endpoint: raw.to_owned(),
                        host: host.to_owned(),
                    });
                }
                if url.path().is_empty() || url.path() == "/" {
                    return Err(CoreError::InvalidEndpoint {
                        endpoint: raw.to_owned(),
                        reason: "no socket path".into(),
                    });
                }
                let path = percent_decode_str(url.path()).decode_utf8().map_err(|e| {
                    CoreError::InvalidEndpoint {
                        endpoint: raw.to_owned(),
                        reason: format!("socket path is not valid UTF-8: {e}"),
                    }
                })?;
                Ok(Self::Socket(PathBuf::from(path.as_ref())))
            }
            scheme => Err(CoreError::UnsupportedScheme {
                endpoint: raw.to_owned(),
                scheme: scheme.to_owned(),
            }),
        }
    }
}

fn split_endpoints(endpoint: &str) -> Vec<&str> {
    endpoint
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect()
}

// ── Resolution ──────────────────────────────────────────────────────

/// Build the client the configuration asks for.
pub async fn resolve(config: &ConnectionConfig) -> Result<FleetClient, CoreError> {
    let endpoints = split_endpoints(&config.endpoint);
    if endpoints.is_empty() {
        debug!(driver = %config.driver, "no endpoint configured, using null client");
        return Ok(NullClient.into());
    }

    let client = match config.driver {
        Driver::Null => {
            debug!("no usable driver configured, using null client");
            return Ok(NullClient.into());
        }
        Driver::Tunnel if config.tunnel_target().is_none() => {
            debug!("tunnel driver without a tunnel target, using null client");
            return Ok(NullClient.into());
        }
        Driver::Direct | Driver::Tunnel => resolve_http(config, &endpoints).await?,
        Driver::Registry => resolve_registry(config, &endpoints).await?,
    };

    info!(
        driver = %config.driver,
        backend = client.kind(),
        tunnel = config.tunnel_target().unwrap_or("-"),
        "resolved fleet client"
    );
    Ok(client)
}

async fn resolve_http(config: &ConnectionConfig, endpoints: &[&str]) -> Result<FleetClient, CoreError> {
    let Some((first, rest)) = endpoints.split_first() else {
        return Ok(NullClient.into());
    };
    if !rest.is_empty() {
        warn!(
            using = %first,
            ignored = rest.len(),
            "multiple endpoints given, only the first is used"
        );
    }

    let endpoint = Endpoint::parse(first)?;
    let tls = config.tls.load()?;
    let tunnel = open_tunnel(config).await?;

    let (dialer, base_url) = match (endpoint, tunnel) {
        (Endpoint::Http(url), None) => (Dialer::Tcp, url),
        (Endpoint::Http(url), Some(tunnel)) => (Dialer::SshTcp(tunnel), url),
        (Endpoint::Socket(path), None) => (Dialer::Unix(path), socket_base_url()?),
        (Endpoint::Socket(path), Some(tunnel)) => (
            Dialer::SshCommand {
                tunnel,
                command: format!("{FD_FORWARD} {}", path.display()),
            },
            socket_base_url()?,
        ),
    };
    debug!(?dialer, %base_url, "building fleet HTTP client");

    let transport = transport_config(config, dialer, tls).build()?;
    Ok(FleetClient::Http(FleetHttpClient::new(&base_url, transport)?))
}

async fn resolve_registry(
    config: &ConnectionConfig,
    endpoints: &[&str],
) -> Result<FleetClient, CoreError> {
    let mut urls = Vec::with_capacity(endpoints.len());
    for raw in endpoints {
        match Endpoint::parse(raw)? {
            Endpoint::Http(url) => urls.push(url),
            Endpoint::Socket(_) => {
                let scheme = raw.split(':').next().unwrap_or_default();
                return Err(CoreError::UnsupportedScheme {
                    endpoint: (*raw).to_owned(),
                    scheme: scheme.to_owned(),
                });
            }
        }
    }

    let tls = config.tls.load()?;
    let dialer = match open_tunnel(config).await? {
        Some(tunnel) => Dialer::SshTcp(tunnel),
        None => Dialer::Tcp,
    };
    let transport = transport_config(config, dialer, tls).build()?;
    let keys = EtcdKeys::new(urls, transport);
    let mut client = RegistryClient::new(keys, &config.registry_key_prefix);

    match client.check_version().await {
        Ok(Some(mismatch)) => {
            warn!("\n{mismatch}");
            client = client.with_version_warning(mismatch);
        }
        Ok(None) => debug!("registry fleet version is compatible"),
        Err(e) => warn!(error = %e, "could not determine latest fleet version in registry"),
    }

    Ok(FleetClient::Registry(client))
}

async fn open_tunnel(config: &ConnectionConfig) -> Result<Option<Arc<SshTunnel>>, CoreError> {
    let Some(target) = config.tunnel_target() else {
        return Ok(None);
    };
    let options = config.ssh_options(target);
    let tunnel = SshTunnel::connect_with_retry(&options, config.max_connection_retries)
        .await
        .map_err(|e| CoreError::tunnel(target, e))?;
    Ok(Some(Arc::new(tunnel)))
}

fn transport_config(
    config: &ConnectionConfig,
    dialer: Dialer,
    tls: Option<TlsConfig>,
) -> TransportConfig {
    TransportConfig {
        dialer,
        tls,
        timeout: config.request_timeout,
    }
}

fn socket_base_url() -> Result<Url, CoreError> {
    Url::parse(SOCKET_BASE_URL).map_err(|e| CoreError::Internal(e.to_string()))
}
