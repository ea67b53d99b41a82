// Shared transport configuration for the fleet API and registry clients.
//
// Both wire clients speak HTTP. Which byte stream carries it depends on the
// endpoint and tunnel settings: plain TCP goes through a pooled reqwest
// client, while Unix sockets and SSH channels are dialed per request and
// driven with hyper's HTTP/1.1 client connection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use reqwest::header::{CONTENT_TYPE, HOST, USER_AGENT};
use reqwest::{Method, StatusCode};
use rustls_pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};
use url::{Position, Url};

use crate::error::Error;
use crate::ssh::SshTunnel;
use crate::tls::TlsConfig;

const USER_AGENT_VALUE: &str = concat!("fleetlink/", env!("CARGO_PKG_VERSION"));

// ── Byte streams ────────────────────────────────────────────────────

/// Anything that can carry HTTP bytes in both directions.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// An owned, type-erased byte stream.
pub type BoxedStream = Box<dyn AsyncStream>;

/// How to produce a live byte stream for a logical address.
#[derive(Clone)]
pub enum Dialer {
    /// Plain TCP to the request's host and port.
    Tcp,
    /// A local Unix domain socket; the request host is ignored.
    Unix(PathBuf),
    /// A direct-tcpip channel through an SSH tunnel.
    SshTcp(Arc<SshTunnel>),
    /// The stdio of a command run on the tunnel host; the request host is
    /// ignored.
    SshCommand {
        tunnel: Arc<SshTunnel>,
        command: String,
    },
}

impl std::fmt::Debug for Dialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => f.write_str("Tcp"),
            Self::Unix(path) => f.debug_tuple("Unix").field(path).finish(),
            Self::SshTcp(tunnel) => f.debug_tuple("SshTcp").field(&tunnel.target()).finish(),
            Self::SshCommand { tunnel, command } => f
                .debug_struct("SshCommand")
                .field("tunnel", &tunnel.target())
                .field("command", command)
                .finish(),
        }
    }
}

impl Dialer {
    /// Open a stream for `host:port`.
    pub async fn dial(&self, host: &str, port: u16) -> Result<BoxedStream, Error> {
        match self {
            Self::Tcp => {
                debug!(%host, port, "dialing TCP");
                let stream = TcpStream::connect((host, port))
                    .await
                    .map_err(|source| Error::Connect {
                        target: format!("{host}:{port}"),
                        source,
                    })?;
                Ok(Box::new(stream))
            }
            Self::Unix(path) => dial_unix(path).await,
            Self::SshTcp(tunnel) => tunnel.dial_tcp(host, port).await,
            Self::SshCommand { tunnel, command } => tunnel.dial_command(command).await,
        }
    }

    /// The SSH tunnel backing this dialer, if any.
    pub fn tunnel(&self) -> Option<&Arc<SshTunnel>> {
        match self {
            Self::SshTcp(tunnel) | Self::SshCommand { tunnel, .. } => Some(tunnel),
            Self::Tcp | Self::Unix(_) => None,
        }
    }
}

#[cfg(unix)]
async fn dial_unix(path: &std::path::Path) -> Result<BoxedStream, Error> {
    debug!(path = %path.display(), "dialing Unix socket");
    let stream = tokio::net::UnixStream::connect(path)
        .await
        .map_err(|source| Error::Connect {
            target: path.display().to_string(),
            source,
        })?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn dial_unix(_path: &std::path::Path) -> Result<BoxedStream, Error> {
    Err(Error::UnsupportedTransport("Unix domain sockets"))
}

// ── Requests & responses ────────────────────────────────────────────

/// A buffered HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<(&'static str, Bytes)>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
        }
    }

    /// Attach a JSON body.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Result<Self, Error> {
        let bytes = serde_json::to_vec(value).map_err(|e| Error::Deserialization {
            message: format!("failed to encode request body: {e}"),
            body: String::new(),
        })?;
        self.body = Some(("application/json", Bytes::from(bytes)));
        Ok(self)
    }

    /// Attach a form-encoded body.
    pub fn form(mut self, pairs: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.body = Some(("application/x-www-form-urlencoded", Bytes::from(encoded)));
        self
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

// ── Transport configuration ─────────────────────────────────────────

/// Shared transport configuration for building HTTP transports.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub dialer: Dialer,
    /// `None` keeps the target's defaults (plaintext, or web PKI roots).
    pub tls: Option<TlsConfig>,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            dialer: Dialer::Tcp,
            tls: None,
            timeout: Duration::from_secs(3),
        }
    }
}

impl TransportConfig {
    /// Build an [`HttpTransport`] from this config.
    ///
    /// Plain TCP gets a pooled reqwest client; every other dialer is driven
    /// through hyper over the dialed stream.
    pub fn build(&self) -> Result<HttpTransport, Error> {
        let backend = match &self.dialer {
            Dialer::Tcp => {
                let mut builder = reqwest::Client::builder()
                    .timeout(self.timeout)
                    .user_agent(USER_AGENT_VALUE);
                if let Some(ref tls) = self.tls {
                    builder = builder.use_preconfigured_tls((*tls.client_config()).clone());
                }
                let client = builder.build().map_err(|e| {
                    if self.tls.is_some() {
                        Error::Tls(format!("HTTP client rejected the TLS configuration: {e}"))
                    } else {
                        Error::Protocol(format!("failed to build HTTP client: {e}"))
                    }
                })?;
                Backend::Pooled(client)
            }
            dialer => {
                let tls = match &self.tls {
                    Some(tls) => tls.clone(),
                    None => TlsConfig::system_default()?,
                };
                Backend::Dialed {
                    dialer: dialer.clone(),
                    tls: TlsConnector::from(tls.client_config()),
                }
            }
        };
        Ok(HttpTransport {
            backend,
            timeout: self.timeout,
        })
    }

    /// Build a transport that dials every request itself, even over TCP.
    #[cfg(test)]
    fn build_dialed(&self) -> Result<HttpTransport, Error> {
        let tls = match &self.tls {
            Some(tls) => tls.clone(),
            None => TlsConfig::system_default()?,
        };
        Ok(HttpTransport {
            backend: Backend::Dialed {
                dialer: self.dialer.clone(),
                tls: TlsConnector::from(tls.client_config()),
            },
            timeout: self.timeout,
        })
    }
}

// ── Transport ───────────────────────────────────────────────────────

/// An HTTP transport bound to one dialing strategy.
#[derive(Clone)]
pub struct HttpTransport {
    backend: Backend,
    timeout: Duration,
}

#[derive(Clone)]
enum Backend {
    Pooled(reqwest::Client),
    Dialed { dialer: Dialer, tls: TlsConnector },
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            Backend::Pooled(_) => "pooled".to_owned(),
            Backend::Dialed { dialer, .. } => format!("dialed({dialer:?})"),
        };
        f.debug_struct("HttpTransport")
            .field("backend", &backend)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpTransport {
    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The dialer, for transports that dial their own streams.
    pub fn dialer(&self) -> Option<&Dialer> {
        match &self.backend {
            Backend::Pooled(_) => None,
            Backend::Dialed { dialer, .. } => Some(dialer),
        }
    }

    /// Send a request and buffer the whole response.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        debug!("{} {}", request.method, request.url);
        let response = match &self.backend {
            Backend::Pooled(client) => self.send_pooled(client, request).await?,
            Backend::Dialed { dialer, tls } => {
                tokio::time::timeout(self.timeout, send_dialed(dialer, tls, request))
                    .await
                    .map_err(|_| Error::Timeout {
                        timeout: self.timeout,
                    })??
            }
        };
        trace!(status = %response.status, bytes = response.body.len(), "response received");
        Ok(response)
    }

    async fn send_pooled(
        &self,
        client: &reqwest::Client,
        request: HttpRequest,
    ) -> Result<HttpResponse, Error> {
        let mut builder = client.request(request.method, request.url);
        if let Some((content_type, body)) = request.body {
            builder = builder.header(CONTENT_TYPE, content_type).body(body);
        }
        let resp = builder.send().await.map_err(|e| self.classify(e))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| self.classify(e))?;
        Ok(HttpResponse { status, body })
    }

    fn classify(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout: self.timeout,
            }
        } else {
            Error::Transport(err)
        }
    }
}

async fn send_dialed(
    dialer: &Dialer,
    tls: &TlsConnector,
    request: HttpRequest,
) -> Result<HttpResponse, Error> {
    let url = &request.url;
    let host = url.host_str().unwrap_or_default().to_owned();
    let port = url.port_or_known_default().unwrap_or(80);

    let stream = dialer.dial(&host, port).await?;
    let stream: BoxedStream = if url.scheme() == "https" {
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| Error::Tls(format!("invalid TLS server name {host:?}: {e}")))?;
        let tls_stream = tls
            .connect(server_name, stream)
            .await
            .map_err(|e| Error::Tls(format!("TLS handshake with {host} failed: {e}")))?;
        Box::new(tls_stream)
    } else {
        stream
    };

    let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| Error::Protocol(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            trace!(error = %e, "dialed HTTP connection closed with error");
        }
    });

    let authority = &url[Position::BeforeHost..Position::AfterPort];
    let path = &url[Position::BeforePath..Position::AfterQuery];
    let mut builder = http::Request::builder()
        .method(request.method.clone())
        .uri(path)
        .header(HOST, authority)
        .header(USER_AGENT, USER_AGENT_VALUE);
    let body = match request.body {
        Some((content_type, body)) => {
            builder = builder.header(CONTENT_TYPE, content_type);
            body
        }
        None => Bytes::new(),
    };
    let req = builder
        .body(Full::new(body))
        .map_err(|e| Error::Protocol(e.to_string()))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| Error::Protocol(e.to_string()))?;
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| Error::Protocol(e.to_string()))?
        .to_bytes();
    Ok(HttpResponse { status, body })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn dialed_tcp_round_trip() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/echo"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({ "hello": "fleet" })))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .expect(1)
            .mount(&server)
            .await;

        let transport = TransportConfig::default().build_dialed().unwrap();
        assert!(matches!(transport.dialer(), Some(Dialer::Tcp)));

        let url = Url::parse(&format!("{}/echo", server.uri())).unwrap();
        let resp = transport
            .send(
                HttpRequest::new(Method::PUT, url)
                    .json(&json!({ "hello": "fleet" }))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status.as_u16(), 201);
        assert_eq!(&resp.body[..], b"created");
    }

    #[test]
    fn pooled_build_accepts_client_identity() {
        let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tls");
        let tls = TlsConfig::load(
            Some(&fixtures.join("ca.pem")),
            Some(&fixtures.join("client.pem")),
            Some(&fixtures.join("client.key")),
        )
        .unwrap();
        let transport = TransportConfig {
            tls: Some(tls),
            ..TransportConfig::default()
        }
        .build()
        .unwrap();
        assert!(transport.dialer().is_none());
    }
}
