// Minimal etcd v2 keys API client.
//
// Only what fleet's registry layout needs: get (optionally recursive and
// sorted), set with an optional prevExist precondition, and delete. Every
// configured endpoint is a cluster member; connection failures fail over
// to the next one in order.

use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// etcd error code: the key does not exist.
pub const ERROR_CODE_KEY_NOT_FOUND: u16 = 100;
/// etcd error code: a `prevExist=false` write found the key present.
pub const ERROR_CODE_NODE_EXIST: u16 = 105;

// ── Wire types ──────────────────────────────────────────────────────

/// One key or directory in the keyspace.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub dir: bool,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub modified_index: u64,
}

impl Node {
    /// Last path segment of the key.
    pub fn name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Direct child whose last key segment is `name`.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name() == name)
    }
}

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Node,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error_code: u16,
    message: String,
    #[serde(default)]
    cause: Option<String>,
}

/// Precondition for [`EtcdKeys::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrevExist {
    #[default]
    Any,
    /// Fail with [`ERROR_CODE_KEY_NOT_FOUND`] unless the key exists.
    MustExist,
    /// Fail with [`ERROR_CODE_NODE_EXIST`] if the key exists.
    MustNotExist,
}

// ── Client ───────────────────────────────────────────────────────────

/// etcd v2 keys API over an ordered list of cluster endpoints.
#[derive(Debug, Clone)]
pub struct EtcdKeys {
    transport: HttpTransport,
    endpoints: Vec<Url>,
}

impl EtcdKeys {
    pub fn new(endpoints: Vec<Url>, transport: HttpTransport) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    fn key_url(endpoint: &Url, key: &str) -> Result<Url, Error> {
        let mut url = endpoint.clone();
        url.set_query(None);
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase)
            })?;
            segments.pop_if_empty().push("v2").push("keys");
            segments.extend(key.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    /// Send to each endpoint in turn until one answers.
    async fn send<F>(&self, key: &str, build: F) -> Result<HttpResponse, Error>
    where
        F: Fn(Url) -> HttpRequest,
    {
        let mut last_err = None;
        for endpoint in &self.endpoints {
            let request = build(Self::key_url(endpoint, key)?);
            match self.transport.send(request).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_connect() => {
                    warn!(%endpoint, error = %e, "etcd endpoint unreachable, trying next");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Registry {
            code: 0,
            message: "no etcd endpoints configured".into(),
            cause: None,
        }))
    }

    fn decode(resp: &HttpResponse) -> Result<Node, Error> {
        if !resp.status.is_success() {
            return Err(Self::error_from(resp));
        }
        serde_json::from_slice::<KeysResponse>(&resp.body)
            .map(|r| r.node)
            .map_err(|e| Error::deserialization(&e, &resp.body))
    }

    fn error_from(resp: &HttpResponse) -> Error {
        match serde_json::from_slice::<ErrorResponse>(&resp.body) {
            Ok(e) => Error::Registry {
                code: e.error_code,
                message: e.message,
                cause: e.cause,
            },
            Err(_) => Error::Api {
                status: resp.status.as_u16(),
                message: String::from_utf8_lossy(&resp.body).chars().take(200).collect(),
            },
        }
    }

    /// Read a key or directory; `Ok(None)` when it does not exist.
    pub async fn get(&self, key: &str, recursive: bool) -> Result<Option<Node>, Error> {
        debug!(key, recursive, "etcd get");
        let resp = self
            .send(key, |mut url| {
                if recursive {
                    url.query_pairs_mut()
                        .append_pair("recursive", "true")
                        .append_pair("sorted", "true");
                }
                HttpRequest::new(Method::GET, url)
            })
            .await?;
        match Self::decode(&resp) {
            Ok(node) => Ok(Some(node)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write a value.
    pub async fn set(&self, key: &str, value: &str, prev: PrevExist) -> Result<Node, Error> {
        debug!(key, ?prev, "etcd set");
        let resp = self
            .send(key, |mut url| {
                match prev {
                    PrevExist::Any => {}
                    PrevExist::MustExist => {
                        url.query_pairs_mut().append_pair("prevExist", "true");
                    }
                    PrevExist::MustNotExist => {
                        url.query_pairs_mut().append_pair("prevExist", "false");
                    }
                }
                HttpRequest::new(Method::PUT, url).form(&[("value", value)])
            })
            .await?;
        Self::decode(&resp)
    }

    /// Delete a key, or a whole directory when `recursive`.
    pub async fn delete(&self, key: &str, recursive: bool) -> Result<(), Error> {
        debug!(key, recursive, "etcd delete");
        let resp = self
            .send(key, |mut url| {
                if recursive {
                    url.query_pairs_mut().append_pair("recursive", "true");
                }
                HttpRequest::new(Method::DELETE, url)
            })
            .await?;
        Self::decode(&resp).map(drop)
    }
}
