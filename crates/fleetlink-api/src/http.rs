// Async client for the fleet v1 HTTP API.
//
// Base path: /fleet/v1/
// Every operation is one request/response round trip (plus pagination for
// listings). No retries at this layer.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    JobState, Machine, MachinePage, Page, Unit, UnitPage, UnitState, UnitStatePage,
};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

// ── Error response shape from the fleet API ─────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DesiredStateUpdate<'a> {
    name: &'a str,
    desired_state: JobState,
}

// ── Client ───────────────────────────────────────────────────────────

/// Client for a fleet daemon's HTTP API, over whatever stream the transport
/// dials.
#[derive(Debug, Clone)]
pub struct FleetHttpClient {
    transport: HttpTransport,
    base_url: Url,
}

impl FleetHttpClient {
    /// Build from the endpoint root (e.g. `http://10.0.0.5:49153` or the
    /// rewritten `http://domain-sock/` for socket endpoints).
    pub fn new(endpoint: &Url, transport: HttpTransport) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(endpoint)?;
        Ok(Self {
            transport,
            base_url,
        })
    }

    /// Append `/fleet/v1/` to the endpoint path unless it is already there.
    fn normalize_base_url(endpoint: &Url) -> Result<Url, Error> {
        let mut url = endpoint.clone();
        let path = url.path().trim_end_matches('/').to_owned();
        if path.ends_with("/fleet/v1") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/fleet/v1/"));
        }
        url.set_query(None);
        Ok(url)
    }

    /// The resolved API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    fn unit_url(&self, name: &str) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("units")
            .push(name);
        Ok(url)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get_page<P>(&self, path: &str) -> Result<Vec<P::Item>, Error>
    where
        P: Page + DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut url = self.url(path)?;
            if let Some(ref token) = token {
                url.query_pairs_mut().append_pair("nextPageToken", token);
            }
            let resp = self.transport.send(HttpRequest::new(Method::GET, url)).await?;
            let page: P = Self::decode(Self::check(resp)?)?;
            let (mut batch, next) = page.into_parts();
            items.append(&mut batch);
            match next {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => return Ok(items),
            }
        }
    }

    async fn put<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<(), Error> {
        let resp = self
            .transport
            .send(HttpRequest::new(Method::PUT, url).json(body)?)
            .await?;
        Self::check(resp).map(drop)
    }

    fn check(resp: HttpResponse) -> Result<HttpResponse, Error> {
        if resp.status.is_success() {
            return Ok(resp);
        }
        let message = serde_json::from_slice::<ErrorResponse>(&resp.body)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| {
                let text = String::from_utf8_lossy(&resp.body);
                let preview: String = text.chars().take(200).collect();
                if preview.is_empty() {
                    resp.status.to_string()
                } else {
                    preview
                }
            });
        Err(Error::Api {
            status: resp.status.as_u16(),
            message,
        })
    }

    fn decode<T: DeserializeOwned>(resp: HttpResponse) -> Result<T, Error> {
        serde_json::from_slice(&resp.body).map_err(|e| Error::deserialization(&e, &resp.body))
    }

    // ── Operations ───────────────────────────────────────────────────

    pub async fn list_machines(&self) -> Result<Vec<Machine>, Error> {
        self.get_page::<MachinePage>("machines").await
    }

    /// Fetch one unit; `Ok(None)` when the scheduler does not know it.
    pub async fn get_unit(&self, name: &str) -> Result<Option<Unit>, Error> {
        let url = self.unit_url(name)?;
        let resp = self.transport.send(HttpRequest::new(Method::GET, url)).await?;
        if resp.status == StatusCode::NOT_FOUND {
            debug!(unit = name, "unit not found");
            return Ok(None);
        }
        Self::decode(Self::check(resp)?).map(Some)
    }

    pub async fn list_units(&self) -> Result<Vec<Unit>, Error> {
        self.get_page::<UnitPage>("units").await
    }

    pub async fn list_unit_states(&self) -> Result<Vec<UnitState>, Error> {
        self.get_page::<UnitStatePage>("state").await
    }

    pub async fn set_unit_desired_state(&self, name: &str, state: JobState) -> Result<(), Error> {
        let body = DesiredStateUpdate {
            name,
            desired_state: state,
        };
        self.put(self.unit_url(name)?, &body).await
    }

    pub async fn create_unit(&self, unit: &Unit) -> Result<(), Error> {
        self.put(self.unit_url(&unit.name)?, unit).await
    }

    pub async fn destroy_unit(&self, name: &str) -> Result<(), Error> {
        let url = self.unit_url(name)?;
        let resp = self
            .transport
            .send(HttpRequest::new(Method::DELETE, url))
            .await?;
        Self::check(resp).map(drop)
    }
}
