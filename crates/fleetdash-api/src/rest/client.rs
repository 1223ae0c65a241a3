// REST API HTTP client
//
// Wraps `reqwest::Client` with bearer-token injection, `/api/v1` URL
// construction, and status-to-error mapping. Endpoint groups (devices,
// alerts, etc.) are implemented as inherent methods in sibling files to
// keep this module focused on transport mechanics.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::auth::{CredentialProvider, bearer_header};
use crate::error::Error;
use crate::rest::models::ApiMessage;
use crate::transport::TransportConfig;

/// Path prefix every REST endpoint lives under.
const API_PREFIX: &str = "api/v1";

/// Longest body excerpt carried in an error message.
const BODY_PREVIEW_CHARS: usize = 200;

/// HTTP client for the dashboard backend's REST API.
///
/// The credential provider is consulted on every request; a provider that
/// yields `None` sends the request without an `Authorization` header.
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl RestClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the server root (e.g. `http://fleet.local:5000`); the
    /// `/api/v1` prefix is added per request.
    pub fn new(
        base_url: Url,
        transport: &TransportConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, credentials))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
        }
    }

    /// The server root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/v1/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{API_PREFIX}/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn authorize(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, Error> {
        Ok(match self.credentials.bearer_token()? {
            Some(token) => builder.header(reqwest::header::AUTHORIZATION, bearer_header(&token)),
            None => builder,
        })
    }

    /// Send a GET request.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .authorize(self.http.get(url))?
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_response(resp).await
    }

    /// Send a GET request with URL-encoded query parameters.
    pub(crate) async fn get_query<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .authorize(self.http.get(url).query(query))?
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_response(resp).await
    }

    /// Send a POST request without a body.
    pub(crate) async fn post<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("POST {}", url);

        let resp = self
            .authorize(self.http.post(url))?
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_response(resp).await
    }
}

/// Map the HTTP status to an error, or decode the JSON body.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Authentication {
            message: error_message(&body).unwrap_or_else(|| "token missing or invalid".into()),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| preview(&body).to_owned());
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;
    trace!(bytes = body.len(), "response body received");

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(&body)),
        body,
    })
}

/// The `message` field of a `{"message": ...}` error body, if present.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiMessage>(body).ok()?.message
}

/// The leading part of `body`, cut on a char boundary.
fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW_CHARS) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
