//! Qiskit Runtime REST client.
//!
//! Every call is one request with a fixed timeout. Responses outside
//! `200..=299` become [`QcapiError::Http`] carrying status, URL and raw body.
//! Successful bodies are returned as owned [`serde_json::Value`]s.
//!
//! Header policy per request:
//! - `Accept: application/json` and the client `User-Agent`, always
//! - `IBM-API-Version`, unless disabled
//! - `Service-CRN` (tenant), unless disabled
//! - `Authorization: Bearer ...`, unless disabled

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Url, header};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::auth::{IamTokenProvider, TokenSource};
use crate::error::{QcapiError, QcapiResult};
use crate::types::Credentials;

pub use reqwest::Method;

/// Timeout applied to every request, independent of caller cancellation.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// TCP connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("qcapi/", env!("CARGO_PKG_VERSION"));

/// Tenant header carrying the Service CRN.
pub const SERVICE_CRN_HEADER: &str = "Service-CRN";

/// API version header.
pub const API_VERSION_HEADER: &str = "IBM-API-Version";

/// Description of one REST call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    body: Option<Value>,
    auth: bool,
    service_crn: bool,
    api_version: bool,
}

impl ApiRequest {
    /// A request for `path` (relative to the base URL) with all headers enabled.
    ///
    /// `path` is split on `/`; use [`ApiRequest::segment`] for values that
    /// must be percent-encoded as a single segment. A `?key=value` suffix is
    /// decoded into query parameters.
    pub fn new(method: Method, path: &str) -> Self {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        Self {
            method,
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            query: url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            body: None,
            auth: true,
            service_crn: true,
            api_version: true,
        }
    }

    /// `GET path`.
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    /// `DELETE path`.
    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append one path segment (e.g. a backend name), encoded as needed.
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Add a query parameter. `None` and blank values are omitted.
    pub fn query<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value.map(|v| v.to_string()) {
            if !value.trim().is_empty() {
                self.query.push((key.into(), value));
            }
        }
        self
    }

    /// Send `body` as JSON.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Do not send an `Authorization` header.
    pub fn without_auth(mut self) -> Self {
        self.auth = false;
        self
    }

    /// Do not send the `Service-CRN` header.
    pub fn without_service_crn(mut self) -> Self {
        self.service_crn = false;
        self
    }

    /// Do not send the `IBM-API-Version` header.
    pub fn without_api_version(mut self) -> Self {
        self.api_version = false;
        self
    }

    /// Unauthenticated request with no tenant or version header.
    pub fn public(self) -> Self {
        self.without_auth()
            .without_service_crn()
            .without_api_version()
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Whether a bearer token will be attached.
    pub fn needs_auth(&self) -> bool {
        self.auth
    }
}

/// Join `base` with path segments and non-empty query pairs.
pub fn build_url(base: &Url, request: &ApiRequest) -> QcapiResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| QcapiError::Config(format!("Base URL cannot carry a path: {base}")))?
        .pop_if_empty()
        .extend(&request.segments);
    if !request.query.is_empty() {
        url.query_pairs_mut().extend_pairs(&request.query);
    }
    Ok(url)
}

/// Parse a successful response body.
///
/// Empty bodies become `null`; bodies that are not JSON come back as a JSON
/// string holding the raw text.
pub fn parse_body(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Authenticated Qiskit Runtime REST client.
pub struct ApiClient {
    /// HTTP client (carries the timeouts).
    http: Client,
    /// Resolved credentials.
    credentials: Arc<Credentials>,
    /// Bearer token source, shared with anyone else holding it.
    tokens: Arc<dyn TokenSource>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Build the shared HTTP client.
    pub fn http_client() -> QcapiResult<Client> {
        Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| QcapiError::Transport(format!("failed to build HTTP client: {e}")))
    }

    /// Create a client that obtains tokens from IBM Cloud IAM.
    pub fn new(credentials: Credentials) -> QcapiResult<Self> {
        let http = Self::http_client()?;
        let tokens = IamTokenProvider::new(credentials.api_key.clone(), http.clone());
        Ok(Self {
            http,
            credentials: Arc::new(credentials),
            tokens: Arc::new(tokens),
        })
    }

    /// Create a client with an explicit token source.
    pub fn with_token_source(
        credentials: Credentials,
        tokens: Arc<dyn TokenSource>,
    ) -> QcapiResult<Self> {
        Ok(Self {
            http: Self::http_client()?,
            credentials: Arc::new(credentials),
            tokens,
        })
    }

    /// Credentials this client was built from.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Token source used for authenticated requests.
    pub fn token_source(&self) -> Arc<dyn TokenSource> {
        Arc::clone(&self.tokens)
    }

    /// Issue `request`, aborting as soon as `cancel` fires.
    pub async fn request(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("{} request cancelled", request.method);
                Err(QcapiError::Cancelled)
            }
            result = self.send(&request) => result,
        }
    }

    async fn send(&self, request: &ApiRequest) -> QcapiResult<Value> {
        let url = build_url(&self.credentials.base_url, request)?;
        tracing::debug!("{} {url}", request.method);

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .header(header::ACCEPT, "application/json");

        if request.api_version && !self.credentials.api_version.is_empty() {
            builder = builder.header(API_VERSION_HEADER, &self.credentials.api_version);
        }
        if request.service_crn {
            builder = builder.header(SERVICE_CRN_HEADER, &self.credentials.service_crn);
        }
        if request.auth {
            let token = self.tokens.get_token().await?;
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| QcapiError::transport(url.as_str(), &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QcapiError::transport(url.as_str(), &e))?;

        if !status.is_success() {
            tracing::warn!("{} {url} returned {status}", request.method);
            if status == reqwest::StatusCode::UNAUTHORIZED && request.auth {
                // Rejected token: the next authenticated call exchanges again.
                self.tokens.invalidate().await;
            }
            return Err(QcapiError::Http {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        Ok(parse_body(&body))
    }
}
