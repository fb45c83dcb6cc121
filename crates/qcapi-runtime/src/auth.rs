//! IBM Cloud IAM authentication.
//!
//! Exchanges a long-lived IBM Cloud API key for a short-lived bearer token
//! and caches it. A cached token is handed out only while it has at least
//! [`REFRESH_SLACK_SECS`] seconds of validity left; after that the next caller
//! triggers a new exchange. There is no background refresh.
//!
//! # Example
//!
//! ```ignore
//! use qcapi_runtime::auth::{IamTokenProvider, TokenSource};
//!
//! let provider = IamTokenProvider::new(&credentials.api_key, http_client);
//! let token = provider.get_token().await?;
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::error::{QcapiError, QcapiResult};

/// IBM Cloud IAM token endpoint.
pub const IAM_TOKEN_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/// Grant type for the API-key exchange.
const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// A token is refreshed once it is this close to expiry.
pub const REFRESH_SLACK_SECS: i64 = 60;

/// Lifetime assumed when IAM omits `expires_in` or sends a non-positive value.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Upper bound on the lifetime accepted from IAM.
const MAX_EXPIRES_IN_SECS: i64 = 30 * 24 * 3600;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Cached bearer token with its absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    /// Bearer token.
    pub access_token: String,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Check if the token is expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check if the token will expire within `slack_secs`.
    pub fn expires_soon(&self, now: DateTime<Utc>, slack_secs: i64) -> bool {
        now >= self.expires_at - Duration::seconds(slack_secs)
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// IAM token response from `iam.cloud.ibm.com`.
#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

impl IamTokenResponse {
    /// `expires_in` as whole seconds, defaulting when absent or non-positive.
    fn lifetime_secs(&self) -> i64 {
        self.expires_in
            .as_ref()
            .and_then(serde_json::Value::as_i64)
            .filter(|&secs| secs > 0)
            .map_or(DEFAULT_EXPIRES_IN_SECS, |secs| secs.min(MAX_EXPIRES_IN_SECS))
    }
}

/// Token provider trait for dependency injection.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    /// Get a bearer token valid for at least [`REFRESH_SLACK_SECS`] more seconds.
    async fn get_token(&self) -> QcapiResult<String>;

    /// Check if a fresh token is cached.
    async fn has_valid_token(&self) -> bool;

    /// Forget any cached token.
    async fn invalidate(&self) {}
}

/// Exchanges an IBM Cloud API key for IAM bearer tokens and caches them.
pub struct IamTokenProvider {
    api_key: String,
    token_url: String,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    cached_token: RwLock<Option<CachedToken>>,
    /// Serializes exchanges so a burst of callers triggers one request.
    refresh_lock: Mutex<()>,
}

impl fmt::Debug for IamTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamTokenProvider")
            .field("api_key", &"[REDACTED]")
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl IamTokenProvider {
    /// Create a provider that talks to the public IAM endpoint.
    ///
    /// `client` carries the request timeout; the provider adds none of its own.
    pub fn new(api_key: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_key: api_key.into(),
            token_url: IAM_TOKEN_URL.to_string(),
            client,
            clock: Arc::new(SystemClock),
            cached_token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Use a different token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get a valid bearer token, exchanging the API key if necessary.
    pub async fn get_token(&self) -> QcapiResult<String> {
        if let Some(token) = self.fresh_cached_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.fresh_cached_token().await {
            return Ok(token);
        }

        let token = self.exchange_api_key().await?;
        let access_token = token.access_token.clone();
        *self.cached_token.write().await = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token so the next call performs an exchange.
    pub async fn invalidate(&self) {
        *self.cached_token.write().await = None;
    }

    /// Snapshot of the cached token.
    pub async fn cached(&self) -> Option<CachedToken> {
        self.cached_token.read().await.clone()
    }

    async fn fresh_cached_token(&self) -> Option<String> {
        let now = self.clock.now();
        let cached = self.cached_token.read().await;
        match cached.as_ref() {
            Some(token) if !token.expires_soon(now, REFRESH_SLACK_SECS) => {
                tracing::trace!("using cached IAM token (expires {})", token.expires_at);
                Some(token.access_token.clone())
            }
            _ => None,
        }
    }

    /// POST the API key to IAM and parse the response.
    async fn exchange_api_key(&self) -> QcapiResult<CachedToken> {
        tracing::info!("requesting IAM bearer token from {}", self.token_url);

        let params = [
            ("grant_type", APIKEY_GRANT_TYPE),
            ("apikey", self.api_key.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| QcapiError::Auth(format!("IAM token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QcapiError::Auth(format!("failed to read IAM response: {e}")))?;

        if !status.is_success() {
            return Err(QcapiError::Auth(format!(
                "IAM returned {status}: {}",
                crate::diagnostics::truncate(&body, crate::error::ERROR_BODY_DISPLAY_LIMIT)
            )));
        }

        let parsed: IamTokenResponse = serde_json::from_str(&body)
            .map_err(|e| QcapiError::Auth(format!("failed to parse IAM response: {e}")))?;

        let lifetime = parsed.lifetime_secs();
        let access_token = parsed
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                QcapiError::Auth("IAM token response missing or empty access_token".into())
            })?;

        let expires_at = self.clock.now() + Duration::seconds(lifetime);
        tracing::debug!("IAM token valid for {lifetime}s (until {expires_at})");

        Ok(CachedToken {
            access_token,
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl TokenSource for IamTokenProvider {
    async fn get_token(&self) -> QcapiResult<String> {
        IamTokenProvider::get_token(self).await
    }

    async fn has_valid_token(&self) -> bool {
        self.fresh_cached_token().await.is_some()
    }

    async fn invalidate(&self) {
        IamTokenProvider::invalidate(self).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_expiring_in(now: DateTime<Utc>, secs: i64) -> CachedToken {
        CachedToken {
            access_token: "token".to_string(),
            expires_at: now + Duration::seconds(secs),
        }
    }

    #[test]
    fn test_cached_token_expiry() {
        let now = Utc::now();

        let expired = token_expiring_in(now, -100);
        assert!(expired.is_expired(now));

        let valid = token_expiring_in(now, 3600);
        assert!(!valid.is_expired(now));
        assert!(!valid.expires_soon(now, REFRESH_SLACK_SECS));

        let expiring_soon = token_expiring_in(now, 59);
        assert!(!expiring_soon.is_expired(now));
        assert!(expiring_soon.expires_soon(now, REFRESH_SLACK_SECS));
    }

    #[test]
    fn test_slack_boundary() {
        let now = Utc::now();
        // Exactly 60s left is no longer fresh.
        assert!(token_expiring_in(now, 60).expires_soon(now, REFRESH_SLACK_SECS));
        assert!(!token_expiring_in(now, 61).expires_soon(now, REFRESH_SLACK_SECS));
    }

    #[test]
    fn test_lifetime_defaults() {
        let parse = |json: &str| serde_json::from_str::<IamTokenResponse>(json).unwrap();
        assert_eq!(parse(r#"{"access_token":"a"}"#).lifetime_secs(), 3600);
        assert_eq!(parse(r#"{"access_token":"a","expires_in":0}"#).lifetime_secs(), 3600);
        assert_eq!(parse(r#"{"access_token":"a","expires_in":-5}"#).lifetime_secs(), 3600);
        assert_eq!(parse(r#"{"access_token":"a","expires_in":"soon"}"#).lifetime_secs(), 3600);
        assert_eq!(parse(r#"{"access_token":"a","expires_in":1200}"#).lifetime_secs(), 1200);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let provider = IamTokenProvider::new("very-secret", reqwest::Client::new());
        let dbg = format!("{provider:?}");
        assert!(!dbg.contains("very-secret"));

        let token = token_expiring_in(Utc::now(), 10);
        assert!(!format!("{token:?}").contains("\"token\""));
    }

    #[tokio::test]
    async fn test_new_provider_has_no_token() {
        let provider = IamTokenProvider::new("key", reqwest::Client::new());
        assert!(!TokenSource::has_valid_token(&provider).await);
        assert!(provider.cached().await.is_none());
    }
}
