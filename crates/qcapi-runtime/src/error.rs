//! Error types for the Qiskit Runtime access layer.
//!
//! Configuration and authentication failures are fatal to the attempt that
//! produced them. Response extraction never produces an error: unexpected
//! shapes degrade to empty results instead.

use thiserror::Error;

use crate::diagnostics::truncate;

/// Result type for runtime operations.
pub type QcapiResult<T> = Result<T, QcapiError>;

/// Maximum number of body characters rendered by `Display` for HTTP errors.
pub const ERROR_BODY_DISPLAY_LIMIT: usize = 500;

/// Errors that can occur when talking to the Qiskit Runtime REST API.
#[derive(Debug, Error)]
pub enum QcapiError {
    /// Missing or malformed credentials / account configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// IAM token exchange failed.
    #[error("IAM token exchange failed: {0}")]
    Auth(String),

    /// The API answered with a status outside `200..=299`.
    #[error("HTTP {status} from {url}: {}", truncate(.body, ERROR_BODY_DISPLAY_LIMIT))]
    Http {
        /// HTTP status code.
        status: u16,
        /// Fully resolved request URL.
        url: String,
        /// Raw response body.
        body: String,
    },

    /// Network failure or timeout.
    #[error("request failed: {0}")]
    Transport(String),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
}

impl QcapiError {
    /// HTTP status code, if this error came from a REST response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the caller may sensibly retry the same call later.
    ///
    /// Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Config(_) | Self::Auth(_) | Self::Cancelled => false,
        }
    }

    /// Classify a `reqwest` failure into a transport error with a useful hint.
    pub(crate) fn transport(url: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timed out"
        } else if err.is_connect() {
            "connection failed"
        } else {
            "transport error"
        };
        Self::Transport(format!("{kind} for {url}: {err}"))
    }
}
