//! Qiskit Runtime access layer
//!
//! This crate resolves IBM Cloud credentials, keeps an IAM bearer token
//! fresh, issues REST calls against the Qiskit Runtime API, and turns the
//! loosely shaped JSON it returns into typed summaries.
//!
//! # Overview
//!
//! - [`CredentialResolver`] finds an API key and Service CRN in the
//!   environment or in `~/.qiskit/qiskit-ibm.json`
//! - [`IamTokenProvider`] exchanges the API key for bearer tokens and caches
//!   them until 60 seconds before expiry
//! - [`ApiClient`] sends authenticated, versioned requests and maps non-2xx
//!   responses to [`QcapiError::Http`]
//! - [`extract`] locates payload arrays and builds [`BackendSummary`] and
//!   [`JobSummary`] records without ever failing
//! - [`RuntimeService`] ties these together for front ends
//!
//! # Example
//!
//! ```ignore
//! use qcapi_runtime::{RuntimeService, resolve_credentials};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = RuntimeService::new(resolve_credentials()?)?;
//!     let cancel = CancellationToken::new();
//!
//!     for backend in service.list_backends(&cancel).await? {
//!         println!("{} ({})", backend.name, backend.kind_label());
//!     }
//!
//!     if let Some(job) = service.get_latest_job(true, &cancel).await? {
//!         println!("Latest job: {}", job.id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod service;
pub mod types;

pub use auth::{CachedToken, Clock, IamTokenProvider, SystemClock, TokenSource};
pub use client::{ApiClient, ApiRequest};
pub use config::CredentialResolver;
pub use error::{QcapiError, QcapiResult};
pub use extract::{extract_backends, extract_latest_job, extract_recent_jobs};
pub use service::{JobQuery, JobSubmission, RuntimeService, resolve_credentials};
pub use types::{BackendSummary, Credentials, JobSummary};
