//! High-level operations over the Qiskit Runtime REST API.
//!
//! [`RuntimeService`] is what a front end talks to: it returns data or an
//! error, never touches presentation state, and every operation can be
//! cancelled through a [`CancellationToken`].

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::client::{ApiClient, ApiRequest};
use crate::config::CredentialResolver;
use crate::diagnostics::log_json;
use crate::error::QcapiResult;
use crate::extract;
use crate::types::{BackendSummary, Credentials, JobSummary};

/// Jobs fetched when looking for the latest job.
pub const LATEST_JOB_SCAN_LIMIT: u32 = 20;

/// `recent_quantum_jobs(n)` scans `n * RECENT_SCAN_FACTOR` jobs.
pub const RECENT_SCAN_FACTOR: usize = 20;

/// Resolve credentials from the process environment and the Qiskit config file.
pub fn resolve_credentials() -> QcapiResult<Credentials> {
    CredentialResolver::from_env().resolve()
}

/// Filters for `GET /jobs`. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
    pub backend: Option<String>,
    pub program_id: Option<String>,
    /// `"true"` or `"false"`; passed through verbatim.
    pub pending: Option<String>,
}

impl JobQuery {
    /// Query with only a limit.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Only finished jobs.
    pub fn finished(mut self) -> Self {
        self.pending = Some("false".to_string());
        self
    }

    fn to_request(&self) -> ApiRequest {
        ApiRequest::get("/jobs")
            .query("limit", self.limit)
            .query("skip", self.skip)
            .query("backend", self.backend.as_deref())
            .query("program_id", self.program_id.as_deref())
            .query("pending", self.pending.as_deref())
    }
}

/// Body of `POST /jobs`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSubmission {
    pub program_id: String,
    pub backend: String,
    pub params: Value,
    /// Additional top-level fields (e.g. `session_id`, `tags`).
    pub extra: Map<String, Value>,
}

impl JobSubmission {
    pub fn new(program_id: impl Into<String>, backend: impl Into<String>, params: Value) -> Self {
        Self {
            program_id: program_id.into(),
            backend: backend.into(),
            params,
            extra: Map::new(),
        }
    }

    /// Add a top-level field. Later fields override the fixed ones.
    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("program_id".into(), Value::String(self.program_id.clone()));
        body.insert("backend".into(), Value::String(self.backend.clone()));
        body.insert("params".into(), self.params.clone());
        body.extend(self.extra.clone());
        Value::Object(body)
    }
}

/// Qiskit Runtime operations bound to one set of credentials.
#[derive(Debug)]
pub struct RuntimeService {
    client: ApiClient,
}

impl RuntimeService {
    /// Create a service that authenticates through IBM Cloud IAM.
    pub fn new(credentials: Credentials) -> QcapiResult<Self> {
        Ok(Self::from_client(ApiClient::new(credentials)?))
    }

    /// Wrap an existing client.
    pub fn from_client(client: ApiClient) -> Self {
        Self { client }
    }

    /// Credentials in use.
    pub fn credentials(&self) -> &Credentials {
        self.client.credentials()
    }

    /// Underlying REST client.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// `GET /versions` (unauthenticated).
    pub async fn get_versions(&self, cancel: &CancellationToken) -> QcapiResult<Value> {
        self.client
            .request(ApiRequest::get("/versions").public(), cancel)
            .await
    }

    /// `GET /backends`, unparsed.
    pub async fn list_backends_raw(&self, cancel: &CancellationToken) -> QcapiResult<Value> {
        let root = self.client.request(ApiRequest::get("/backends"), cancel).await?;
        log_json("GET /backends", &root);
        Ok(root)
    }

    /// `GET /backends` as summaries.
    pub async fn list_backends(
        &self,
        cancel: &CancellationToken,
    ) -> QcapiResult<Vec<BackendSummary>> {
        let root = self.list_backends_raw(cancel).await?;
        let backends = extract::extract_backends(&root);
        if backends.is_empty() {
            tracing::warn!("backend listing contained no recognizable entries");
        }
        Ok(backends)
    }

    /// `GET /backends/{name}/status`.
    pub async fn backend_status(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        let request = ApiRequest::get("/backends").segment(name).segment("status");
        self.client.request(request, cancel).await
    }

    /// `GET /backends/{name}/properties`.
    pub async fn backend_properties(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        let request = ApiRequest::get("/backends")
            .segment(name)
            .segment("properties");
        self.client.request(request, cancel).await
    }

    /// `GET /jobs` with filters, unparsed.
    pub async fn list_jobs(
        &self,
        query: &JobQuery,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        let root = self.client.request(query.to_request(), cancel).await?;
        log_json("GET /jobs", &root);
        Ok(root)
    }

    /// `GET /jobs/{id}`.
    pub async fn get_job(&self, id: &str, cancel: &CancellationToken) -> QcapiResult<Value> {
        self.client
            .request(ApiRequest::get("/jobs").segment(id), cancel)
            .await
    }

    /// `GET /jobs/{id}/results`.
    pub async fn get_job_results(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        let request = ApiRequest::get("/jobs").segment(id).segment("results");
        self.client.request(request, cancel).await
    }

    /// `GET /jobs/{id}/interim_results`.
    pub async fn get_job_interim_results(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        let request = ApiRequest::get("/jobs").segment(id).segment("interim_results");
        self.client.request(request, cancel).await
    }

    /// `GET /jobs/{id}/metrics`.
    pub async fn get_job_metrics(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        let request = ApiRequest::get("/jobs").segment(id).segment("metrics");
        self.client.request(request, cancel).await
    }

    /// `POST /jobs/{id}/cancel`.
    pub async fn cancel_job(&self, id: &str, cancel: &CancellationToken) -> QcapiResult<Value> {
        tracing::info!("cancelling job {id}");
        let request = ApiRequest::post("/jobs").segment(id).segment("cancel");
        self.client.request(request, cancel).await
    }

    /// `DELETE /jobs/{id}`.
    pub async fn delete_job(&self, id: &str, cancel: &CancellationToken) -> QcapiResult<Value> {
        tracing::info!("deleting job {id}");
        self.client
            .request(ApiRequest::delete("/jobs").segment(id), cancel)
            .await
    }

    /// `POST /jobs`.
    pub async fn submit_job(
        &self,
        submission: &JobSubmission,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        tracing::info!(
            "submitting {} job to {}",
            submission.program_id,
            submission.backend
        );
        let request = ApiRequest::post("/jobs").json(submission.to_body());
        self.client.request(request, cancel).await
    }

    /// `GET /programs`.
    pub async fn list_programs(&self, cancel: &CancellationToken) -> QcapiResult<Value> {
        let root = self.client.request(ApiRequest::get("/programs"), cancel).await?;
        log_json("GET /programs", &root);
        Ok(root)
    }

    /// `GET /programs/{id}`.
    pub async fn get_program(&self, id: &str, cancel: &CancellationToken) -> QcapiResult<Value> {
        self.client
            .request(ApiRequest::get("/programs").segment(id), cancel)
            .await
    }

    /// `GET /sessions` with optional query parameters.
    pub async fn list_sessions(
        &self,
        params: &[(String, String)],
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        let request = params
            .iter()
            .fold(ApiRequest::get("/sessions"), |request, (key, value)| {
                request.query(key.as_str(), Some(value))
            });
        self.client.request(request, cancel).await
    }

    /// `GET /sessions/{id}`.
    pub async fn get_session(&self, id: &str, cancel: &CancellationToken) -> QcapiResult<Value> {
        self.client
            .request(ApiRequest::get("/sessions").segment(id), cancel)
            .await
    }

    /// `POST /sessions`. An empty `body` is sent as `{}`.
    pub async fn create_session(
        &self,
        body: Map<String, Value>,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        let request = ApiRequest::post("/sessions").json(Value::Object(body));
        self.client.request(request, cancel).await
    }

    /// `POST /sessions/{id}/close`.
    pub async fn close_session(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        let request = ApiRequest::post("/sessions").segment(id).segment("close");
        self.client.request(request, cancel).await
    }

    /// Most recent finished job, optionally restricted to physical backends.
    ///
    /// With `filter_physical` the backend list is fetched first and jobs on
    /// simulators (or on backends absent from that list) are skipped.
    pub async fn get_latest_job(
        &self,
        filter_physical: bool,
        cancel: &CancellationToken,
    ) -> QcapiResult<Option<JobSummary>> {
        let backends = if filter_physical {
            Some(self.list_backends_raw(cancel).await?)
        } else {
            None
        };
        let jobs = self
            .list_jobs(&JobQuery::with_limit(LATEST_JOB_SCAN_LIMIT).finished(), cancel)
            .await?;

        let latest = extract::extract_latest_job(&jobs, backends.as_ref());
        match &latest {
            Some(job) => tracing::info!("latest job {} on {:?}", job.id, job.backend),
            None => tracing::info!("no qualifying job (filter_physical={filter_physical})"),
        }
        Ok(latest)
    }

    /// Up to `limit` recent finished jobs that ran on physical backends.
    pub async fn recent_quantum_jobs(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> QcapiResult<Vec<JobSummary>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let backends = self.list_backends_raw(cancel).await?;
        let scan = u32::try_from(limit.saturating_mul(RECENT_SCAN_FACTOR)).unwrap_or(u32::MAX);
        let jobs = self
            .list_jobs(&JobQuery::with_limit(scan).finished(), cancel)
            .await?;
        Ok(extract::extract_recent_jobs(&jobs, Some(&backends), limit))
    }

    /// Issue an arbitrary request.
    pub async fn request(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> QcapiResult<Value> {
        let value = self.client.request(request, cancel).await?;
        log_json("request", &value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;
    use serde_json::json;

    #[test]
    fn test_job_query_omits_unset_fields() {
        let base = Url::parse("https://example.com/api/v1").unwrap();
        let url = crate::client::build_url(&base, &JobQuery::default().to_request()).unwrap();
        assert_eq!(url.as_str(), "https://example.com/api/v1/jobs");
    }

    #[test]
    fn test_job_query_finished() {
        let base = Url::parse("https://example.com/api/v1").unwrap();
        let query = JobQuery {
            backend: Some("ibm_fez".into()),
            ..JobQuery::with_limit(20).finished()
        };
        let url = crate::client::build_url(&base, &query.to_request()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/api/v1/jobs?limit=20&backend=ibm_fez&pending=false"
        );
    }

    #[test]
    fn test_job_submission_body() {
        let submission = JobSubmission::new("sampler", "ibm_fez", json!({"pubs": []}))
            .field("session_id", json!("s-1"));
        assert_eq!(
            submission.to_body(),
            json!({
                "program_id": "sampler",
                "backend": "ibm_fez",
                "params": {"pubs": []},
                "session_id": "s-1"
            })
        );
    }

    #[test]
    fn test_job_submission_extra_overrides_fixed_fields() {
        let submission = JobSubmission::new("sampler", "ibm_fez", json!({}))
            .field("backend", json!("ibm_torino"));
        assert_eq!(submission.to_body()["backend"], "ibm_torino");
    }
}
