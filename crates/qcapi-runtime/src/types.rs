//! Domain records shared by the resolver, client, and extractors.

use std::fmt;
use std::path::PathBuf;

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

/// Resolved credentials for one process run.
///
/// Both `api_key` and `service_crn` are non-empty and `base_url` is an
/// absolute http(s) URL; [`crate::config::CredentialResolver`] is the only
/// producer.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// IBM Cloud API key, exchanged for a bearer token.
    pub api_key: String,
    /// Service CRN of the Qiskit Runtime instance (tenant identifier).
    pub service_crn: String,
    /// REST API base URL, e.g. `https://quantum.cloud.ibm.com/api/v1`.
    pub base_url: Url,
    /// Value sent in the `IBM-API-Version` header.
    pub api_version: String,
    /// Account label from the Qiskit config file (`None` when taken from env).
    pub account_name: Option<String>,
    /// Config file the account was read from.
    pub source_path: Option<PathBuf>,
}

impl Credentials {
    /// Shortened Service CRN safe to show in a UI.
    pub fn service_crn_hint(&self) -> String {
        let crn = &self.service_crn;
        if crn.starts_with("crn:") {
            let tail: String = crn
                .chars()
                .rev()
                .take(12)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("crn:...{tail}")
        } else {
            crn.clone()
        }
    }

    /// Human-readable origin of these credentials.
    pub fn source_label(&self) -> String {
        match (&self.account_name, &self.source_path) {
            (Some(name), Some(path)) => format!("account '{name}' in {}", path.display()),
            (Some(name), None) => format!("account '{name}'"),
            _ => "environment".to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("service_crn", &self.service_crn)
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .field("account_name", &self.account_name)
            .field("source_path", &self.source_path)
            .finish()
    }
}

/// One compute backend as listed by `GET /backends`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendSummary {
    /// Backend name; `"(unknown)"` when the payload carries none.
    pub name: String,
    /// `Some` only when the payload holds a JSON boolean `simulator` field.
    pub simulator: Option<bool>,
    /// Free-text status, possibly composed as `"<name> (<reason>)"`.
    pub status: Option<String>,
    /// The original array element.
    #[serde(skip_serializing)]
    pub raw: Value,
}

impl BackendSummary {
    /// Display label for the tri-state simulator flag.
    pub fn kind_label(&self) -> &'static str {
        match self.simulator {
            Some(true) => "simulator",
            Some(false) => "quantum",
            None => "unknown",
        }
    }
}

/// One job as listed by `GET /jobs`.
///
/// `backend` is a weak reference by name; the backend may not exist in any
/// backend list the caller holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    /// Job identifier (never empty).
    pub id: String,
    /// Name of the backend the job ran on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// Job status as reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Creation timestamp, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// The original array element.
    #[serde(skip_serializing)]
    pub raw: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(crn: &str) -> Credentials {
        Credentials {
            api_key: "secret-key".into(),
            service_crn: crn.into(),
            base_url: Url::parse("https://quantum.cloud.ibm.com/api/v1").unwrap(),
            api_version: "2026-02-01".into(),
            account_name: None,
            source_path: None,
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let dbg = format!("{:?}", creds("crn:v1:x"));
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn test_service_crn_hint() {
        let c = creds("crn:v1:bluemix:public:quantum-computing:us-east:a/123456789abcdef");
        assert_eq!(c.service_crn_hint(), "crn:...456789abcdef");
        assert_eq!(creds("plain-id").service_crn_hint(), "plain-id");
    }

    #[test]
    fn test_source_label() {
        let mut c = creds("crn:x");
        assert_eq!(c.source_label(), "environment");
        c.account_name = Some("default".into());
        assert_eq!(c.source_label(), "account 'default'");
    }

    #[test]
    fn test_backend_kind_label() {
        let mut b = BackendSummary {
            name: "ibm_fez".into(),
            simulator: None,
            status: None,
            raw: Value::Null,
        };
        assert_eq!(b.kind_label(), "unknown");
        b.simulator = Some(false);
        assert_eq!(b.kind_label(), "quantum");
    }
}
