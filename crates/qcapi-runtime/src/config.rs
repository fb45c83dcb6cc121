//! Credential resolution.
//!
//! Credentials come from one of two sources, checked in order:
//!
//! 1. The `IBM_CLOUD_API_KEY` + `QCAPI_SERVICE_CRN` environment variable pair.
//! 2. The Qiskit account file (`~/.qiskit/qiskit-ibm.json`, overridable with
//!    `QCAPI_QISKIT_CONFIG_PATH`), a JSON object keyed by account label.
//!
//! Setting only one variable of the pair is an error, not a fallback.
//!
//! # Example
//!
//! ```ignore
//! use qcapi_runtime::config::CredentialResolver;
//!
//! let credentials = CredentialResolver::from_env().resolve()?;
//! println!("using {}", credentials.source_label());
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde_json::{Map, Value};

use crate::error::{QcapiError, QcapiResult};
use crate::types::Credentials;

/// API key used directly, bypassing the account file.
pub const ENV_API_KEY: &str = "IBM_CLOUD_API_KEY";
/// Service CRN used directly, bypassing the account file.
pub const ENV_SERVICE_CRN: &str = "QCAPI_SERVICE_CRN";
/// Base URL override.
pub const ENV_BASE_URL: &str = "QCAPI_BASE_URL";
/// `IBM-API-Version` override.
pub const ENV_API_VERSION: &str = "QCAPI_API_VERSION";
/// Account label to select from the account file.
pub const ENV_ACCOUNT: &str = "QCAPI_QISKIT_ACCOUNT";
/// Account file path override.
pub const ENV_CONFIG_PATH: &str = "QCAPI_QISKIT_CONFIG_PATH";

const RESOLVER_VARS: [&str; 6] = [
    ENV_API_KEY,
    ENV_SERVICE_CRN,
    ENV_BASE_URL,
    ENV_API_VERSION,
    ENV_ACCOUNT,
    ENV_CONFIG_PATH,
];

/// Default `IBM-API-Version` header value.
pub const DEFAULT_API_VERSION: &str = "2026-02-01";

/// Global (us-east) Qiskit Runtime endpoint.
pub const DEFAULT_BASE_URL: &str = "https://quantum.cloud.ibm.com/api/v1";

/// Frankfurt (eu-de) Qiskit Runtime endpoint.
pub const EU_DE_BASE_URL: &str = "https://eu-de.quantum.cloud.ibm.com/api/v1";

/// Region marker inside a Service CRN that selects [`EU_DE_BASE_URL`].
const EU_DE_CRN_MARKER: &str = ":eu-de:";

/// The only account channel this client can authenticate against.
pub const REQUIRED_CHANNEL: &str = "ibm_cloud";

/// Account labels preferred when no account is flagged as default.
pub const CONVENTIONAL_ACCOUNT_NAMES: [&str; 2] = ["default-ibm-cloud", "default"];

/// Resolves [`Credentials`] from environment variables or the Qiskit account file.
///
/// Variables are read from a snapshot taken at construction, never from the
/// live process environment.
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    vars: HashMap<String, String>,
    home_dir: Option<PathBuf>,
    account: Option<String>,
}

impl CredentialResolver {
    /// Create a resolver with no variables and no home directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the relevant process environment variables and the home directory.
    pub fn from_env() -> Self {
        let vars = RESOLVER_VARS
            .iter()
            .filter_map(|&key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self {
            vars,
            home_dir: dirs::home_dir(),
            account: None,
        }
    }

    /// Set a variable in the snapshot.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Set the home directory used for the default path and `~` expansion.
    pub fn with_home_dir(mut self, home: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home.into());
        self
    }

    /// Request an account by label. [`ENV_ACCOUNT`] still takes precedence.
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Non-blank variable value.
    fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Resolve credentials. Performs filesystem reads only.
    pub fn resolve(&self) -> QcapiResult<Credentials> {
        if let Some((api_key, service_crn)) = self.env_pair()? {
            tracing::debug!("using credentials from {ENV_API_KEY}/{ENV_SERVICE_CRN}");
            return self.build(api_key, service_crn, None, None);
        }

        let path = self.config_path()?;
        let accounts = load_accounts(&path)?;
        let requested = self.var(ENV_ACCOUNT).or(self.account.as_deref());
        let (name, account) = select_account(&accounts, requested)?;
        ensure_channel(name, account)?;

        let api_key = require_string(
            account,
            "token",
            &format!("Missing/invalid token in Qiskit account '{name}'"),
        )?;
        let service_crn = require_string(
            account,
            "instance",
            &format!("Missing/invalid instance (Service CRN) in Qiskit account '{name}'"),
        )?;

        tracing::info!("using Qiskit account '{name}' from {}", path.display());
        self.build(api_key, service_crn, Some(name.to_string()), Some(path))
    }

    /// The env pair, if either half is set.
    fn env_pair(&self) -> QcapiResult<Option<(String, String)>> {
        match (self.var(ENV_API_KEY), self.var(ENV_SERVICE_CRN)) {
            (None, None) => Ok(None),
            (Some(key), Some(crn)) => Ok(Some((key.to_string(), crn.to_string()))),
            (None, Some(_)) => Err(QcapiError::Config(format!(
                "Missing env var {ENV_API_KEY} ({ENV_SERVICE_CRN} is set)"
            ))),
            (Some(_), None) => Err(QcapiError::Config(format!(
                "Missing env var {ENV_SERVICE_CRN} ({ENV_API_KEY} is set)"
            ))),
        }
    }

    /// Location of the Qiskit account file.
    pub fn config_path(&self) -> QcapiResult<PathBuf> {
        if let Some(raw) = self.var(ENV_CONFIG_PATH) {
            return Ok(self.expand_home(raw));
        }
        let home = self.home_dir.as_ref().ok_or_else(|| {
            QcapiError::Config(format!(
                "Could not determine home directory; set {ENV_CONFIG_PATH}"
            ))
        })?;
        Ok(home.join(".qiskit").join("qiskit-ibm.json"))
    }

    fn expand_home(&self, raw: &str) -> PathBuf {
        match (raw.strip_prefix('~'), &self.home_dir) {
            (Some(rest), Some(home)) => home.join(rest.trim_start_matches(['/', '\\'])),
            _ => PathBuf::from(raw),
        }
    }

    fn build(
        &self,
        api_key: String,
        service_crn: String,
        account_name: Option<String>,
        source_path: Option<PathBuf>,
    ) -> QcapiResult<Credentials> {
        let raw_url = self
            .var(ENV_BASE_URL)
            .unwrap_or_else(|| infer_base_url(&service_crn));
        let base_url = parse_base_url(raw_url)?;
        let api_version = self
            .var(ENV_API_VERSION)
            .unwrap_or(DEFAULT_API_VERSION)
            .to_string();

        Ok(Credentials {
            api_key,
            service_crn,
            base_url,
            api_version,
            account_name,
            source_path,
        })
    }
}

/// Pick the regional endpoint from the Service CRN.
pub fn infer_base_url(service_crn: &str) -> &'static str {
    if service_crn.contains(EU_DE_CRN_MARKER) {
        EU_DE_BASE_URL
    } else {
        DEFAULT_BASE_URL
    }
}

fn parse_base_url(raw: &str) -> QcapiResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| QcapiError::Config(format!("Invalid base URL '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(QcapiError::Config(format!(
            "Base URL must be an absolute http(s) URL, got '{raw}'"
        )));
    }
    Ok(url)
}

/// Read the account file and keep its object-valued entries in file order.
fn load_accounts(path: &Path) -> QcapiResult<Vec<(String, Map<String, Value>)>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            QcapiError::Config(format!("Qiskit config not found: {}", path.display()))
        } else {
            QcapiError::Config(format!(
                "Failed to read Qiskit config {}: {e}",
                path.display()
            ))
        }
    })?;

    let root: Value = serde_json::from_str(&raw).map_err(|e| {
        QcapiError::Config(format!("Invalid JSON in Qiskit config {}: {e}", path.display()))
    })?;

    let Value::Object(entries) = root else {
        return Err(QcapiError::Config(format!(
            "Unexpected Qiskit config shape (expected object): {}",
            path.display()
        )));
    };

    let accounts: Vec<_> = entries
        .into_iter()
        .filter_map(|(name, cfg)| match cfg {
            Value::Object(obj) => Some((name, obj)),
            _ => None,
        })
        .collect();

    if accounts.is_empty() {
        return Err(QcapiError::Config(format!(
            "No accounts found in Qiskit config: {}",
            path.display()
        )));
    }
    Ok(accounts)
}

/// Choose one account: requested label, default flag, conventional name, first.
fn select_account<'a>(
    accounts: &'a [(String, Map<String, Value>)],
    requested: Option<&str>,
) -> QcapiResult<(&'a str, &'a Map<String, Value>)> {
    let by_name = |wanted: &str| -> Option<(&'a str, &'a Map<String, Value>)> {
        accounts
            .iter()
            .find(|(name, _)| name == wanted)
            .map(|(name, cfg)| (name.as_str(), cfg))
    };

    if let Some(wanted) = requested {
        return by_name(wanted).ok_or_else(|| {
            QcapiError::Config(format!("Account '{wanted}' not found in Qiskit config"))
        });
    }

    if let Some((name, cfg)) = accounts
        .iter()
        .find(|(_, cfg)| cfg.get("is_default_account") == Some(&Value::Bool(true)))
    {
        return Ok((name, cfg));
    }

    if let Some(found) = CONVENTIONAL_ACCOUNT_NAMES.iter().find_map(|&n| by_name(n)) {
        return Ok(found);
    }

    accounts
        .first()
        .map(|(name, cfg)| (name.as_str(), cfg))
        .ok_or_else(|| QcapiError::Config("No accounts found in Qiskit config".into()))
}

fn ensure_channel(name: &str, account: &Map<String, Value>) -> QcapiResult<()> {
    let channel = account.get("channel").and_then(Value::as_str);
    if channel == Some(REQUIRED_CHANNEL) {
        return Ok(());
    }
    Err(QcapiError::Config(format!(
        "Selected Qiskit account is not an IBM Cloud account. account='{name}' channel='{}'. \
         Pick an account with channel '{REQUIRED_CHANNEL}' or set {ENV_API_KEY}/{ENV_SERVICE_CRN} env vars.",
        channel.unwrap_or_default()
    )))
}

fn require_string(account: &Map<String, Value>, key: &str, error: &str) -> QcapiResult<String> {
    account
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| QcapiError::Config(error.to_string()))
}
