//! Tolerant extraction of backend and job records from REST responses.
//!
//! The Qiskit Runtime API has returned backends as a bare array, as
//! `{"backends": [...]}`, as `{"devices": [...]}` and under other envelopes,
//! depending on deployment and API version. Jobs vary the same way. The
//! functions here locate the payload array with an ordered list of
//! [`PayloadStrategy`] checks and map each element through ordered field
//! fallbacks.
//!
//! Nothing in this module fails: an unexpected shape yields an empty list or
//! `None` fields.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::types::{BackendSummary, JobSummary};

/// Name used for backends whose payload carries no usable name.
pub const UNKNOWN_BACKEND_NAME: &str = "(unknown)";

/// Envelope keys that may hold the backend array.
pub const BACKEND_ENVELOPE_KEYS: &[&str] = &["backends", "devices", "items", "results", "data"];

/// Envelope keys that may hold the job array.
pub const JOB_ENVELOPE_KEYS: &[&str] = &["jobs", "items", "results", "data"];

const BACKEND_NAME_FIELDS: &[&str] = &["name", "backend_name", "id", "backend"];
const STATUS_NAME_FIELDS: &[&str] = &["name", "status", "state", "value"];
const STATUS_REASON_FIELDS: &[&str] = &["reason", "message", "detail"];
const SIMULATOR_FLAG_FIELDS: &[&str] = &["simulator", "is_simulator"];
const SIMULATOR_NAME_MARKER: &str = "simulator";

const JOB_ID_FIELDS: &[&str] = &["id", "job_id", "jobId"];
const JOB_NESTED_BACKEND_FIELDS: &[&str] = &["name", "backend_name", "id"];
const JOB_BACKEND_FALLBACK_FIELDS: &[&str] = &["backend_name", "device", "target"];
const JOB_STATUS_FIELDS: &[&str] = &["status", "state"];
const JOB_CREATED_FIELDS: &[&str] = &["created", "created_at", "creation_date"];

/// Strings accepted as `true` by the lenient simulator check.
const TRUTHY_STRINGS: &[&str] = &["1", "true", "yes", "y"];

// ============================================================================
// Payload location
// ============================================================================

/// One way of locating the payload array inside a response document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStrategy {
    /// The document itself is an array.
    RootArray,
    /// The first of these object keys whose value is an array.
    EnvelopeKeys(&'static [&'static str]),
    /// The only array-valued property of an object; ambiguous when several exist.
    SoleArrayProperty,
}

impl PayloadStrategy {
    /// Try this strategy on `root`.
    pub fn locate<'a>(&self, root: &'a Value) -> Option<&'a [Value]> {
        match self {
            Self::RootArray => root.as_array().map(Vec::as_slice),
            Self::EnvelopeKeys(keys) => {
                let obj = root.as_object()?;
                keys.iter()
                    .find_map(|key| obj.get(*key).and_then(Value::as_array))
                    .map(Vec::as_slice)
            }
            Self::SoleArrayProperty => {
                let mut arrays = root.as_object()?.values().filter_map(Value::as_array);
                match (arrays.next(), arrays.next()) {
                    (Some(only), None) => Some(only.as_slice()),
                    _ => None,
                }
            }
        }
    }
}

/// Strategies for backend listings.
pub const BACKEND_PAYLOAD: &[PayloadStrategy] = &[
    PayloadStrategy::RootArray,
    PayloadStrategy::EnvelopeKeys(BACKEND_ENVELOPE_KEYS),
    PayloadStrategy::SoleArrayProperty,
];

/// Strategies for the physical-backend set used to filter jobs. Only known
/// envelopes count; a lone unknown array never qualifies a backend.
pub const PHYSICAL_BACKEND_PAYLOAD: &[PayloadStrategy] = &[
    PayloadStrategy::RootArray,
    PayloadStrategy::EnvelopeKeys(BACKEND_ENVELOPE_KEYS),
];

/// Strategies for job listings. No sole-array fallback: an unrecognised
/// envelope yields no jobs.
pub const JOB_PAYLOAD: &[PayloadStrategy] = &[
    PayloadStrategy::RootArray,
    PayloadStrategy::EnvelopeKeys(JOB_ENVELOPE_KEYS),
];

/// Apply `strategies` in order; the first hit wins, no hit is an empty slice.
pub fn locate_payload<'a>(root: &'a Value, strategies: &[PayloadStrategy]) -> &'a [Value] {
    strategies
        .iter()
        .find_map(|strategy| strategy.locate(root))
        .unwrap_or_default()
}

/// Object elements of the located payload, in document order.
fn payload_objects<'a>(
    root: &'a Value,
    strategies: &[PayloadStrategy],
) -> impl Iterator<Item = &'a Map<String, Value>> {
    locate_payload(root, strategies)
        .iter()
        .filter_map(Value::as_object)
}

// ============================================================================
// Field helpers
// ============================================================================

/// First field among `keys` holding a non-blank string.
fn first_string<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// Lenient boolean: JSON booleans, `"1"/"true"/"yes"/"y"`, and nonzero numbers.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            TRUTHY_STRINGS.contains(&s.as_str())
        }
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

// ============================================================================
// Backends
// ============================================================================

/// Map a backend listing into summaries, one per object element, in order.
pub fn extract_backends(root: &Value) -> Vec<BackendSummary> {
    let items = locate_payload(root, BACKEND_PAYLOAD);
    if items.is_empty() && !root.is_null() {
        tracing::debug!("no backend array found in response");
    }
    items
        .iter()
        .filter_map(|item| item.as_object().map(|obj| backend_summary(obj, item)))
        .collect()
}

fn backend_summary(obj: &Map<String, Value>, raw: &Value) -> BackendSummary {
    BackendSummary {
        name: first_string(obj, BACKEND_NAME_FIELDS)
            .unwrap_or(UNKNOWN_BACKEND_NAME)
            .to_string(),
        simulator: obj.get("simulator").and_then(Value::as_bool),
        status: obj.get("status").and_then(status_text),
        raw: raw.clone(),
    }
}

/// Render a backend `status` field.
///
/// Strings pass through verbatim. Objects combine a name-like and a
/// reason-like sub-field as `"<name> (<reason>)"`, collapsing to `<name>` when
/// both say the same thing. Other kinds give `None`.
pub fn status_text(status: &Value) -> Option<String> {
    match status {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => {
            let name = first_string(obj, STATUS_NAME_FIELDS);
            let reason = first_string(obj, STATUS_REASON_FIELDS);
            match (name, reason) {
                (Some(name), Some(reason)) if name.eq_ignore_ascii_case(reason) => {
                    Some(name.to_string())
                }
                (Some(name), Some(reason)) => Some(format!("{name} ({reason})")),
                (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
                (None, None) => None,
            }
        }
        _ => None,
    }
}

/// Whether a backend element describes a simulator, using every hint available.
///
/// An explicit flag decides when present, whatever its encoding; otherwise
/// the backend name is checked for "simulator".
pub fn is_simulator_backend(obj: &Map<String, Value>) -> bool {
    if let Some(flag) = SIMULATOR_FLAG_FIELDS.iter().find_map(|key| obj.get(*key)) {
        return truthy(flag);
    }
    first_string(obj, BACKEND_NAME_FIELDS)
        .is_some_and(|name| name.to_ascii_lowercase().contains(SIMULATOR_NAME_MARKER))
}

/// Lower-cased names of the non-simulator backends in a backend listing.
pub fn physical_backend_names(root: &Value) -> HashSet<String> {
    payload_objects(root, PHYSICAL_BACKEND_PAYLOAD)
        .filter(|obj| !is_simulator_backend(obj))
        .filter_map(|obj| first_string(obj, BACKEND_NAME_FIELDS))
        .map(str::to_lowercase)
        .collect()
}

// ============================================================================
// Jobs
// ============================================================================

/// Rules for finding the backend a job ran on, tried in order.
const JOB_BACKEND_RULES: [for<'a> fn(&'a Map<String, Value>) -> Option<&'a str>; 3] = [
    backend_as_string,
    backend_as_object,
    backend_from_job_fields,
];

fn backend_as_string(job: &Map<String, Value>) -> Option<&str> {
    job.get("backend")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn backend_as_object(job: &Map<String, Value>) -> Option<&str> {
    job.get("backend")
        .and_then(Value::as_object)
        .and_then(|backend| first_string(backend, JOB_NESTED_BACKEND_FIELDS))
}

fn backend_from_job_fields(job: &Map<String, Value>) -> Option<&str> {
    first_string(job, JOB_BACKEND_FALLBACK_FIELDS)
}

/// Backend name a job element refers to.
pub fn job_backend_name(job: &Map<String, Value>) -> Option<&str> {
    JOB_BACKEND_RULES.iter().find_map(|rule| rule(job))
}

/// Build a summary for a job element; `None` when it has no id.
fn job_summary(obj: &Map<String, Value>, raw: &Value) -> Option<JobSummary> {
    let id = first_string(obj, JOB_ID_FIELDS)?;
    Some(JobSummary {
        id: id.to_string(),
        backend: job_backend_name(obj).map(str::to_string),
        status: first_string(obj, JOB_STATUS_FIELDS).map(str::to_string),
        created: first_string(obj, JOB_CREATED_FIELDS).map(str::to_string),
        raw: raw.clone(),
    })
}

/// All jobs with an id, in document order.
pub fn extract_jobs(jobs_root: &Value) -> Vec<JobSummary> {
    extract_recent_jobs(jobs_root, None, usize::MAX)
}

/// Up to `limit` jobs in document order.
///
/// With `backends_root`, only jobs whose backend is a non-simulator backend
/// of that listing (compared case-insensitively) qualify.
pub fn extract_recent_jobs(
    jobs_root: &Value,
    backends_root: Option<&Value>,
    limit: usize,
) -> Vec<JobSummary> {
    let physical = backends_root.map(physical_backend_names);
    if physical.as_ref().is_some_and(HashSet::is_empty) {
        tracing::debug!("no physical backends in listing; no job can qualify");
        return Vec::new();
    }

    let mut out = Vec::new();
    for item in locate_payload(jobs_root, JOB_PAYLOAD) {
        if out.len() >= limit {
            break;
        }
        let Some(obj) = item.as_object() else {
            continue;
        };
        if let Some(physical) = &physical {
            let on_physical = job_backend_name(obj)
                .is_some_and(|name| physical.contains(&name.to_lowercase()));
            if !on_physical {
                continue;
            }
        }
        if let Some(summary) = job_summary(obj, item) {
            out.push(summary);
        }
    }
    out
}

/// The first qualifying job in document order.
///
/// The API lists newest jobs first, so document order is authoritative;
/// timestamps are never compared.
pub fn extract_latest_job(jobs_root: &Value, backends_root: Option<&Value>) -> Option<JobSummary> {
    extract_recent_jobs(jobs_root, backends_root, 1).into_iter().next()
}
