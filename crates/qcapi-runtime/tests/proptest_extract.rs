//! Property-based tests for response extraction.
//!
//! Extraction must never fail, must keep document order, and must never
//! produce an empty backend name, whatever shape the API sends.

use proptest::prelude::*;
use serde_json::{Map, Value, json};

use qcapi_runtime::extract::{
    BACKEND_ENVELOPE_KEYS, JOB_ENVELOPE_KEYS, UNKNOWN_BACKEND_NAME, extract_backends, extract_jobs,
    extract_latest_job,
};

/// Arbitrary JSON up to a small depth.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z_]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,12}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// A backend element whose name may live under any fallback field, or none.
fn arb_backend() -> impl Strategy<Value = Value> {
    (
        prop::option::of(prop::sample::select(vec!["name", "backend_name", "id", "backend"])),
        "[a-z]{1,8}_[a-z0-9]{1,6}",
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(key, name, simulator)| {
            let mut obj = Map::new();
            if let Some(key) = key {
                obj.insert(key.to_string(), Value::String(name));
            }
            if let Some(sim) = simulator {
                obj.insert("simulator".to_string(), Value::Bool(sim));
            }
            Value::Object(obj)
        })
}

/// Wrap items as a root array or under one of the envelope keys.
fn wrap(items: Vec<Value>, envelope: Option<&str>) -> Value {
    match envelope {
        None => Value::Array(items),
        Some(key) => {
            let mut obj = Map::new();
            obj.insert(key.to_string(), Value::Array(items));
            Value::Object(obj)
        }
    }
}

proptest! {
    #[test]
    fn extraction_never_panics(root in arb_json(), backends in arb_json()) {
        let _ = extract_backends(&root);
        let _ = extract_jobs(&root);
        let _ = extract_latest_job(&root, Some(&backends));
    }

    #[test]
    fn one_backend_per_element_in_order(
        items in prop::collection::vec(arb_backend(), 0..12),
        envelope in prop::option::of(prop::sample::select(BACKEND_ENVELOPE_KEYS.to_vec())),
    ) {
        let backends = extract_backends(&wrap(items.clone(), envelope));
        prop_assert_eq!(backends.len(), items.len());

        for (summary, item) in backends.iter().zip(&items) {
            prop_assert!(!summary.name.is_empty());
            prop_assert_eq!(&summary.raw, item);
            let expected = ["name", "backend_name", "id", "backend"]
                .iter()
                .find_map(|k| item.get(*k).and_then(Value::as_str))
                .unwrap_or(UNKNOWN_BACKEND_NAME);
            prop_assert_eq!(summary.name.as_str(), expected);
            prop_assert_eq!(summary.simulator, item.get("simulator").and_then(Value::as_bool));
        }
    }

    #[test]
    fn unfiltered_latest_is_first_job_with_id(
        ids in prop::collection::vec(prop::option::of("[a-f0-9]{4,12}"), 0..10),
        envelope in prop::option::of(prop::sample::select(JOB_ENVELOPE_KEYS.to_vec())),
    ) {
        let items: Vec<Value> = ids
            .iter()
            .map(|id| match id {
                Some(id) => json!({"id": id, "backend": "ibm_fez"}),
                None => json!({"backend": "ibm_fez"}),
            })
            .collect();
        let root = wrap(items, envelope);

        let expected = ids.iter().flatten().next().cloned();
        prop_assert_eq!(extract_latest_job(&root, None).map(|j| j.id), expected);
        prop_assert_eq!(extract_jobs(&root).len(), ids.iter().flatten().count());
    }

    #[test]
    fn filtered_latest_skips_simulators(
        flags in prop::collection::vec(any::<bool>(), 1..10),
    ) {
        let backends: Vec<Value> = flags
            .iter()
            .enumerate()
            .map(|(i, sim)| json!({"name": format!("dev_{i}"), "simulator": sim}))
            .collect();
        let jobs: Vec<Value> = (0..flags.len())
            .map(|i| json!({"id": format!("job-{i}"), "backend": format!("DEV_{i}")}))
            .collect();

        let expected = flags.iter().position(|sim| !sim).map(|i| format!("job-{i}"));
        let latest = extract_latest_job(&json!({"jobs": jobs}), Some(&json!(backends)));
        prop_assert_eq!(latest.map(|j| j.id), expected);
    }
}
