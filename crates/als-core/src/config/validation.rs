//! Config validation - warns about unknown fields

use serde_json::Value;
use tracing::warn;

/// Keys understood by [`super::Config`].
const EXPECTED_KEYS: &[&str] = &[
    "grabrect",
    "radius",
    "displayWidth",
    "displayHeight",
    "captureTimeoutMs",
    "responseLayout",
    "socketPath",
];

/// Validate JSON config and warn about unknown fields.
pub fn warn_unknown_fields(content: &str, config_name: &str) {
    let Ok(value) = serde_json::from_str::<Value>(content) else {
        return;
    };

    for key in find_unknown_keys(&value) {
        warn!("Unknown config field in {config_name}: {key}");
    }
}

/// Top-level keys of `value` that the config does not know about.
fn find_unknown_keys(value: &Value) -> Vec<String> {
    let Value::Object(obj) = value else {
        return Vec::new();
    };

    obj.keys()
        .filter(|key| !EXPECTED_KEYS.contains(&key.as_str()))
        .cloned()
        .collect()
}
