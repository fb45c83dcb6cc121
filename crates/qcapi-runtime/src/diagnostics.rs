//! Diagnostic logging helpers.

use serde_json::Value;

/// Maximum number of characters of a JSON document written to the log.
pub const MAX_LOGGED_JSON_CHARS: usize = 20_000;

/// Truncate `text` to at most `max_chars` characters, appending a marker when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\n... (truncated)", &text[..idx]),
        None => text.to_string(),
    }
}

/// Log a raw JSON document at debug level, pretty-printed and bounded in size.
pub fn log_json(context: &str, value: &Value) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(pretty) => {
            tracing::debug!("{context} JSON:\n{}", truncate(&pretty, MAX_LOGGED_JSON_CHARS));
        }
        Err(e) => tracing::warn!("{context}: failed to serialize JSON for logging: {e}"),
    }
}
