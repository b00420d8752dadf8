//! Sensitive-key masking and length limits for request data

use serde_json::Value;
use std::collections::BTreeMap;

/// Replacement for sensitive values that are not strings
pub const HIDDEN: &str = "[HIDDEN]";

/// Replacement for sensitive query parameters in the displayed URL
pub const FILTERED: &str = "[FILTERED]";

/// Appended to strings cut at the length limit
pub const ELLIPSIS: &str = "...";

/// Key under which a truncated map records how much was dropped; dots are
/// appended while the key is taken by a kept entry
pub const MORE_ITEMS_KEY: &str = "...";

/// Longest run of asterisks a mask will emit
const MAX_MASK_WIDTH: usize = 64;

/// Case-insensitive substrings that mark a key as sensitive
const SENSITIVE_TERMS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "secret",
    "token",
    "key",
    "auth",
    "credential",
    "cookie",
    "session",
    "csrf",
    "private",
];

pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_TERMS.iter().any(|term| lower.contains(term))
}

/// Mask a string, keeping the first and last two characters of longer values.
///
/// The result never equals the input.
pub fn mask_string(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();

    let masked = if chars.len() <= 4 {
        "*".repeat(chars.len().max(1))
    } else {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        let width = (chars.len() - 4).min(MAX_MASK_WIDTH);
        format!("{}{}{}", head, "*".repeat(width), tail)
    };

    if masked != raw {
        return masked;
    }

    // Input was already a mask of itself
    match chars.len() {
        0..=4 => format!("{}*", masked),
        _ => {
            let (head, tail) = masked.split_at(2);
            format!("{}*{}", head, tail)
        }
    }
}

/// Mask a value under a sensitive key
pub fn mask_value(value: &Value) -> String {
    match value {
        Value::String(s) => mask_string(s),
        _ => HIDDEN.to_string(),
    }
}

/// Recursively mask values under sensitive keys inside arrays and objects
pub fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let redacted = if is_sensitive_key(k) {
                        Value::String(mask_value(v))
                    } else {
                        redact_value(v)
                    };
                    (k.clone(), redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        other => other.clone(),
    }
}

/// Plain display form of a JSON value (strings unquoted)
pub fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Cut a string to `max` characters, appending an ellipsis when cut
pub fn truncate_string(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{}", &value[..cut], ELLIPSIS),
        None => value.to_string(),
    }
}

/// Keep the first `max_items` entries, recording how many were dropped
pub fn truncate_map<V>(map: BTreeMap<String, V>, max_items: usize, marker: impl Fn(usize) -> V) -> BTreeMap<String, V> {
    let total = map.len();
    if total <= max_items {
        return map;
    }

    let mut kept: BTreeMap<String, V> = map.into_iter().take(max_items).collect();
    let mut key = MORE_ITEMS_KEY.to_string();
    while kept.contains_key(&key) {
        key.push('.');
    }
    kept.insert(key, marker(total - max_items));
    kept
}

/// Text of the marker left by [`truncate_map`]
pub fn more_items_marker(count: usize) -> String {
    format!("... {} more items", count)
}
