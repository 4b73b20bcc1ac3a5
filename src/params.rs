//! Sanitization of bound parameters and SQL text for logging.
//!
//! Bound values are converted to JSON once, at log time; the values handed
//! to the driver are never touched. Conversion guards the structured-log
//! encoder against arbitrary binary payloads, and normalization bounds the
//! size of every string leaf.

use sea_orm::Value;
use serde_json::Value as JsonValue;

/// Maximum length of a logged string parameter, in characters.
pub const MAX_STRING_LENGTH: usize = 32;

/// Sentinel substituted for byte payloads that are not valid UTF-8.
pub const BINARY_DATA_VALUE: &str = "(binary value)";

/// Trim marker used by [`truncate_middle`].
const TRIM_MARKER: &str = "...";

/// Convert a single bound value into a loggable JSON value.
///
/// Byte payloads that fail UTF-8 validation become [`BINARY_DATA_VALUE`];
/// valid payloads are logged as text. Anything this module does not map
/// explicitly falls back to its `Debug` rendering, so the conversion never
/// fails.
#[allow(unreachable_patterns)] // feature-gated Value variants hit the fallback arm
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Bool(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::TinyInt(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::SmallInt(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::Int(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::BigInt(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::TinyUnsigned(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::SmallUnsigned(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::Unsigned(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::BigUnsigned(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::Float(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::Double(v) => v.map(JsonValue::from).unwrap_or(JsonValue::Null),
        Value::Char(v) => v
            .map(|c| JsonValue::String(c.to_string()))
            .unwrap_or(JsonValue::Null),
        Value::String(v) => v
            .as_ref()
            .map(|s| JsonValue::String(s.as_str().to_owned()))
            .unwrap_or(JsonValue::Null),
        Value::Bytes(v) => match v {
            Some(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => JsonValue::String(text.to_owned()),
                Err(_) => JsonValue::String(BINARY_DATA_VALUE.to_owned()),
            },
            None => JsonValue::Null,
        },
        other => JsonValue::String(format!("{other:?}")),
    }
}

/// Recursively bound the size of every string leaf in a parameter value.
///
/// The key set and nesting shape are preserved; only string leaves longer
/// than [`MAX_STRING_LENGTH`] characters are shortened to a recognizable
/// prefix plus a ` [...]` marker. Returns a new value, leaving the input
/// untouched.
pub fn normalize(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), normalize(item)))
                .collect(),
        ),
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(normalize).collect()),
        JsonValue::String(text) => JsonValue::String(shorten(text)),
        other => other.clone(),
    }
}

fn shorten(text: &str) -> String {
    if text.chars().count() <= MAX_STRING_LENGTH {
        return text.to_owned();
    }

    let prefix: String = text.chars().take(MAX_STRING_LENGTH - 6).collect();
    format!("{prefix} [...]")
}

/// Shorten SQL text to `max_length` characters, keeping head and tail and
/// marking the cut with `...`. Character-safe on multi-byte input.
pub fn truncate_middle(text: &str, max_length: usize) -> String {
    let count = text.chars().count();
    if count <= max_length {
        return text.to_owned();
    }
    if max_length <= TRIM_MARKER.len() {
        return text.chars().take(max_length).collect();
    }

    let kept = max_length - TRIM_MARKER.len();
    let head = kept - kept / 2;
    let tail = kept / 2;

    let start: String = text.chars().take(head).collect();
    let end: String = text.chars().skip(count - tail).collect();
    format!("{start}{TRIM_MARKER}{end}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_strings_pass_through() {
        let input = json!({"normal": "value"});
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn long_string_keeps_prefix_and_marker() {
        let long = "a".repeat(40);
        let normalized = normalize(&json!(long));

        let expected = format!("{} [...]", "a".repeat(26));
        assert_eq!(normalized, json!(expected));
        assert_eq!(expected.chars().count(), MAX_STRING_LENGTH);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "å".repeat(40);
        let normalized = normalize(&json!(long));

        assert_eq!(normalized, json!(format!("{} [...]", "å".repeat(26))));
    }

    #[test]
    fn nested_shape_is_preserved() {
        let input = json!({
            "outer": {
                "long": "x".repeat(50),
                "list": [1, "y".repeat(50), true],
            },
            "n": 42,
        });
        let normalized = normalize(&input);

        assert_eq!(
            normalized,
            json!({
                "outer": {
                    "long": format!("{} [...]", "x".repeat(26)),
                    "list": [1, format!("{} [...]", "y".repeat(26)), true],
                },
                "n": 42,
            })
        );
        // original untouched
        assert_eq!(input["outer"]["long"].as_str().unwrap().len(), 50);
    }

    #[test]
    fn normalize_is_idempotent() {
        let input = json!({"long": "z".repeat(100), "short": "ok"});
        let once = normalize(&input);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn invalid_utf8_bytes_become_sentinel() {
        let value = Value::Bytes(Some(Box::new(vec![0xff, 0xfe, 0x00])));
        assert_eq!(value_to_json(&value), json!(BINARY_DATA_VALUE));
    }

    #[test]
    fn valid_utf8_bytes_become_text() {
        let value = Value::Bytes(Some(Box::new(b"hello".to_vec())));
        assert_eq!(value_to_json(&value), json!("hello"));
    }

    #[test]
    fn scalars_convert_naturally() {
        assert_eq!(value_to_json(&Value::Int(Some(42))), json!(42));
        assert_eq!(value_to_json(&Value::Bool(Some(true))), json!(true));
        assert_eq!(value_to_json(&Value::String(None)), JsonValue::Null);
        assert_eq!(
            value_to_json(&Value::String(Some(Box::new("x".to_owned())))),
            json!("x")
        );
    }

    #[test]
    fn middle_truncation_keeps_head_and_tail() {
        let sql = format!("SELECT {} FROM t", "c,".repeat(600));
        let truncated = truncate_middle(&sql, 20);

        assert_eq!(truncated.chars().count(), 20);
        assert!(truncated.starts_with("SELECT "));
        assert!(truncated.ends_with("FROM t"));
        assert!(truncated.contains("..."));
    }

    #[test]
    fn middle_truncation_is_a_noop_when_short() {
        assert_eq!(truncate_middle("SELECT 1", 1000), "SELECT 1");
    }
}
