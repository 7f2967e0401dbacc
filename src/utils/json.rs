//! Lenient readers for API payload fields that may arrive either as parsed
//! JSON or as JSON-encoded strings.

use serde_json::Value as JsonValue;

/// Decodes a field that may hold JSON text. Strings that fail to parse
/// become `Null`; everything else is returned untouched.
pub fn decode_embedded(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return JsonValue::Null;
            }
            serde_json::from_str(trimmed).unwrap_or(JsonValue::Null)
        }
        other => other.clone(),
    }
}

/// Coerces a scalar to a finite number. Thousands separators are stripped
/// from strings before parsing.
pub fn to_number_or_null(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(number) => number.as_f64().filter(|v| v.is_finite()),
        JsonValue::String(raw) => parse_number(raw),
        _ => None,
    }
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Ids come back as numbers from some endpoints and strings from others.
pub fn to_id_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(id) => id.clone(),
        JsonValue::Number(id) => id.to_string(),
        _ => String::new(),
    }
}

pub fn to_optional_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) if !text.trim().is_empty() => Some(text.clone()),
        JsonValue::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
