use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::utils::json::parse_number;

/// Direction of a tracked metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum MetricType {
    Increase,
    #[default]
    Plus,
    Minus,
    Decrease,
    Maintain,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Increase => "Increase",
            MetricType::Plus => "Plus",
            MetricType::Minus => "Minus",
            MetricType::Decrease => "Decrease",
            MetricType::Maintain => "Maintain",
        }
    }

    /// Case-sensitive match against the five known spellings.
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "Increase" => Ok(MetricType::Increase),
            "Plus" => Ok(MetricType::Plus),
            "Minus" => Ok(MetricType::Minus),
            "Decrease" => Ok(MetricType::Decrease),
            "Maintain" => Ok(MetricType::Maintain),
            _ => Err(format!("Invalid metric type: {}", s)),
        }
    }

    /// Missing or unrecognized values fall back to `Plus`.
    pub fn from_optional(value: Option<&str>) -> Self {
        value
            .and_then(|raw| Self::from_str(raw).ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric payload resolved once at the input boundary.
///
/// The API sends metrics as bare numbers, as JSON text, or as objects keyed by
/// metric name. Everything downstream only sees one of these three shapes.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum MetricPayload {
    #[default]
    Absent,
    Scalar(f64),
    Named(JsonMap<String, JsonValue>),
}

impl MetricPayload {
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return MetricPayload::Absent;
                }
                match serde_json::from_str::<JsonValue>(trimmed) {
                    Ok(JsonValue::String(_)) => MetricPayload::Absent,
                    Ok(parsed) => Self::from_json(&parsed),
                    Err(_) => parse_number(trimmed)
                        .map(MetricPayload::Scalar)
                        .unwrap_or(MetricPayload::Absent),
                }
            }
            JsonValue::Number(number) => number
                .as_f64()
                .filter(|v| v.is_finite())
                .map(MetricPayload::Scalar)
                .unwrap_or(MetricPayload::Absent),
            JsonValue::Object(map) => MetricPayload::Named(map.clone()),
            _ => MetricPayload::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, MetricPayload::Absent)
    }

    pub fn as_named(&self) -> Option<&JsonMap<String, JsonValue>> {
        match self {
            MetricPayload::Named(map) => Some(map),
            _ => None,
        }
    }
}
