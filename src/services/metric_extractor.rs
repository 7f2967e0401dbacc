use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::models::metric::MetricPayload;
use crate::models::report::{Activity, NESTED_METRIC_KEYS};

pub use crate::utils::json::to_number_or_null;

/// Resolves the single metric key an activity is measured by.
///
/// Precedence: first key of `targetMetric`, then of `currentMetric`, then the
/// first key of the first metrics object found in the history (monthly,
/// quarterly, annual; input order within each).
pub fn pick_metric_key(activity: &Activity) -> Option<String> {
    first_metric_key(&activity.target_metric)
        .or_else(|| first_metric_key(&activity.current_metric))
        .or_else(|| {
            activity
                .history
                .entries()
                .find_map(|entry| first_metric_key(&entry.metrics))
        })
}

/// First metric name in a payload. Report-shaped payloads contribute the
/// first key of their nested `currentMetric`/`metrics_data` object.
pub fn first_metric_key(payload: &MetricPayload) -> Option<String> {
    let map = payload.as_named()?;
    top_level_key(map).or_else(|| {
        nested_payloads(map).find_map(|nested| nested.as_named().and_then(top_level_key))
    })
}

/// Pulls one numeric value out of a payload.
///
/// A bare number is returned as is. With a key, the top-level entry wins and
/// one level of `currentMetric`/`metrics_data` nesting is searched next.
/// Without a key the first numeric value in the same order is returned.
pub fn extract_value(payload: &MetricPayload, key: Option<&str>) -> Option<f64> {
    match payload {
        MetricPayload::Absent => None,
        MetricPayload::Scalar(value) => Some(*value),
        MetricPayload::Named(map) => extract_from_map(map, key).or_else(|| {
            nested_payloads(map).find_map(|nested| match nested {
                MetricPayload::Scalar(value) => Some(value),
                MetricPayload::Named(inner) => extract_from_map(&inner, key),
                MetricPayload::Absent => None,
            })
        }),
    }
}

/// Convenience over [`extract_value`] for payloads still in raw JSON form.
pub fn extract_json_value(value: &JsonValue, key: Option<&str>) -> Option<f64> {
    extract_value(&MetricPayload::from_json(value), key)
}

fn extract_from_map(map: &JsonMap<String, JsonValue>, key: Option<&str>) -> Option<f64> {
    match key {
        Some(key) => map.get(key).and_then(to_number_or_null),
        None => map
            .iter()
            .filter(|(name, _)| !is_nested_key(name))
            .find_map(|(_, value)| to_number_or_null(value)),
    }
}

fn top_level_key(map: &JsonMap<String, JsonValue>) -> Option<String> {
    map.keys().find(|name| !is_nested_key(name)).cloned()
}

fn nested_payloads(map: &JsonMap<String, JsonValue>) -> impl Iterator<Item = MetricPayload> + '_ {
    NESTED_METRIC_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .map(MetricPayload::from_json)
}

fn is_nested_key(name: &str) -> bool {
    NESTED_METRIC_KEYS.contains(&name)
}
