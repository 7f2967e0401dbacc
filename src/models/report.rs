use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::models::metric::{MetricPayload, MetricType};
use crate::models::period::PeriodGranularity;
use crate::services::period_normalizer::parse_period_instant;
use crate::utils::json::{decode_embedded, to_id_string, to_number_or_null, to_optional_string};

/// Keys under which report-shaped payloads nest their metric values.
pub const NESTED_METRIC_KEYS: [&str; 2] = ["currentMetric", "metrics_data"];

/// Timestamp fields of a history entry, in lookup order. The first readable
/// one is used.
const HISTORY_DATE_KEYS: [&str; 3] = ["date", "createdAt", "created_at"];

/// Top-level payload of the master report endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "RawMasterReport")]
pub struct MasterReport {
    pub goals: Vec<Goal>,
}

impl MasterReport {
    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.goals
            .iter()
            .flat_map(|goal| goal.tasks.iter())
            .flat_map(|task| task.activities.iter())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawGoal")]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub weight: Option<f64>,
    pub status: Option<String>,
    pub progress: Option<f64>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawTask")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub weight: Option<f64>,
    pub progress: Option<f64>,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawActivity")]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub weight: Option<f64>,
    pub metric_type: MetricType,
    pub target_metric: MetricPayload,
    pub current_metric: MetricPayload,
    pub previous_metric: MetricPayload,
    pub quarterly_goals: QuarterlyGoals,
    pub history: ActivityHistory,
    /// Backend-computed yearly total; preferred over the local sum.
    pub quarterly_total: Option<f64>,
    /// Backend-computed yearly progress; preferred over the local value.
    pub yearly_progress: Option<f64>,
}

/// Per-quarter targets, indexed by fiscal quarter number.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuarterlyGoals([Option<f64>; 4]);

impl QuarterlyGoals {
    pub fn from_json(value: &JsonValue) -> Self {
        let mut goals = [None; 4];
        if let JsonValue::Object(map) = decode_embedded(value) {
            for (key, raw) in &map {
                let quarter = key
                    .trim()
                    .strip_prefix(['q', 'Q'])
                    .and_then(|n| n.parse::<usize>().ok());
                if let Some(quarter @ 1..=4) = quarter {
                    goals[quarter - 1] = to_number_or_null(raw);
                }
            }
        }
        Self(goals)
    }

    pub fn get(&self, quarter: u8) -> Option<f64> {
        match quarter {
            1..=4 => self.0[quarter as usize - 1],
            _ => None,
        }
    }

    /// Sum of the quarters that carry a goal; `None` when none do.
    pub fn total(&self) -> Option<f64> {
        self.0
            .iter()
            .flatten()
            .fold(None, |acc, goal| Some(acc.unwrap_or(0.0) + goal))
    }
}

/// Raw history grouped by granularity and then by the period key exactly as
/// the API spelled it. Input order is preserved everywhere.
#[derive(Debug, Clone, Default)]
pub struct ActivityHistory {
    pub monthly: Vec<PeriodBucket>,
    pub quarterly: Vec<PeriodBucket>,
    pub annual: Vec<PeriodBucket>,
}

#[derive(Debug, Clone)]
pub struct PeriodBucket {
    pub raw_key: String,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub metrics: MetricPayload,
    /// First readable timestamp among `date`, `createdAt` and `created_at`.
    pub date: Option<String>,
}

impl ActivityHistory {
    pub fn from_json(value: &JsonValue) -> Self {
        let JsonValue::Object(map) = decode_embedded(value) else {
            return Self::default();
        };

        let bucket = |key: &str| {
            map.get(key)
                .map(|periods| parse_buckets(&decode_embedded(periods)))
                .unwrap_or_default()
        };

        Self {
            monthly: bucket("monthly"),
            quarterly: bucket("quarterly"),
            annual: bucket("annual"),
        }
    }

    pub fn bucket(&self, granularity: PeriodGranularity) -> &[PeriodBucket] {
        match granularity {
            PeriodGranularity::Monthly => &self.monthly,
            PeriodGranularity::Quarterly => &self.quarterly,
            PeriodGranularity::Annual => &self.annual,
        }
    }

    /// Every entry, monthly first, then quarterly, then annual.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        PeriodGranularity::ALL
            .into_iter()
            .flat_map(move |granularity| self.bucket(granularity).iter())
            .flat_map(|bucket| bucket.entries.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.monthly.is_empty() && self.quarterly.is_empty() && self.annual.is_empty()
    }
}

fn parse_buckets(periods: &JsonValue) -> Vec<PeriodBucket> {
    let JsonValue::Object(periods) = periods else {
        return Vec::new();
    };

    periods
        .iter()
        .map(|(raw_key, reports)| PeriodBucket {
            raw_key: raw_key.clone(),
            entries: parse_entries(&decode_embedded(reports)),
        })
        .collect()
}

fn parse_entries(reports: &JsonValue) -> Vec<HistoryEntry> {
    match reports {
        JsonValue::Array(items) => items
            .iter()
            .filter_map(|item| match decode_embedded(item) {
                JsonValue::Object(report) => Some(HistoryEntry::from_report(&report)),
                _ => None,
            })
            .collect(),
        JsonValue::Object(report) => vec![HistoryEntry::from_report(report)],
        _ => Vec::new(),
    }
}

impl HistoryEntry {
    fn from_report(report: &JsonMap<String, JsonValue>) -> Self {
        let metrics = match report.get("metrics") {
            Some(metrics) => MetricPayload::from_json(metrics),
            None => {
                let nested: JsonMap<String, JsonValue> = NESTED_METRIC_KEYS
                    .iter()
                    .filter_map(|key| report.get(*key).map(|v| (key.to_string(), v.clone())))
                    .collect();
                if nested.is_empty() {
                    MetricPayload::Absent
                } else {
                    MetricPayload::Named(nested)
                }
            }
        };

        let date = HISTORY_DATE_KEYS
            .iter()
            .filter_map(|key| report.get(*key))
            .filter_map(to_optional_string)
            .find(|raw| parse_period_instant(raw).is_some());

        Self { metrics, date }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMasterReport {
    goals: Option<Vec<Goal>>,
}

impl From<RawMasterReport> for MasterReport {
    fn from(raw: RawMasterReport) -> Self {
        Self {
            goals: raw.goals.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawGoal {
    id: JsonValue,
    #[serde(alias = "name")]
    title: JsonValue,
    weight: JsonValue,
    status: JsonValue,
    progress: JsonValue,
    tasks: Option<Vec<Task>>,
}

impl From<RawGoal> for Goal {
    fn from(raw: RawGoal) -> Self {
        Self {
            id: to_id_string(&raw.id),
            title: to_optional_string(&raw.title).unwrap_or_default(),
            weight: to_number_or_null(&raw.weight),
            status: to_optional_string(&raw.status),
            progress: to_number_or_null(&raw.progress),
            tasks: raw.tasks.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawTask {
    id: JsonValue,
    #[serde(alias = "name")]
    title: JsonValue,
    weight: JsonValue,
    progress: JsonValue,
    activities: Option<Vec<Activity>>,
}

impl From<RawTask> for Task {
    fn from(raw: RawTask) -> Self {
        Self {
            id: to_id_string(&raw.id),
            title: to_optional_string(&raw.title).unwrap_or_default(),
            weight: to_number_or_null(&raw.weight),
            progress: to_number_or_null(&raw.progress),
            activities: raw.activities.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawActivity {
    id: JsonValue,
    #[serde(alias = "name")]
    title: JsonValue,
    weight: JsonValue,
    #[serde(alias = "metric_type")]
    metric_type: JsonValue,
    #[serde(alias = "target_metric")]
    target_metric: JsonValue,
    #[serde(alias = "current_metric")]
    current_metric: JsonValue,
    #[serde(alias = "previous_metric")]
    previous_metric: JsonValue,
    #[serde(alias = "quarterly_goals")]
    quarterly_goals: JsonValue,
    history: JsonValue,
    #[serde(alias = "quarterly_total")]
    quarterly_total: JsonValue,
    #[serde(alias = "yearly_progress")]
    yearly_progress: JsonValue,
}

impl From<RawActivity> for Activity {
    fn from(raw: RawActivity) -> Self {
        Self {
            id: to_id_string(&raw.id),
            title: to_optional_string(&raw.title).unwrap_or_default(),
            weight: to_number_or_null(&raw.weight),
            metric_type: MetricType::from_optional(raw.metric_type.as_str()),
            target_metric: MetricPayload::from_json(&raw.target_metric),
            current_metric: MetricPayload::from_json(&raw.current_metric),
            previous_metric: MetricPayload::from_json(&raw.previous_metric),
            quarterly_goals: QuarterlyGoals::from_json(&raw.quarterly_goals),
            history: ActivityHistory::from_json(&raw.history),
            quarterly_total: to_number_or_null(&raw.quarterly_total),
            yearly_progress: to_number_or_null(&raw.yearly_progress),
        }
    }
}
