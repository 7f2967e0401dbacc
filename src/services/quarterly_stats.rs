use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::debug;

use crate::models::metric::MetricType;
use crate::models::period::{FiscalQuarter, PeriodGranularity};
use crate::models::report::{Activity, HistoryEntry};
use crate::services::metric_extractor::extract_value;
use crate::services::period_normalizer::{parse_period_instant, PeriodNormalizer};
use crate::services::progress_calculator::calculate_progress;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuarterlyStats {
    pub goal: Option<f64>,
    pub record: Option<f64>,
    pub progress: Option<f64>,
}

/// Answers goal/record/progress questions for single activities.
pub struct QuarterlyStatsResolver<'a> {
    normalizer: &'a PeriodNormalizer,
}

impl<'a> QuarterlyStatsResolver<'a> {
    pub fn new(normalizer: &'a PeriodNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn get_quarterly_stats(
        &self,
        activity: &Activity,
        fiscal_period_key: &str,
        metric_key: Option<&str>,
        metric_type: MetricType,
    ) -> QuarterlyStats {
        let Some(quarter) = FiscalQuarter::parse(fiscal_period_key) else {
            debug!(
                target: "app::report::stats",
                activity_id = %activity.id,
                period = fiscal_period_key,
                "invalid fiscal period key"
            );
            return QuarterlyStats::default();
        };

        let goal = activity.quarterly_goals.get(quarter.quarter);
        let record = self.latest_period_value(
            activity,
            PeriodGranularity::Quarterly,
            &quarter.key(),
            metric_key,
        );

        QuarterlyStats {
            goal,
            record,
            progress: calculate_progress(record, goal, metric_type),
        }
    }

    /// Latest recorded value among the history entries whose raw period key
    /// normalizes to `period_key`.
    ///
    /// Entries are sorted by date, undated ones first, keeping input order on
    /// ties; the newest entry with a readable value wins.
    pub fn latest_period_value(
        &self,
        activity: &Activity,
        granularity: PeriodGranularity,
        period_key: &str,
        metric_key: Option<&str>,
    ) -> Option<f64> {
        let mut entries: Vec<(Option<NaiveDateTime>, &HistoryEntry)> = activity
            .history
            .bucket(granularity)
            .iter()
            .filter(|bucket| {
                self.normalizer
                    .normalize(&bucket.raw_key, granularity)
                    .is_some_and(|key| key == period_key)
            })
            .flat_map(|bucket| bucket.entries.iter())
            .map(|entry| (entry.date.as_deref().and_then(parse_period_instant), entry))
            .collect();

        entries.sort_by(|left, right| left.0.cmp(&right.0));

        entries
            .iter()
            .rev()
            .find_map(|(_, entry)| extract_value(&entry.metrics, metric_key))
    }

    /// Canonical keys of every quarter present in the quarterly history.
    pub fn history_quarters(&self, activity: &Activity) -> BTreeSet<String> {
        activity
            .history
            .quarterly
            .iter()
            .filter_map(|bucket| {
                self.normalizer
                    .normalize(&bucket.raw_key, PeriodGranularity::Quarterly)
            })
            .collect()
    }

    /// Sum of each quarter's record; quarters without a value are skipped.
    pub fn quarterly_records_sum(
        &self,
        activity: &Activity,
        metric_key: Option<&str>,
    ) -> Option<f64> {
        self.history_quarters(activity)
            .iter()
            .filter_map(|quarter| {
                self.latest_period_value(
                    activity,
                    PeriodGranularity::Quarterly,
                    quarter,
                    metric_key,
                )
            })
            .fold(None, |total, record| Some(total.unwrap_or(0.0) + record))
    }

    /// Backend `quarterlyTotal` when supplied, otherwise the local sum.
    pub fn yearly_total(&self, activity: &Activity, metric_key: Option<&str>) -> Option<f64> {
        activity
            .quarterly_total
            .or_else(|| self.quarterly_records_sum(activity, metric_key))
    }

    /// Backend `yearlyProgress` when supplied, otherwise the yearly total
    /// against the sum of quarterly goals.
    pub fn yearly_progress(&self, activity: &Activity, metric_key: Option<&str>) -> Option<f64> {
        activity.yearly_progress.or_else(|| {
            calculate_progress(
                self.yearly_total(activity, metric_key),
                activity.quarterly_goals.total(),
                activity.metric_type,
            )
        })
    }
}
