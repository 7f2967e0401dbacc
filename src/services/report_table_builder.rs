use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::models::period::{FiscalQuarter, PeriodGranularity};
use crate::models::report::{Activity, MasterReport};
use crate::models::report_table::{PeriodCell, ReportCell, ReportRow, ReportTable, RowKind};
use crate::services::metric_extractor::{extract_value, pick_metric_key};
use crate::services::period_normalizer::PeriodNormalizer;
use crate::services::progress_calculator::weighted_progress;
use crate::services::quarterly_stats::QuarterlyStatsResolver;

/// A fiscal quarter is past when it ends before the quarter containing
/// `reference`. Non-quarter keys are never past.
pub fn is_past_quarter(period_key: &str, reference: NaiveDate) -> bool {
    FiscalQuarter::parse(period_key)
        .map(|quarter| quarter < FiscalQuarter::from_date(reference))
        .unwrap_or(false)
}

/// Flattens the goal → task → activity tree into numbered display rows.
pub struct ReportTableBuilder<'a> {
    normalizer: &'a PeriodNormalizer,
    highlight_underperforming: bool,
}

struct RowContext<'p> {
    granularity: PeriodGranularity,
    periods: &'p [String],
    reference_date: NaiveDate,
}

impl<'a> ReportTableBuilder<'a> {
    pub fn new(normalizer: &'a PeriodNormalizer) -> Self {
        Self {
            normalizer,
            highlight_underperforming: true,
        }
    }

    pub fn with_highlighting(mut self, enabled: bool) -> Self {
        self.highlight_underperforming = enabled;
        self
    }

    /// Union of every normalized history key for `granularity`, ascending.
    /// Canonical keys are zero-padded, so string order is chronological.
    pub fn period_columns(
        &self,
        report: &MasterReport,
        granularity: PeriodGranularity,
    ) -> Vec<String> {
        let periods: BTreeSet<String> = report
            .activities()
            .flat_map(|activity| activity.history.bucket(granularity).iter())
            .filter_map(|bucket| self.normalizer.normalize(&bucket.raw_key, granularity))
            .collect();
        periods.into_iter().collect()
    }

    pub fn build(
        &self,
        report: &MasterReport,
        granularity: PeriodGranularity,
        reference_date: NaiveDate,
        generated_at: String,
    ) -> ReportTable {
        let periods = self.period_columns(report, granularity);
        let context = RowContext {
            granularity,
            periods: &periods,
            reference_date,
        };

        let mut rows = Vec::new();
        for (goal_index, goal) in report.goals.iter().enumerate() {
            let goal_number = (goal_index + 1).to_string();
            let mut child_rows = Vec::new();
            let mut task_scores = Vec::with_capacity(goal.tasks.len());

            for (task_index, task) in goal.tasks.iter().enumerate() {
                let task_number = format!("{goal_number}.{}", task_index + 1);
                let activity_rows: Vec<ReportRow> = task
                    .activities
                    .iter()
                    .enumerate()
                    .map(|(activity_index, activity)| {
                        self.activity_row(
                            format!("{task_number}.{}", activity_index + 1),
                            activity,
                            &context,
                        )
                    })
                    .collect();

                let progress = task.progress.or_else(|| {
                    weighted_progress(
                        activity_rows
                            .iter()
                            .map(|row| (row.yearly_progress, row.weight)),
                    )
                });
                task_scores.push((progress, task.weight));

                child_rows.push(summary_row(
                    task_number,
                    RowKind::Task,
                    &task.id,
                    &task.title,
                    task.weight,
                    None,
                    progress,
                    periods.len(),
                ));
                child_rows.extend(activity_rows);
            }

            let progress = goal
                .progress
                .or_else(|| weighted_progress(task_scores));
            rows.push(summary_row(
                goal_number,
                RowKind::Goal,
                &goal.id,
                &goal.title,
                goal.weight,
                goal.status.clone(),
                progress,
                periods.len(),
            ));
            rows.extend(child_rows);
        }

        debug!(
            target: "app::report::table",
            granularity = %granularity,
            periods = periods.len(),
            rows = rows.len(),
            "report table built"
        );

        ReportTable {
            granularity,
            periods,
            reference_date: reference_date.format("%Y-%m-%d").to_string(),
            generated_at,
            rows,
        }
    }

    fn activity_row(
        &self,
        number: String,
        activity: &Activity,
        context: &RowContext<'_>,
    ) -> ReportRow {
        let resolver = QuarterlyStatsResolver::new(self.normalizer);
        let metric_key = pick_metric_key(activity);
        let key = metric_key.as_deref();

        let cells = context
            .periods
            .iter()
            .map(|period| {
                let cell = match context.granularity {
                    PeriodGranularity::Quarterly => {
                        let stats = resolver.get_quarterly_stats(
                            activity,
                            period,
                            key,
                            activity.metric_type,
                        );
                        let underperforming = self.highlight_underperforming
                            && is_past_quarter(period, context.reference_date)
                            && match (stats.record, stats.goal) {
                                (_, None) => false,
                                (None, Some(_)) => true,
                                (Some(record), Some(goal)) => record < goal,
                            };
                        PeriodCell {
                            goal: stats.goal,
                            record: stats.record,
                            progress: stats.progress,
                            underperforming,
                        }
                    }
                    granularity => PeriodCell {
                        record: resolver.latest_period_value(activity, granularity, period, key),
                        ..PeriodCell::default()
                    },
                };
                ReportCell::Value(cell)
            })
            .collect();

        let yearly_progress = resolver.yearly_progress(activity, key);

        ReportRow {
            number,
            kind: RowKind::Activity,
            id: activity.id.clone(),
            title: activity.title.clone(),
            weight: activity.weight,
            status: None,
            progress: yearly_progress,
            metric_key: metric_key.clone(),
            metric_type: Some(activity.metric_type),
            target_value: extract_value(&activity.target_metric, key),
            current_value: extract_value(&activity.current_metric, key),
            previous_value: extract_value(&activity.previous_metric, key),
            cells,
            yearly_total: resolver.yearly_total(activity, key),
            yearly_progress,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn summary_row(
    number: String,
    kind: RowKind,
    id: &str,
    title: &str,
    weight: Option<f64>,
    status: Option<String>,
    progress: Option<f64>,
    period_count: usize,
) -> ReportRow {
    ReportRow {
        number,
        kind,
        id: id.to_string(),
        title: title.to_string(),
        weight,
        status,
        progress,
        metric_key: None,
        metric_type: None,
        target_value: None,
        current_value: None,
        previous_value: None,
        cells: vec![ReportCell::Placeholder; period_count],
        yearly_total: None,
        yearly_progress: None,
    }
}
