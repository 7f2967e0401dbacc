use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::report::MasterReport;
use crate::models::report_table::{
    MasterReportQuery, ReportExportParams, ReportExportResult, ReportTable,
};
use crate::models::settings::ReportSettings;
use crate::services::period_normalizer::{parse_period_instant, PeriodNormalizer};
use crate::services::report_export_service::ReportExportService;
use crate::services::report_table_builder::ReportTableBuilder;
use crate::services::settings_service::{parse_timezone, reference_date, validate};

/// Entry point for turning a fetched master report into display tables and
/// export files. Owns the period-key cache for its lifetime.
pub struct MasterReportService {
    settings: ReportSettings,
    timezone: Tz,
    normalizer: PeriodNormalizer,
}

impl MasterReportService {
    pub fn new(settings: ReportSettings) -> AppResult<Self> {
        validate(&settings)?;
        let timezone = parse_timezone(&settings.timezone)?;
        let normalizer = PeriodNormalizer::new(settings.period_cache_capacity);
        Ok(Self {
            settings,
            timezone,
            normalizer,
        })
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    pub fn normalizer(&self) -> &PeriodNormalizer {
        &self.normalizer
    }

    /// Parses the API payload. Only a payload that is not JSON at all, or
    /// whose top level is not an object, is rejected; malformed fields
    /// inside activities degrade to absent values.
    pub fn parse_report(&self, payload: &str) -> AppResult<MasterReport> {
        let value: JsonValue = serde_json::from_str(payload)?;
        self.parse_report_value(value)
    }

    pub fn parse_report_value(&self, value: JsonValue) -> AppResult<MasterReport> {
        if !value.is_object() {
            return Err(AppError::validation_with_details(
                "报表数据格式无效",
                json!({"expected": "object", "found": json_kind(&value)}),
            ));
        }

        let report: MasterReport = serde_json::from_value(value)?;
        debug!(
            target: "app::report",
            goals = report.goals.len(),
            activities = report.activities().count(),
            "master report parsed"
        );
        Ok(report)
    }

    pub fn build(
        &self,
        report: &MasterReport,
        query: &MasterReportQuery,
        now: DateTime<Utc>,
    ) -> AppResult<ReportTable> {
        let granularity = query.granularity.unwrap_or(self.settings.default_granularity);
        let reference = match query.as_of.as_deref() {
            Some(raw) => parse_reference_date(raw)?,
            None => reference_date(now, self.timezone),
        };

        let table = ReportTableBuilder::new(&self.normalizer)
            .with_highlighting(self.settings.highlight_underperforming)
            .build(report, granularity, reference, now.to_rfc3339());

        info!(
            target: "app::report",
            granularity = %granularity,
            reference = %reference,
            rows = table.rows.len(),
            periods = table.periods.len(),
            "master report table ready"
        );
        Ok(table)
    }

    pub fn build_from_json(
        &self,
        payload: &str,
        query: &MasterReportQuery,
        now: DateTime<Utc>,
    ) -> AppResult<ReportTable> {
        let report = self.parse_report(payload)?;
        self.build(&report, query, now)
    }

    pub fn export(
        &self,
        report: &MasterReport,
        params: &ReportExportParams,
        reports_dir: impl Into<PathBuf>,
        now: DateTime<Utc>,
    ) -> AppResult<ReportExportResult> {
        let table = self.build(report, &params.query, now)?;
        let exporter = ReportExportService::new(reports_dir, &self.settings)?;
        exporter.export(&table, params.format, now)
    }
}

fn parse_reference_date(raw: &str) -> AppResult<NaiveDate> {
    parse_period_instant(raw)
        .map(|instant| instant.date())
        .ok_or_else(|| {
            AppError::validation_with_details("无效的参考日期", json!({"asOf": raw}))
        })
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
