use serde::{Deserialize, Serialize};

use crate::models::metric::MetricType;
use crate::models::period::PeriodGranularity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Goal,
    Task,
    Activity,
}

impl RowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowKind::Goal => "goal",
            RowKind::Task => "task",
            RowKind::Activity => "activity",
        }
    }
}

/// Values for one activity in one period column.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PeriodCell {
    pub goal: Option<f64>,
    pub record: Option<f64>,
    pub progress: Option<f64>,
    pub underperforming: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReportCell {
    /// Goal and task rows carry no per-period metrics.
    Placeholder,
    Value(PeriodCell),
}

impl ReportCell {
    pub fn value(&self) -> Option<&PeriodCell> {
        match self {
            ReportCell::Value(cell) => Some(cell),
            ReportCell::Placeholder => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    /// Depth-first position, e.g. `1.2.3`.
    pub number: String,
    pub kind: RowKind,
    pub id: String,
    pub title: String,
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<MetricType>,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
    pub previous_value: Option<f64>,
    pub cells: Vec<ReportCell>,
    pub yearly_total: Option<f64>,
    pub yearly_progress: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportTable {
    pub granularity: PeriodGranularity,
    /// Canonical period keys, ascending.
    pub periods: Vec<String>,
    pub reference_date: String,
    pub generated_at: String,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterReportQuery {
    #[serde(default)]
    pub granularity: Option<PeriodGranularity>,
    /// Reference date for the "past quarter" check; RFC 3339 or `YYYY-MM-DD`.
    #[serde(default)]
    pub as_of: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportExportFormat {
    #[default]
    Csv,
    Html,
    Json,
}

impl ReportExportFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            ReportExportFormat::Csv => "csv",
            ReportExportFormat::Html => "html",
            ReportExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExportParams {
    #[serde(default)]
    pub format: ReportExportFormat,
    #[serde(default, flatten)]
    pub query: MasterReportQuery,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportExportResult {
    pub file_path: String,
    pub format: ReportExportFormat,
    pub generated_at: String,
    pub row_count: usize,
}
