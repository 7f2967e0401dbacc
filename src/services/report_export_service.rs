use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use tracing::info;

use crate::error::AppResult;
use crate::models::period::PeriodGranularity;
use crate::models::report_table::{
    ReportCell, ReportExportFormat, ReportExportResult, ReportRow, ReportTable, RowKind,
};
use crate::models::settings::ReportSettings;

const REPORT_PREFIX: &str = "master-report";
const UTF8_BOM: &str = "\u{feff}";

/// Display formatting shared by every renderer.
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    decimal_places: usize,
    placeholder: String,
}

impl ValueFormatter {
    pub fn new(decimal_places: u8, placeholder: impl Into<String>) -> Self {
        Self {
            decimal_places: decimal_places as usize,
            placeholder: placeholder.into(),
        }
    }

    pub fn from_settings(settings: &ReportSettings) -> Self {
        Self::new(settings.decimal_places, settings.placeholder.clone())
    }

    pub fn number(&self, value: Option<f64>) -> String {
        match value {
            Some(value) if value.is_finite() => format!("{:.*}", self.decimal_places, value),
            _ => self.placeholder.clone(),
        }
    }

    pub fn percent(&self, value: Option<f64>) -> String {
        match value {
            Some(value) if value.is_finite() => format!("{:.*}%", self.decimal_places, value),
            _ => self.placeholder.clone(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }
}

impl Default for ValueFormatter {
    fn default() -> Self {
        Self::from_settings(&ReportSettings::default())
    }
}

pub struct ReportExportService {
    reports_dir: PathBuf,
    formatter: ValueFormatter,
}

impl ReportExportService {
    pub fn new(reports_dir: impl Into<PathBuf>, settings: &ReportSettings) -> AppResult<Self> {
        let reports_dir = reports_dir.into();
        std::fs::create_dir_all(&reports_dir)?;
        Ok(Self {
            reports_dir,
            formatter: ValueFormatter::from_settings(settings),
        })
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    pub fn render(&self, table: &ReportTable, format: ReportExportFormat) -> AppResult<String> {
        let content = match format {
            ReportExportFormat::Csv => render_csv(table, &self.formatter),
            ReportExportFormat::Html => render_html(table, &self.formatter),
            ReportExportFormat::Json => serde_json::to_string_pretty(table)?,
        };
        Ok(content)
    }

    pub fn export(
        &self,
        table: &ReportTable,
        format: ReportExportFormat,
        now: DateTime<Utc>,
    ) -> AppResult<ReportExportResult> {
        let timestamp = now.format("%Y%m%dT%H%M%SZ");
        let filename = format!("{REPORT_PREFIX}-{}.{}", timestamp, format.file_extension());
        let path = self.reports_dir.join(filename);

        let content = self.render(table, format)?;
        std::fs::write(&path, content)?;

        info!(
            target: "app::report::export",
            path = %path.display(),
            format = format.file_extension(),
            rows = table.rows.len(),
            "master report exported"
        );

        Ok(ReportExportResult {
            file_path: path.to_string_lossy().to_string(),
            format,
            generated_at: now.to_rfc3339(),
            row_count: table.rows.len(),
        })
    }
}

/// Column headers, matching the dynamic period columns of the table.
pub fn header_labels(table: &ReportTable) -> Vec<String> {
    let mut headers: Vec<String> = ["No.", "Title", "Type", "Weight", "Metric"]
        .iter()
        .map(|label| label.to_string())
        .collect();

    for period in &table.periods {
        match table.granularity {
            PeriodGranularity::Quarterly => {
                headers.push(format!("{period} Goal"));
                headers.push(format!("{period} Record"));
                headers.push(format!("{period} Progress %"));
            }
            _ => headers.push(period.clone()),
        }
    }

    headers.push("Yearly Total".to_string());
    headers.push("Yearly Progress %".to_string());
    headers
}

/// Display values for one row, aligned with [`header_labels`].
pub fn row_values(table: &ReportTable, row: &ReportRow, formatter: &ValueFormatter) -> Vec<String> {
    let mut values = vec![
        row.number.clone(),
        row.title.clone(),
        row.kind.as_str().to_string(),
        formatter.number(row.weight),
        row.metric_key
            .clone()
            .unwrap_or_else(|| formatter.placeholder().to_string()),
    ];

    for cell in &row.cells {
        match (cell, table.granularity) {
            (ReportCell::Placeholder, PeriodGranularity::Quarterly) => {
                values.extend(std::iter::repeat(formatter.placeholder().to_string()).take(3));
            }
            (ReportCell::Placeholder, _) => values.push(formatter.placeholder().to_string()),
            (ReportCell::Value(cell), PeriodGranularity::Quarterly) => {
                values.push(formatter.number(cell.goal));
                values.push(formatter.number(cell.record));
                values.push(formatter.percent(cell.progress));
            }
            (ReportCell::Value(cell), _) => values.push(formatter.number(cell.record)),
        }
    }

    match row.kind {
        RowKind::Activity => {
            values.push(formatter.number(row.yearly_total));
            values.push(formatter.percent(row.yearly_progress));
        }
        RowKind::Goal | RowKind::Task => {
            values.push(formatter.placeholder().to_string());
            values.push(formatter.percent(row.progress));
        }
    }

    values
}

/// UTF-8 CSV with a byte-order mark; every field is quoted.
pub fn render_csv(table: &ReportTable, formatter: &ValueFormatter) -> String {
    let mut content = String::from(UTF8_BOM);
    push_csv_line(&mut content, &header_labels(table));
    for row in &table.rows {
        push_csv_line(&mut content, &row_values(table, row, formatter));
    }
    content
}

fn push_csv_line(content: &mut String, fields: &[String]) {
    let line = fields
        .iter()
        .map(|field| format!("\"{}\"", field.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",");
    content.push_str(&line);
    content.push_str("\r\n");
}

/// Standalone printable document.
pub fn render_html(table: &ReportTable, formatter: &ValueFormatter) -> String {
    let mut content = String::new();
    content.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    content.push_str("<title>Master Report</title>\n<style>\n");
    content.push_str("body { font-family: sans-serif; font-size: 12px; }\n");
    content.push_str("table { border-collapse: collapse; width: 100%; }\n");
    content.push_str("th, td { border: 1px solid #999; padding: 4px; text-align: left; }\n");
    content.push_str("tr.goal { font-weight: bold; background: #eef; }\n");
    content.push_str("tr.task { background: #f7f7f7; }\n");
    content.push_str("td.underperforming { background: #fdd; }\n");
    content.push_str("@media print { @page { size: landscape; } }\n");
    content.push_str("</style>\n</head>\n<body>\n");
    content.push_str("<h1>Master Report</h1>\n");
    content.push_str(&format!(
        "<p>Granularity: {} &middot; Reference date: {} &middot; Generated: {}</p>\n",
        table.granularity,
        encode_text(&table.reference_date),
        encode_text(&table.generated_at)
    ));

    content.push_str("<table>\n<thead>\n<tr>");
    for header in header_labels(table) {
        content.push_str(&format!("<th>{}</th>", encode_text(&header)));
    }
    content.push_str("</tr>\n</thead>\n<tbody>\n");

    for row in &table.rows {
        let flags = underperforming_flags(table, row);
        content.push_str(&format!(
            "<tr class=\"{}\">",
            encode_double_quoted_attribute(row.kind.as_str())
        ));
        for (value, flagged) in row_values(table, row, formatter).iter().zip(flags) {
            if flagged {
                content.push_str(&format!(
                    "<td class=\"underperforming\">{}</td>",
                    encode_text(value)
                ));
            } else {
                content.push_str(&format!("<td>{}</td>", encode_text(value)));
            }
        }
        content.push_str("</tr>\n");
    }

    content.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    content
}

/// Per-column highlight flags, aligned with [`row_values`].
fn underperforming_flags(table: &ReportTable, row: &ReportRow) -> Vec<bool> {
    let per_period = match table.granularity {
        PeriodGranularity::Quarterly => 3,
        _ => 1,
    };

    let mut flags = vec![false; 5];
    for cell in &row.cells {
        let flagged = cell.value().map(|cell| cell.underperforming).unwrap_or(false);
        flags.extend(std::iter::repeat(flagged).take(per_period));
    }
    flags.extend([false, false]);
    flags
}
