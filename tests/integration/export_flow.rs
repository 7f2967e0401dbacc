use std::fs;

use chrono::{DateTime, Duration, Utc};
use master_report_lib::models::period::PeriodGranularity;
use master_report_lib::models::report_table::{
    MasterReportQuery, ReportExportFormat, ReportExportParams,
};
use master_report_lib::models::settings::ReportSettings;
use master_report_lib::services::master_report_service::MasterReportService;
use serde_json::{json, Value as JsonValue};
use tempfile::tempdir;

fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-02-10T09:30:00Z")
        .expect("timestamp")
        .with_timezone(&Utc)
}

fn sample_report() -> JsonValue {
    json!({
        "goals": [{
            "id": 7,
            "title": "Youth & Sport",
            "weight": 100,
            "tasks": [{
                "id": 70,
                "title": "League \"A\"",
                "activities": [{
                    "id": 700,
                    "title": "Matches <played>",
                    "weight": 1,
                    "metricType": "Increase",
                    "targetMetric": {"matches": 40},
                    "quarterlyGoals": {"q1": 10, "q2": 10},
                    "history": {"quarterly": {
                        "2024-07-20": [{"metrics": {"matches": 4}, "date": "2024-07-20"}],
                        "2024-10-05": [{"metrics": {"matches": 12}, "date": "2024-10-05"}]
                    }}
                }]
            }]
        }]
    })
}

#[test]
fn csv_export_writes_bom_headers_and_formatted_rows() {
    let dir = tempdir().expect("tempdir");
    let service = MasterReportService::new(ReportSettings::default()).expect("service");
    let report = service.parse_report_value(sample_report()).expect("report");

    let result = service
        .export(&report, &ReportExportParams::default(), dir.path(), fixed_now())
        .expect("export");

    assert_eq!(result.format, ReportExportFormat::Csv);
    assert_eq!(result.row_count, 3);
    assert!(result.file_path.ends_with("master-report-20250210T093000Z.csv"));

    let content = fs::read_to_string(&result.file_path).expect("csv file");
    assert!(content.starts_with('\u{feff}'));

    let lines: Vec<&str> = content.trim_start_matches('\u{feff}').split("\r\n").collect();
    assert_eq!(
        lines[0],
        "\"No.\",\"Title\",\"Type\",\"Weight\",\"Metric\",\
         \"2025-Q1 Goal\",\"2025-Q1 Record\",\"2025-Q1 Progress %\",\
         \"2025-Q2 Goal\",\"2025-Q2 Record\",\"2025-Q2 Progress %\",\
         \"Yearly Total\",\"Yearly Progress %\""
    );
    assert!(lines[1].starts_with("\"1\",\"Youth & Sport\",\"goal\",\"100.00\",\"—\",\"—\""));
    assert!(lines[2].contains("\"League \"\"A\"\"\""));
    assert_eq!(
        lines[3],
        "\"1.1.1\",\"Matches <played>\",\"activity\",\"1.00\",\"matches\",\
         \"10.00\",\"4.00\",\"40.00%\",\
         \"10.00\",\"12.00\",\"120.00%\",\
         \"16.00\",\"80.00%\""
    );
}

#[test]
fn html_export_escapes_text_and_marks_shortfalls() {
    let dir = tempdir().expect("tempdir");
    let service = MasterReportService::new(ReportSettings::default()).expect("service");
    let report = service.parse_report_value(sample_report()).expect("report");

    let params = ReportExportParams {
        format: ReportExportFormat::Html,
        query: MasterReportQuery::default(),
    };
    let result = service
        .export(&report, &params, dir.path().join("nested"), fixed_now())
        .expect("export");
    assert!(result.file_path.ends_with(".html"));

    let content = fs::read_to_string(&result.file_path).expect("html file");
    assert!(content.starts_with("<!DOCTYPE html>"));
    assert!(content.contains("Matches &lt;played&gt;"));
    assert!(content.contains("Youth &amp; Sport"));
    assert!(content.contains("<td>League \"A\"</td>"));
    assert!(content.contains("<tr class=\"goal\">"));
    // Both quarters are over by the reference date; only Q1 fell short.
    assert_eq!(content.matches("<td class=\"underperforming\">").count(), 3);
}

#[test]
fn json_export_serializes_the_table_for_the_requested_granularity() {
    let dir = tempdir().expect("tempdir");
    let settings = ReportSettings {
        decimal_places: 0,
        placeholder: "n/a".into(),
        ..ReportSettings::default()
    };
    let service = MasterReportService::new(settings).expect("service");
    let report = service.parse_report_value(sample_report()).expect("report");

    let params: ReportExportParams = serde_json::from_value(json!({
        "format": "json",
        "granularity": "monthly",
        "asOf": "2024-12-01"
    }))
    .expect("params");

    let later = fixed_now() + Duration::seconds(5);
    let result = service
        .export(&report, &params, dir.path(), later)
        .expect("export");
    assert!(result.file_path.ends_with("master-report-20250210T093005Z.json"));

    let raw = fs::read_to_string(&result.file_path).expect("json file");
    let exported: JsonValue = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(exported["granularity"], json!("monthly"));
    assert_eq!(exported["referenceDate"], json!("2024-12-01"));
    // Monthly columns come from the monthly bucket, which this report lacks.
    assert_eq!(exported["periods"], json!([]));
    assert_eq!(exported["rows"].as_array().map(Vec::len), Some(3));
    assert_eq!(exported["rows"][2]["metricKey"], json!("matches"));
    assert_eq!(exported["rows"][2]["yearlyTotal"], json!(16.0));
}

#[test]
fn granularity_names_round_trip_through_queries() {
    for granularity in PeriodGranularity::ALL {
        let query: MasterReportQuery =
            serde_json::from_value(json!({"granularity": granularity.as_str()}))
                .expect("query");
        assert_eq!(query.granularity, Some(granularity));
    }
}
