use chrono::{DateTime, Utc};
use master_report_lib::models::metric::MetricType;
use master_report_lib::models::period::PeriodGranularity;
use master_report_lib::models::report::MasterReport;
use master_report_lib::models::report_table::{MasterReportQuery, ReportCell, RowKind};
use master_report_lib::models::settings::ReportSettings;
use master_report_lib::services::master_report_service::MasterReportService;
use master_report_lib::services::metric_extractor::pick_metric_key;
use master_report_lib::services::period_normalizer::PeriodNormalizer;
use master_report_lib::services::quarterly_stats::QuarterlyStatsResolver;
use serde_json::json;

fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-02-10T09:00:00Z")
        .expect("timestamp")
        .with_timezone(&Utc)
}

fn approx(value: Option<f64>, expected: f64) {
    let value = value.expect("value present");
    assert!((value - expected).abs() < 1e-6, "{value} != {expected}");
}

fn report_payload() -> String {
    json!({
        "goals": [
            {
                "id": 1,
                "title": "Expand outreach",
                "weight": 60,
                "status": "active",
                "progress": 42.5,
                "tasks": [
                    {
                        "id": 11,
                        "title": "Community sessions",
                        "weight": 100,
                        "activities": [
                            {
                                "id": 111,
                                "title": "Sessions held",
                                "weight": 50,
                                "metricType": "Plus",
                                "targetMetric": "{\"sessions\": 400}",
                                "currentMetric": {"sessions": 60},
                                "previousMetric": "{\"sessions\": 10}",
                                "quarterlyGoals": {"q1": 100, "q3": 100},
                                "history": {
                                    "quarterly": {
                                        "2024-08-12": [
                                            {"metrics": {"sessions": 60}, "date": "2024-08-12"}
                                        ]
                                    }
                                }
                            },
                            {
                                "id": 112,
                                "title": "Complaints",
                                "weight": 50,
                                "metricType": "Decrease",
                                "targetMetric": {"complaints": 0},
                                "quarterlyGoals": "{\"q1\": 100}",
                                "history": "{\"quarterly\": {\"2025-Q1\": [{\"metrics\": \"{\\\"complaints\\\": 60}\", \"createdAt\": \"2024-09-01T08:00:00Z\"}]}}"
                            }
                        ]
                    }
                ]
            },
            {"id": 2, "title": "Improve retention", "tasks": []}
        ]
    })
    .to_string()
}

#[test]
fn quarterly_stats_match_documented_scenarios() {
    let service = MasterReportService::new(ReportSettings::default()).expect("service");
    let report = service.parse_report(&report_payload()).expect("report");
    let resolver = QuarterlyStatsResolver::new(service.normalizer());

    let sessions = &report.goals[0].tasks[0].activities[0];
    let key = pick_metric_key(sessions);
    assert_eq!(key.as_deref(), Some("sessions"));

    let stats = resolver.get_quarterly_stats(sessions, "2025-Q1", key.as_deref(), MetricType::Plus);
    assert_eq!(stats.goal, Some(100.0));
    assert_eq!(stats.record, Some(60.0));
    approx(stats.progress, 60.0);

    let decrease =
        resolver.get_quarterly_stats(sessions, "2025-Q1", key.as_deref(), MetricType::Decrease);
    approx(decrease.progress, 100.0 / 60.0 * 100.0);

    let q2 = resolver.get_quarterly_stats(sessions, "2025-Q2", key.as_deref(), MetricType::Plus);
    assert_eq!(q2.goal, None);
    assert_eq!(q2.progress, None);

    let complaints = &report.goals[0].tasks[0].activities[1];
    let key = pick_metric_key(complaints);
    assert_eq!(key.as_deref(), Some("complaints"));
    let stats = resolver.get_quarterly_stats(
        complaints,
        "2025-Q1",
        key.as_deref(),
        complaints.metric_type,
    );
    assert_eq!(stats.record, Some(60.0));
    approx(stats.progress, 166.666_666_666);
}

#[test]
fn quarterly_table_flattens_tree_and_flags_past_shortfalls() {
    let service = MasterReportService::new(ReportSettings::default()).expect("service");
    let table = service
        .build_from_json(&report_payload(), &MasterReportQuery::default(), fixed_now())
        .expect("table");

    assert_eq!(table.granularity, PeriodGranularity::Quarterly);
    assert_eq!(table.periods, vec!["2025-Q1"]);
    assert_eq!(table.reference_date, "2025-02-10");

    let numbers: Vec<&str> = table.rows.iter().map(|row| row.number.as_str()).collect();
    assert_eq!(numbers, vec!["1", "1.1", "1.1.1", "1.1.2", "2"]);

    let goal = &table.rows[0];
    assert_eq!(goal.kind, RowKind::Goal);
    assert_eq!(goal.progress, Some(42.5));
    assert!(goal.cells.iter().all(|cell| *cell == ReportCell::Placeholder));

    let sessions = &table.rows[2];
    assert_eq!(sessions.metric_key.as_deref(), Some("sessions"));
    assert_eq!(sessions.target_value, Some(400.0));
    assert_eq!(sessions.current_value, Some(60.0));
    assert_eq!(sessions.previous_value, Some(10.0));
    assert_eq!(sessions.yearly_total, Some(60.0));
    approx(sessions.yearly_progress, 30.0);

    let cell = sessions.cells[0].value().copied().expect("value cell");
    assert_eq!(cell.goal, Some(100.0));
    assert_eq!(cell.record, Some(60.0));
    approx(cell.progress, 60.0);
    assert!(cell.underperforming);

    let complaints = table.rows[3].cells[0].value().copied().expect("value cell");
    assert_eq!(complaints.record, Some(60.0));
    assert!(complaints.underperforming);

    let task = &table.rows[1];
    assert_eq!(task.kind, RowKind::Task);
    let expected_task = (30.0 + 100.0 / 60.0 * 100.0) / 2.0;
    approx(task.progress, expected_task);
}

#[test]
fn monthly_and_annual_tables_use_calendar_keys() {
    let payload = json!({
        "goals": [{"id": "g", "tasks": [{"id": "t", "activities": [{
            "id": "a",
            "history": {
                "monthly": {
                    "2024-07-31": [{"metrics": {"visits": 3}, "date": "2024-07-31"}],
                    "2024-08": [{"metrics": {"visits": 5}}]
                },
                "annual": {
                    "2024": [{"metrics": {"visits": 80}}],
                    "2025-01-01T00:00:00Z": [{"metrics": {"visits": 12}}]
                }
            }
        }]}]}]
    })
    .to_string();

    let service = MasterReportService::new(ReportSettings::default()).expect("service");

    let monthly = service
        .build_from_json(
            &payload,
            &MasterReportQuery {
                granularity: Some(PeriodGranularity::Monthly),
                as_of: None,
            },
            fixed_now(),
        )
        .expect("monthly table");
    assert_eq!(monthly.periods, vec!["2024-07", "2024-08"]);
    let records: Vec<Option<f64>> = monthly.rows[2]
        .cells
        .iter()
        .map(|cell| cell.value().and_then(|value| value.record))
        .collect();
    assert_eq!(records, vec![Some(3.0), Some(5.0)]);

    let annual = service
        .build_from_json(
            &payload,
            &MasterReportQuery {
                granularity: Some(PeriodGranularity::Annual),
                as_of: None,
            },
            fixed_now(),
        )
        .expect("annual table");
    assert_eq!(annual.periods, vec!["2024", "2025"]);
    assert!(annual.rows[2]
        .cells
        .iter()
        .all(|cell| !cell.value().expect("value").underperforming));
}

#[test]
fn a_malformed_activity_does_not_break_the_table() {
    let payload = json!({
        "goals": [{"tasks": [{"activities": [
            {"id": "broken", "metricType": "Sideways", "targetMetric": "{not json",
             "quarterlyGoals": "??", "history": "{also not json"},
            {"id": "fine", "quarterlyGoals": {"q1": 10},
             "history": {"quarterly": {"2025-Q1": [{"metrics": {"n": 10}}], "garbage-key": [{"metrics": {"n": 1}}]}}}
        ]}]}]
    })
    .to_string();

    let service = MasterReportService::new(ReportSettings::default()).expect("service");
    let table = service
        .build_from_json(&payload, &MasterReportQuery::default(), fixed_now())
        .expect("table");

    assert_eq!(table.periods, vec!["2025-Q1"]);
    let broken = &table.rows[2];
    assert_eq!(broken.metric_type, Some(MetricType::Plus));
    assert_eq!(broken.metric_key, None);
    let cell = broken.cells[0].value().copied().expect("cell");
    assert_eq!(cell.goal, None);
    assert_eq!(cell.record, None);
    assert_eq!(cell.progress, None);
    assert!(!cell.underperforming);

    let fine = table.rows[3].cells[0].value().copied().expect("cell");
    approx(fine.progress, 100.0);
}

#[test]
fn shared_normalizer_cache_is_reused_across_builds() {
    let service = MasterReportService::new(ReportSettings::default()).expect("service");
    let report: MasterReport = service.parse_report(&report_payload()).expect("report");

    service
        .build(&report, &MasterReportQuery::default(), fixed_now())
        .expect("first build");
    let cached = service.normalizer().cached_entries();
    assert!(cached > 0);

    service
        .build(&report, &MasterReportQuery::default(), fixed_now())
        .expect("second build");
    assert_eq!(service.normalizer().cached_entries(), cached);

    let uncached = PeriodNormalizer::uncached();
    assert_eq!(
        uncached.normalize("2024-08-12", PeriodGranularity::Quarterly),
        service
            .normalizer()
            .normalize("2024-08-12", PeriodGranularity::Quarterly)
    );
}
