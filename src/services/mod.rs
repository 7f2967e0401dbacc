pub mod master_report_service;
pub mod metric_extractor;
pub mod period_normalizer;
pub mod progress_calculator;
pub mod quarterly_stats;
pub mod report_export_service;
pub mod report_table_builder;
pub mod settings_service;
