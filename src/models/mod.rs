pub mod metric;
pub mod period;
pub mod report;
pub mod report_table;
pub mod settings;
