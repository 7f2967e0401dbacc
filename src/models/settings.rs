use serde::{Deserialize, Serialize};

use crate::models::period::PeriodGranularity;

pub const DEFAULT_DECIMAL_PLACES: u8 = 2;
pub const DEFAULT_PLACEHOLDER: &str = "—";
pub const DEFAULT_PERIOD_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportSettings {
    pub decimal_places: u8,
    /// Rendered for absent values and for goal/task metric columns.
    pub placeholder: String,
    pub highlight_underperforming: bool,
    /// Zero disables period-key memoization.
    pub period_cache_capacity: usize,
    /// IANA zone used to turn "now" into the reference calendar date.
    pub timezone: String,
    pub default_granularity: PeriodGranularity,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            decimal_places: DEFAULT_DECIMAL_PLACES,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            highlight_underperforming: true,
            period_cache_capacity: DEFAULT_PERIOD_CACHE_CAPACITY,
            timezone: DEFAULT_TIMEZONE.to_string(),
            default_granularity: PeriodGranularity::Quarterly,
        }
    }
}
