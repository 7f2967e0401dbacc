use std::fmt;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Zero-indexed calendar month in which the fiscal year begins (July).
pub const FISCAL_YEAR_START_MONTH0: u32 = 6;

static FISCAL_QUARTER_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-Q(\d)$").expect("fiscal quarter pattern is valid"));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PeriodGranularity {
    Monthly,
    #[default]
    Quarterly,
    Annual,
}

impl PeriodGranularity {
    pub const ALL: [PeriodGranularity; 3] = [
        PeriodGranularity::Monthly,
        PeriodGranularity::Quarterly,
        PeriodGranularity::Annual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodGranularity::Monthly => "monthly",
            PeriodGranularity::Quarterly => "quarterly",
            PeriodGranularity::Annual => "annual",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(PeriodGranularity::Monthly),
            "quarterly" => Ok(PeriodGranularity::Quarterly),
            "annual" | "yearly" => Ok(PeriodGranularity::Annual),
            other => Err(format!("Invalid period granularity: {}", other)),
        }
    }
}

impl fmt::Display for PeriodGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A July-starting fiscal quarter. Field order makes the derived ordering
/// chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FiscalQuarter {
    pub year: i32,
    pub quarter: u8,
}

impl FiscalQuarter {
    /// Maps a calendar year and zero-indexed month onto its fiscal quarter.
    /// July through December belong to the following fiscal year.
    pub fn from_calendar(year: i32, month0: u32) -> Self {
        if month0 >= FISCAL_YEAR_START_MONTH0 {
            Self {
                year: year + 1,
                quarter: ((month0 - FISCAL_YEAR_START_MONTH0) / 3 + 1) as u8,
            }
        } else {
            Self {
                year,
                quarter: (month0 / 3 + 3) as u8,
            }
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_calendar(date.year(), date.month0())
    }

    /// Parses a canonical `YYYY-Qn` key. Anything else, including quarters
    /// outside 1..=4, yields `None`.
    pub fn parse(key: &str) -> Option<Self> {
        let captures = FISCAL_QUARTER_KEY.captures(key.trim())?;
        let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
        let quarter = captures.get(2)?.as_str().parse::<u8>().ok()?;
        if !(1..=4).contains(&quarter) {
            return None;
        }
        Some(Self { year, quarter })
    }

    pub fn key(&self) -> String {
        format!("{:04}-Q{}", self.year, self.quarter)
    }

    /// First calendar day of the quarter.
    pub fn start_date(&self) -> Option<NaiveDate> {
        let offset = FISCAL_YEAR_START_MONTH0 + (self.quarter as u32 - 1) * 3;
        let (year, month0) = if offset >= 12 {
            (self.year, offset - 12)
        } else {
            (self.year - 1, offset)
        };
        NaiveDate::from_ymd_opt(year, month0 + 1, 1)
    }
}

impl fmt::Display for FiscalQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
