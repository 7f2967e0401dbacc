use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::models::period::{FiscalQuarter, PeriodGranularity};
use crate::models::settings::DEFAULT_PERIOD_CACHE_CAPACITY;

static YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").expect("year-month pattern is valid"));
static YEAR_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})$").expect("year pattern is valid"));

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

type CacheKey = (String, PeriodGranularity);

/// Parses the date spellings the API uses for period keys and report
/// timestamps. Offsets are converted to UTC; naive values are taken as-is.
pub fn parse_period_instant(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc).naive_utc());
    }

    if let Some(parsed) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        return Some(parsed);
    }

    let date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            let captures = YEAR_MONTH.captures(value)?;
            let year = captures[1].parse::<i32>().ok()?;
            let month = captures[2].parse::<u32>().ok()?;
            NaiveDate::from_ymd_opt(year, month, 1)
        })
        .or_else(|| {
            let captures = YEAR_ONLY.captures(value)?;
            NaiveDate::from_ymd_opt(captures[1].parse::<i32>().ok()?, 1, 1)
        })?;

    date.and_hms_opt(0, 0, 0)
}

/// Canonical period key for `raw_key` at `granularity`, or `None` when the
/// key cannot be read.
///
/// Monthly keys are `YYYY-MM`, annual keys `YYYY`, quarterly keys the fiscal
/// `YYYY-Qn`. An already-canonical fiscal key is returned unchanged for the
/// quarterly granularity, which keeps normalization idempotent. Such keys are
/// read as fiscal: a calendar-quarter key like `2024-Q3` meaning July 2024
/// stays `2024-Q3` (January to March 2024) and is not moved to `2025-Q1`.
pub fn normalize(raw_key: &str, granularity: PeriodGranularity) -> Option<String> {
    if granularity == PeriodGranularity::Quarterly {
        if let Some(quarter) = FiscalQuarter::parse(raw_key) {
            return Some(quarter.key());
        }
    }

    let date = parse_period_instant(raw_key)?.date();
    let key = match granularity {
        PeriodGranularity::Monthly => format!("{:04}-{:02}", date.year(), date.month()),
        PeriodGranularity::Quarterly => FiscalQuarter::from_date(date).key(),
        PeriodGranularity::Annual => format!("{:04}", date.year()),
    };
    Some(key)
}

/// Memoizing front for [`normalize`]. The cache is owned by the caller, so
/// two normalizers never share state.
pub struct PeriodNormalizer {
    cache: Option<Mutex<LruCache<CacheKey, Option<String>>>>,
}

impl PeriodNormalizer {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: NonZeroUsize::new(capacity).map(|capacity| Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn uncached() -> Self {
        Self { cache: None }
    }

    pub fn normalize(&self, raw_key: &str, granularity: PeriodGranularity) -> Option<String> {
        let Some(cache) = &self.cache else {
            return normalize(raw_key, granularity);
        };

        let cache_key = (raw_key.to_string(), granularity);
        if let Ok(mut guard) = cache.lock() {
            if let Some(hit) = guard.get(&cache_key) {
                return hit.clone();
            }
        }

        let value = normalize(raw_key, granularity);
        if value.is_none() {
            trace!(target: "app::report::period", raw_key, granularity = %granularity, "unparseable period key");
        }

        if let Ok(mut guard) = cache.lock() {
            guard.put(cache_key, value.clone());
        }
        value
    }

    pub fn cached_entries(&self) -> usize {
        self.cache
            .as_ref()
            .and_then(|cache| cache.lock().ok().map(|guard| guard.len()))
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            if let Ok(mut guard) = cache.lock() {
                guard.clear();
            }
        }
    }
}

impl Default for PeriodNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD_CACHE_CAPACITY)
    }
}
