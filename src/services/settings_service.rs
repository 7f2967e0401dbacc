use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::period::PeriodGranularity;
use crate::models::settings::ReportSettings;

const MAX_DECIMAL_PLACES: u8 = 6;
const MAX_PERIOD_CACHE_CAPACITY: usize = 1 << 20;

#[derive(Debug, Default, Clone)]
pub struct SettingsUpdateInput {
    pub decimal_places: Option<u8>,
    pub placeholder: Option<String>,
    pub highlight_underperforming: Option<bool>,
    pub period_cache_capacity: Option<usize>,
    pub timezone: Option<String>,
    pub default_granularity: Option<PeriodGranularity>,
}

/// Report settings backed by an optional YAML file.
pub struct SettingsService {
    path: Option<PathBuf>,
    cache: RwLock<Option<ReportSettings>>,
}

impl SettingsService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            cache: RwLock::new(None),
        }
    }

    /// Settings that live only in memory and start from defaults.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self) -> AppResult<ReportSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }

        let settings = self.load_settings()?;
        validate(&settings)?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }

    pub fn update(&self, input: SettingsUpdateInput) -> AppResult<ReportSettings> {
        let mut current = self.get()?;

        if let Some(decimal_places) = input.decimal_places {
            current.decimal_places = decimal_places;
        }
        if let Some(placeholder) = input.placeholder {
            current.placeholder = placeholder;
        }
        if let Some(highlight) = input.highlight_underperforming {
            current.highlight_underperforming = highlight;
        }
        if let Some(capacity) = input.period_cache_capacity {
            current.period_cache_capacity = capacity;
        }
        if let Some(timezone) = input.timezone {
            current.timezone = timezone.trim().to_string();
        }
        if let Some(granularity) = input.default_granularity {
            current.default_granularity = granularity;
        }

        validate(&current)?;
        self.persist(&current)?;

        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(current.clone());
        }

        Ok(current)
    }

    fn load_settings(&self) -> AppResult<ReportSettings> {
        let Some(path) = self.path.as_ref() else {
            return Ok(ReportSettings::default());
        };

        if !path.exists() {
            debug!(
                target: "app::config",
                path = %path.display(),
                "settings file missing, using defaults"
            );
            return Ok(ReportSettings::default());
        }

        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(ReportSettings::default());
        }
        let settings: ReportSettings = serde_yaml::from_str(&raw)?;
        info!(target: "app::config", path = %path.display(), "report settings loaded");
        Ok(settings)
    }

    fn persist(&self, settings: &ReportSettings) -> AppResult<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_yaml::to_string(settings)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }
}

pub fn validate(settings: &ReportSettings) -> AppResult<()> {
    if settings.decimal_places > MAX_DECIMAL_PLACES {
        return Err(AppError::validation_with_details(
            "小数位数超出范围",
            json!({"decimalPlaces": settings.decimal_places, "max": MAX_DECIMAL_PLACES}),
        ));
    }

    if settings.placeholder.trim().is_empty() {
        return Err(AppError::validation("占位符不能为空"));
    }

    if settings.period_cache_capacity > MAX_PERIOD_CACHE_CAPACITY {
        return Err(AppError::validation_with_details(
            "周期缓存容量过大",
            json!({
                "periodCacheCapacity": settings.period_cache_capacity,
                "max": MAX_PERIOD_CACHE_CAPACITY
            }),
        ));
    }

    parse_timezone(&settings.timezone)?;
    Ok(())
}

pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    name.trim().parse::<Tz>().map_err(|err| {
        AppError::validation_with_details(
            "无效的时区",
            json!({"timezone": name, "error": err.to_string()}),
        )
    })
}

/// Calendar date of `now` in `timezone`; used as the "past quarter" reference.
pub fn reference_date(now: DateTime<Utc>, timezone: Tz) -> NaiveDate {
    now.with_timezone(&timezone).date_naive()
}
