//! Configuration validation.
//!
//! Checks every config value before any prices are read.

use crate::domain::error::TrendpickError;
use crate::domain::rule_eval;
use crate::domain::universe::StockIndex;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DEFAULT_MAX_STOCKS: i64 = 3;
pub const DEFAULT_REBALANCE_INTERVAL_WEEKS: i64 = 2;
pub const DEFAULT_INDEX: StockIndex = StockIndex::Sp500;
pub const DEFAULT_POOL_SIZE: i64 = 4;
pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 24 * 60;

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), TrendpickError> {
    validate_dates(config)?;
    validate_positive(config, "simulation", "max_stocks", DEFAULT_MAX_STOCKS)?;
    validate_positive(
        config,
        "simulation",
        "rebalance_interval_weeks",
        DEFAULT_REBALANCE_INTERVAL_WEEKS,
    )?;
    index_setting(config, "index")?;
    index_setting(config, "baseline_index")?;
    validate_rule(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TrendpickError> {
    match config.get_string("data", "source").as_deref().map(str::trim) {
        None | Some("csv") | Some("sqlite") => {}
        Some(other) => {
            return Err(TrendpickError::ConfigInvalid {
                section: "data".to_string(),
                key: "source".to_string(),
                reason: format!("unknown source '{}', expected csv or sqlite", other),
            });
        }
    }
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(TrendpickError::ConfigMissing {
                section: "data".to_string(),
                key: "path".to_string(),
            });
        }
    }
    validate_positive(config, "data", "pool_size", DEFAULT_POOL_SIZE)?;
    if config.get_bool("cache", "enabled", true) {
        validate_positive(config, "cache", "ttl_minutes", DEFAULT_CACHE_TTL_MINUTES)?;
    }
    Ok(())
}

fn validate_positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), TrendpickError> {
    let value = config.get_int(section, key, default);
    if value < 1 {
        return Err(TrendpickError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{} must be at least 1", key),
        });
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TrendpickError> {
    let start_str = config.get_string("simulation", "date_start");
    let end_str = config.get_string("simulation", "date_end");

    let date_start = parse_date(start_str.as_deref(), "date_start")?;
    let date_end = parse_date(end_str.as_deref(), "date_end")?;

    if date_start >= date_end {
        return Err(TrendpickError::ConfigInvalid {
            section: "simulation".to_string(),
            key: "date_start".to_string(),
            reason: "date_start must be before date_end".to_string(),
        });
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, TrendpickError> {
    match value {
        None => Err(TrendpickError::ConfigMissing {
            section: "simulation".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            TrendpickError::ConfigInvalid {
                section: "simulation".to_string(),
                key: field.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", field),
            }
        }),
    }
}

/// The index named by `[simulation] key`, or SP500 when unset.
pub fn index_setting(config: &dyn ConfigPort, key: &str) -> Result<StockIndex, TrendpickError> {
    match config.get_string("simulation", key) {
        None => Ok(DEFAULT_INDEX),
        Some(s) => s.parse().map_err(|e: crate::domain::universe::UniverseError| {
            TrendpickError::ConfigInvalid {
                section: "simulation".to_string(),
                key: key.to_string(),
                reason: e.to_string(),
            }
        }),
    }
}

fn validate_rule(config: &dyn ConfigPort) -> Result<(), TrendpickError> {
    match config.get_string("simulation", "rule") {
        Some(s) if !s.trim().is_empty() => {
            rule_eval::compile(&s)?;
            Ok(())
        }
        _ => Err(TrendpickError::ConfigMissing {
            section: "simulation".to_string(),
            key: "rule".to_string(),
        }),
    }
}
