//! Selects the configured price/membership store.

use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::price_cache::CachedPriceSource;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::config_validation::DEFAULT_CACHE_TTL_MINUTES;
use crate::domain::error::TrendpickError;
use crate::domain::price::DailyPrice;
use crate::domain::universe::{ConstituentChange, StockIndex};
use crate::ports::config_port::ConfigPort;
use crate::ports::index_port::IndexPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use tracing::info;

pub enum DataSource {
    Csv(CsvAdapter),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteAdapter),
}

impl DataSource {
    /// Open the store named by `[data] source` (default `csv`).
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TrendpickError> {
        let source = config
            .get_string("data", "source")
            .unwrap_or_else(|| "csv".to_string());
        let path = config
            .get_string("data", "path")
            .ok_or_else(|| TrendpickError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?;

        match source.trim() {
            "csv" => Ok(DataSource::Csv(CsvAdapter::new(PathBuf::from(path)))),
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let adapter = SqliteAdapter::from_config(config)?;
                adapter.initialize_schema()?;
                Ok(DataSource::Sqlite(adapter))
            }
            other => Err(TrendpickError::ConfigInvalid {
                section: "data".into(),
                key: "source".into(),
                reason: format!("unsupported source '{}' in this build", other),
            }),
        }
    }
}

impl PricePort for DataSource {
    fn price_series(
        &self,
        symbol: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<DailyPrice>, TrendpickError> {
        match self {
            DataSource::Csv(a) => a.price_series(symbol, from_date, to_date),
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a.price_series(symbol, from_date, to_date),
        }
    }

    fn price_at(
        &self,
        symbol: &str,
        date: NaiveDate,
        nearest_backward: bool,
    ) -> Result<DailyPrice, TrendpickError> {
        match self {
            DataSource::Csv(a) => a.price_at(symbol, date, nearest_backward),
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a.price_at(symbol, date, nearest_backward),
        }
    }
}

impl IndexPort for DataSource {
    fn constituent_changes(&self, index: StockIndex) -> Result<Vec<ConstituentChange>, TrendpickError> {
        match self {
            DataSource::Csv(a) => a.constituent_changes(index),
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a.constituent_changes(index),
        }
    }
}

/// The configured store behind the `[cache]` policy.
pub fn open(config: &dyn ConfigPort) -> Result<CachedPriceSource<DataSource>, TrendpickError> {
    let source = DataSource::from_config(config)?;
    if !config.get_bool("cache", "enabled", true) {
        info!("price cache disabled");
        return Ok(CachedPriceSource::passthrough(source));
    }
    let minutes = config
        .get_int("cache", "ttl_minutes", DEFAULT_CACHE_TTL_MINUTES)
        .max(1) as u64;
    info!(ttl_minutes = minutes, "price cache enabled");
    Ok(CachedPriceSource::new(source, Duration::from_secs(minutes * 60)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn csv_is_default_source() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("prices")).unwrap();
        fs::write(dir.path().join("prices").join("AAPL.csv"), "date,adj_close\n2024-01-02,185.0\n").unwrap();

        let config =
            FileConfigAdapter::from_string(&format!("[data]\npath = {}\n", dir.path().display())).unwrap();
        let source = open(&config).unwrap();
        assert!(matches!(source.inner(), DataSource::Csv(_)));

        let d = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(source.price_at("AAPL", d, true).unwrap().adj_close, 185.0);
        assert_eq!(source.stats().series_entries, 1);
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("prices")).unwrap();
        fs::write(dir.path().join("prices").join("AAPL.csv"), "date,adj_close\n2024-01-02,185.0\n").unwrap();

        let config = FileConfigAdapter::from_string(&format!(
            "[data]\npath = {}\n\n[cache]\nenabled = false\n",
            dir.path().display()
        ))
        .unwrap();
        let source = open(&config).unwrap();
        let d = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        source.price_at("AAPL", d, true).unwrap();
        assert_eq!(source.stats().series_entries, 0);
    }

    #[test]
    fn unknown_source_rejected() {
        let config = FileConfigAdapter::from_string("[data]\nsource = parquet\npath = x\n").unwrap();
        assert!(matches!(
            DataSource::from_config(&config),
            Err(TrendpickError::ConfigInvalid { key, .. }) if key == "source"
        ));
    }

    #[test]
    fn missing_path_rejected() {
        let config = FileConfigAdapter::from_string("[data]\nsource = csv\n").unwrap();
        assert!(matches!(
            DataSource::from_config(&config),
            Err(TrendpickError::ConfigMissing { .. })
        ));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_source_initializes_schema() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("prices.db");
        let config = FileConfigAdapter::from_string(&format!(
            "[data]\nsource = sqlite\npath = {}\npool_size = 2\n",
            db.display()
        ))
        .unwrap();
        let source = DataSource::from_config(&config).unwrap();
        assert!(source.constituent_changes(StockIndex::Sp500).unwrap().is_empty());
    }
}
