//! CSV file data adapter.
//!
//! Layout under the base directory:
//!
//! - `prices/{SYMBOL}.csv` with header `date,adj_close`
//! - `constituents/{INDEX}.csv` with header `date,added_symbol,removed_symbol`
//!   (either symbol column may be empty)

use crate::domain::error::TrendpickError;
use crate::domain::price::DailyPrice;
use crate::domain::universe::{ConstituentChange, StockIndex};
use crate::ports::index_port::IndexPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn price_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join("prices").join(format!("{}.csv", symbol))
    }

    fn constituents_path(&self, index: StockIndex) -> PathBuf {
        self.base_path
            .join("constituents")
            .join(format!("{}.csv", index.name()))
    }

    fn read_records(&self, path: &PathBuf) -> Result<Vec<StringRecord>, TrendpickError> {
        let content = fs::read_to_string(path).map_err(|e| TrendpickError::DatabaseQuery {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        rdr.records()
            .map(|r| {
                r.map_err(|e| TrendpickError::Database {
                    reason: format!("CSV parse error in {}: {}", path.display(), e),
                })
            })
            .collect()
    }
}

fn parse_date(record: &StringRecord, idx: usize) -> Result<NaiveDate, TrendpickError> {
    let raw = record.get(idx).ok_or_else(|| TrendpickError::Database {
        reason: "missing date column".into(),
    })?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| TrendpickError::Database {
        reason: format!("invalid date '{}': {}", raw, e),
    })
}

fn optional_symbol(record: &StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_uppercase())
}

impl PricePort for CsvAdapter {
    fn price_series(
        &self,
        symbol: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<DailyPrice>, TrendpickError> {
        let path = self.price_path(symbol);
        let mut prices = Vec::new();

        for record in self.read_records(&path)? {
            let date = parse_date(&record, 0)?;
            if date < from_date || date > to_date {
                continue;
            }

            let adj_close: f64 = record
                .get(1)
                .ok_or_else(|| TrendpickError::Database {
                    reason: "missing adj_close column".into(),
                })?
                .parse()
                .map_err(|e| TrendpickError::Database {
                    reason: format!("invalid adj_close value: {}", e),
                })?;

            prices.push(DailyPrice::new(symbol, date, adj_close));
        }

        prices.sort_by_key(|p| p.date);
        Ok(prices)
    }
}

impl IndexPort for CsvAdapter {
    fn constituent_changes(&self, index: StockIndex) -> Result<Vec<ConstituentChange>, TrendpickError> {
        let path = self.constituents_path(index);
        self.read_records(&path)?
            .iter()
            .map(|record| {
                Ok(ConstituentChange {
                    date: parse_date(record, 0)?,
                    added_symbol: optional_symbol(record, 1),
                    removed_symbol: optional_symbol(record, 2),
                })
            })
            .collect()
    }
}
