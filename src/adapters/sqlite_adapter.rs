//! SQLite data adapter.
//!
//! Tables: `prices(symbol, date, adj_close)` and
//! `constituent_changes(index_name, date, added_symbol, removed_symbol)`.
//! Dates are stored as `YYYY-MM-DD` text so string order is date order.

use crate::domain::error::TrendpickError;
use crate::domain::price::DailyPrice;
use crate::domain::universe::{ConstituentChange, StockIndex};
use crate::ports::config_port::ConfigPort;
use crate::ports::index_port::IndexPort;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> TrendpickError {
    TrendpickError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn date_column(raw: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(raw.len(), rusqlite::types::Type::Text, Box::new(e))
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TrendpickError> {
        let db_path = config
            .get_string("data", "path")
            .ok_or_else(|| TrendpickError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("data", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| TrendpickError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database; every pooled handle sees the
    /// same data.
    pub fn in_memory() -> Result<Self, TrendpickError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| TrendpickError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TrendpickError> {
        self.pool.get().map_err(|e: r2d2::Error| TrendpickError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), TrendpickError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS prices (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                adj_close REAL NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE TABLE IF NOT EXISTS constituent_changes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                index_name TEXT NOT NULL,
                date TEXT NOT NULL,
                added_symbol TEXT,
                removed_symbol TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_constituent_changes_index
                ON constituent_changes(index_name, date);",
        )
        .map_err(query_err)?;
        Ok(())
    }

    pub fn insert_prices(&self, prices: &[DailyPrice]) -> Result<(), TrendpickError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for p in prices {
            tx.execute(
                "INSERT OR REPLACE INTO prices (symbol, date, adj_close) VALUES (?1, ?2, ?3)",
                params![p.symbol, p.date.format(DATE_FORMAT).to_string(), p.adj_close],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }

    pub fn insert_constituent_changes(
        &self,
        index: StockIndex,
        changes: &[ConstituentChange],
    ) -> Result<(), TrendpickError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for c in changes {
            tx.execute(
                "INSERT INTO constituent_changes (index_name, date, added_symbol, removed_symbol)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    index.name(),
                    c.date.format(DATE_FORMAT).to_string(),
                    c.added_symbol,
                    c.removed_symbol
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }
}

impl PricePort for SqliteAdapter {
    fn price_series(
        &self,
        symbol: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<DailyPrice>, TrendpickError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, adj_close FROM prices
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    from_date.format(DATE_FORMAT).to_string(),
                    to_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let date = date_column(row.get(0)?)?;
                    Ok(DailyPrice::new(symbol, date, row.get(1)?))
                },
            )
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn price_at(
        &self,
        symbol: &str,
        date: NaiveDate,
        nearest_backward: bool,
    ) -> Result<DailyPrice, TrendpickError> {
        let conn = self.conn()?;
        let query = if nearest_backward {
            "SELECT date, adj_close FROM prices
             WHERE symbol = ?1 AND date <= ?2
             ORDER BY date DESC LIMIT 1"
        } else {
            "SELECT date, adj_close FROM prices WHERE symbol = ?1 AND date = ?2"
        };

        let found = conn
            .query_row(query, params![symbol, date.format(DATE_FORMAT).to_string()], |row| {
                let found_date = date_column(row.get(0)?)?;
                Ok(DailyPrice::new(symbol, found_date, row.get(1)?))
            })
            .optional()
            .map_err(query_err)?;

        found.ok_or_else(|| TrendpickError::PriceNotFound {
            symbol: symbol.to_string(),
            date,
        })
    }
}

impl IndexPort for SqliteAdapter {
    fn constituent_changes(&self, index: StockIndex) -> Result<Vec<ConstituentChange>, TrendpickError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, added_symbol, removed_symbol FROM constituent_changes
                 WHERE index_name = ?1
                 ORDER BY date ASC, id ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![index.name()], |row| {
                Ok(ConstituentChange {
                    date: date_column(row.get(0)?)?,
                    added_symbol: row.get(1)?,
                    removed_symbol: row.get(2)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}
