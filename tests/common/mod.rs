#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use trendpick::domain::error::TrendpickError;
pub use trendpick::domain::price::DailyPrice;
use trendpick::domain::universe::{ConstituentChange, StockIndex};
use trendpick::ports::index_port::IndexPort;
use trendpick::ports::price_port::PricePort;

pub struct MockPricePort {
    pub data: HashMap<String, Vec<DailyPrice>>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, symbol: &str, prices: Vec<DailyPrice>) -> Self {
        self.data.insert(symbol.to_string(), prices);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn price_series(
        &self,
        symbol: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<DailyPrice>, TrendpickError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TrendpickError::DatabaseQuery {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|prices| {
                prices
                    .iter()
                    .filter(|p| p.date >= from_date && p.date <= to_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub struct MockIndexPort {
    pub changes: HashMap<StockIndex, Vec<ConstituentChange>>,
}

impl MockIndexPort {
    pub fn new() -> Self {
        Self {
            changes: HashMap::new(),
        }
    }

    /// Every symbol joins `index` on `since`.
    pub fn with_members(mut self, index: StockIndex, since: NaiveDate, symbols: &[&str]) -> Self {
        let entry = self.changes.entry(index).or_default();
        entry.extend(symbols.iter().map(|s| ConstituentChange {
            date: since,
            added_symbol: Some(s.to_string()),
            removed_symbol: None,
        }));
        self
    }

    pub fn with_change(mut self, index: StockIndex, change: ConstituentChange) -> Self {
        self.changes.entry(index).or_default().push(change);
        self
    }
}

impl IndexPort for MockIndexPort {
    fn constituent_changes(&self, index: StockIndex) -> Result<Vec<ConstituentChange>, TrendpickError> {
        Ok(self.changes.get(&index).cloned().unwrap_or_default())
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// One price per weekday in `[start, end]`, compounding `weekly_growth`
/// (0.01 = +1%/week) from `start_price`.
pub fn weekday_series(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    start_price: f64,
    weekly_growth: f64,
) -> Vec<DailyPrice> {
    let daily = (1.0 + weekly_growth).powf(1.0 / 5.0);
    let mut prices = Vec::new();
    let mut price = start_price;
    let mut day = start;
    while day <= end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            prices.push(DailyPrice::new(symbol, day, price));
            price *= daily;
        }
        day += Duration::days(1);
    }
    prices
}

/// One price per Friday, `closes[i]` on the i-th Friday on or after `start`.
pub fn friday_series(symbol: &str, start: NaiveDate, closes: &[f64]) -> Vec<DailyPrice> {
    let offset = (4 - start.weekday().num_days_from_monday() as i64).rem_euclid(7);
    let first = start + Duration::days(offset);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| DailyPrice::new(symbol, first + Duration::weeks(i as i64), c))
        .collect()
}

/// Write `prices` to `{dir}/prices/{symbol}.csv`.
pub fn write_price_csv(dir: &Path, symbol: &str, prices: &[DailyPrice]) {
    let prices_dir = dir.join("prices");
    fs::create_dir_all(&prices_dir).unwrap();
    let mut body = String::from("date,adj_close\n");
    for p in prices {
        body.push_str(&format!("{},{}\n", p.date, p.adj_close));
    }
    fs::write(prices_dir.join(format!("{}.csv", symbol)), body).unwrap();
}

/// Write an initial membership for `index` dated `since`.
pub fn write_constituents_csv(dir: &Path, index: StockIndex, since: NaiveDate, symbols: &[&str]) {
    let constituents_dir = dir.join("constituents");
    fs::create_dir_all(&constituents_dir).unwrap();
    let mut body = String::from("date,added_symbol,removed_symbol\n");
    for s in symbols {
        body.push_str(&format!("{},{},\n", since, s));
    }
    fs::write(constituents_dir.join(format!("{}.csv", index.name())), body).unwrap();
}
