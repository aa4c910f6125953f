//! Daily adjusted close price observation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrice {
    pub symbol: String,
    pub date: NaiveDate,
    pub adj_close: f64,
}

impl DailyPrice {
    pub fn new(symbol: impl Into<String>, date: NaiveDate, adj_close: f64) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            adj_close,
        }
    }
}

/// Find the price dated exactly `date`, or with `nearest_backward` the latest
/// price strictly before it. Never searches forward in time.
pub fn lookup_price<'a>(
    prices: &'a [DailyPrice],
    date: NaiveDate,
    nearest_backward: bool,
) -> Option<&'a DailyPrice> {
    if let Some(exact) = prices.iter().find(|p| p.date == date) {
        return Some(exact);
    }
    if !nearest_backward {
        return None;
    }
    prices
        .iter()
        .filter(|p| p.date < date)
        .max_by_key(|p| p.date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> Vec<DailyPrice> {
        vec![
            DailyPrice::new("AAPL", d(2024, 1, 2), 100.0),
            DailyPrice::new("AAPL", d(2024, 1, 5), 103.0),
            DailyPrice::new("AAPL", d(2024, 1, 3), 101.0),
        ]
    }

    #[test]
    fn exact_match() {
        let prices = sample();
        let p = lookup_price(&prices, d(2024, 1, 3), false).unwrap();
        assert_eq!(p.adj_close, 101.0);
    }

    #[test]
    fn exact_only_misses_gap() {
        let prices = sample();
        assert!(lookup_price(&prices, d(2024, 1, 4), false).is_none());
    }

    #[test]
    fn nearest_searches_backward() {
        let prices = sample();
        let p = lookup_price(&prices, d(2024, 1, 4), true).unwrap();
        assert_eq!(p.date, d(2024, 1, 3));
    }

    #[test]
    fn nearest_never_searches_forward() {
        let prices = sample();
        assert!(lookup_price(&prices, d(2024, 1, 1), true).is_none());
    }
}
