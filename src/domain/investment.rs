//! One realized buy-then-sell position.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub symbol: String,
    /// Shares bought with the full allocation, fractional.
    pub position: f64,
    pub buy_price: f64,
    pub buy_date: NaiveDate,
    pub sell_price: f64,
    pub sell_date: NaiveDate,
    pub profit_pct: f64,
    pub profit: f64,
}

/// Size a position worth `amount` at `buy_price` and realize it at
/// `sell_price`.
///
/// `position` and `profit_pct` use the unfloored share count. `profit` is
/// realized on whole shares only, so any fractional remainder of the
/// allocation earns nothing.
pub fn invest(
    symbol: &str,
    amount: f64,
    buy_price: f64,
    buy_date: NaiveDate,
    sell_price: f64,
    sell_date: NaiveDate,
) -> Investment {
    let (position, whole_shares, profit_pct) = if buy_price > 0.0 {
        let position = amount / buy_price;
        (
            position,
            position.floor(),
            (sell_price - buy_price) / buy_price * 100.0,
        )
    } else {
        (0.0, 0.0, 0.0)
    };

    Investment {
        symbol: symbol.to_string(),
        position,
        buy_price,
        buy_date,
        sell_price,
        sell_date,
        profit_pct,
        profit: (sell_price - buy_price) * whole_shares,
    }
}
