//! Price source port trait.

use crate::domain::error::TrendpickError;
use crate::domain::price::{lookup_price, DailyPrice};
use chrono::NaiveDate;

/// Daily adjusted closes per symbol. Implementations are shared across the
/// metrics worker pool, so they must be `Send + Sync`.
pub trait PricePort: Send + Sync {
    /// Prices for `symbol` in `[from_date, to_date]`, oldest first.
    fn price_series(
        &self,
        symbol: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<DailyPrice>, TrendpickError>;

    /// Price on `date`, or with `nearest_backward` the latest one before it.
    ///
    /// The default reads every stored price up to `date`; adapters with an
    /// index on date should override it.
    fn price_at(
        &self,
        symbol: &str,
        date: NaiveDate,
        nearest_backward: bool,
    ) -> Result<DailyPrice, TrendpickError> {
        let series = self.price_series(symbol, NaiveDate::MIN, date)?;
        lookup_price(&series, date, nearest_backward)
            .cloned()
            .ok_or_else(|| TrendpickError::PriceNotFound {
                symbol: symbol.to_string(),
                date,
            })
    }
}
