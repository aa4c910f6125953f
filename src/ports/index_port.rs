//! Index membership port trait.

use crate::domain::error::TrendpickError;
use crate::domain::universe::{constituents_at, ConstituentChange, StockIndex};
use chrono::NaiveDate;

pub trait IndexPort: Send + Sync {
    /// Every recorded membership change for `index`, in any order.
    fn constituent_changes(&self, index: StockIndex) -> Result<Vec<ConstituentChange>, TrendpickError>;

    /// Sorted members of `index` as of `as_of`, inclusive.
    fn constituents_at(&self, index: StockIndex, as_of: NaiveDate) -> Result<Vec<String>, TrendpickError> {
        let changes = self.constituent_changes(index)?;
        Ok(constituents_at(&changes, as_of))
    }
}
