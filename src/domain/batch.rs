//! Metrics for many symbols at one as-of date.
//!
//! Symbols are computed on a bounded rayon pool. A symbol whose prices cannot
//! be fetched or whose series is too short is logged and left out; it never
//! fails the batch.

use crate::domain::error::TrendpickError;
use crate::domain::metrics::{self, StockMetrics};
use crate::ports::price_port::PricePort;
use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

/// Upper bound on symbols computed at once.
pub const MAX_CONCURRENT_SYMBOLS: usize = 30;

/// History used for selection-time metrics.
pub const LOOKBACK_WEEKS: i64 = 52;

pub fn build_pool(threads: usize) -> Result<ThreadPool, TrendpickError> {
    ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .thread_name(|i| format!("metrics-{i}"))
        .build()
        .map_err(|e| TrendpickError::Io(std::io::Error::other(e.to_string())))
}

/// Metrics for one symbol over the `lookback_weeks` ending at `as_of`.
pub fn compute_symbol(
    prices: &dyn PricePort,
    symbol: &str,
    as_of: NaiveDate,
    lookback_weeks: i64,
) -> Result<StockMetrics, TrendpickError> {
    let from_date = as_of - Duration::weeks(lookback_weeks);
    let series = prices.price_series(symbol, from_date, as_of)?;
    metrics::compute(symbol, &series, from_date, as_of)
}

/// Metrics for every symbol that has enough data. Output follows the order
/// of `symbols`.
pub fn compute_metrics_batch(
    prices: &dyn PricePort,
    symbols: &[String],
    as_of: NaiveDate,
    lookback_weeks: i64,
    pool: &ThreadPool,
) -> Vec<StockMetrics> {
    pool.install(|| {
        symbols
            .par_iter()
            .filter_map(|symbol| match compute_symbol(prices, symbol, as_of, lookback_weeks) {
                Ok(m) => Some(m),
                Err(e) => {
                    debug!(symbol = %symbol, %as_of, error = %e, "symbol unavailable");
                    None
                }
            })
            .collect()
    })
}
