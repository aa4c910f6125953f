//! Rule filtering, rising-stability ranking and slope outlier rejection.
//!
//! [`apply`] runs the three stages in fixed order. Truncating to a maximum
//! number of holdings is left to the caller.

use crate::domain::metrics::StockMetrics;

/// Exponent on the R² rank; values above 1 favour stable trends over steep ones.
pub const STABILITY_EXPONENT: f64 = 1.7;

/// Scale factor that makes the MAD comparable to a standard deviation.
pub const MODIFIED_Z_SCALE: f64 = 0.6745;

/// Items with |modified z| above this are dropped.
pub const OUTLIER_THRESHOLD: f64 = 2.5;

pub fn apply<F>(items: Vec<StockMetrics>, predicate: F) -> Vec<StockMetrics>
where
    F: Fn(&StockMetrics) -> bool,
{
    let filtered: Vec<StockMetrics> = items.into_iter().filter(|m| predicate(m)).collect();
    let ranked = rank_by_rising_stability(filtered);
    remove_slope_outliers(ranked)
}

/// Percentile rank in [0, 1] for each value: the index of the value in a
/// stable ascending sort divided by `len - 1`. Ties rank by first appearance.
fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let denom = (values.len() - 1) as f64;
    let mut ranks = vec![0.0; values.len()];
    for (rank, &idx) in order.iter().enumerate() {
        ranks[idx] = rank as f64 / denom;
    }
    ranks
}

/// slope_rank * r2_rank^1.7 for every item; requires at least two items.
pub fn rising_stability_scores(items: &[StockMetrics]) -> Vec<f64> {
    let slopes: Vec<f64> = items.iter().map(|m| m.linear_slope_pct).collect();
    let r2s: Vec<f64> = items.iter().map(|m| m.linear_r_squared).collect();

    let slope_ranks = percentile_ranks(&slopes);
    let r2_ranks = percentile_ranks(&r2s);

    slope_ranks
        .iter()
        .zip(&r2_ranks)
        .map(|(s, r)| s * r.powf(STABILITY_EXPONENT))
        .collect()
}

/// Sort descending by rising-stability score. Equal scores keep input order.
pub fn rank_by_rising_stability(items: Vec<StockMetrics>) -> Vec<StockMetrics> {
    if items.len() <= 1 {
        return items;
    }

    let scores = rising_stability_scores(&items);
    let mut scored: Vec<(f64, StockMetrics)> = scores.into_iter().zip(items).collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, item)| item).collect()
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Drop items whose slope has a modified z-score beyond [`OUTLIER_THRESHOLD`].
/// Sets of two or fewer, or with zero median absolute deviation, pass through.
pub fn remove_slope_outliers(items: Vec<StockMetrics>) -> Vec<StockMetrics> {
    if items.len() <= 2 {
        return items;
    }

    let slopes: Vec<f64> = items.iter().map(|m| m.linear_slope_pct).collect();
    let med = median(&slopes);
    let deviations: Vec<f64> = slopes.iter().map(|s| (s - med).abs()).collect();
    let mad = median(&deviations);

    if mad == 0.0 {
        return items;
    }

    items
        .into_iter()
        .zip(slopes)
        .filter(|(_, slope)| (MODIFIED_Z_SCALE * (slope - med) / mad).abs() <= OUTLIER_THRESHOLD)
        .map(|(item, _)| item)
        .collect()
}
