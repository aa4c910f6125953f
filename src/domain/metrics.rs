//! Per-symbol trend, return and volatility metrics.
//!
//! All metrics are derived from the weekly close series produced by
//! [`weekly::aggregate`](crate::domain::weekly::aggregate). Percentages are
//! expressed as percent (5.0 means 5%), not fractions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::error::TrendpickError;
use crate::domain::price::DailyPrice;
use crate::domain::regression::fit_against_index;
use crate::domain::weekly::{aggregate, WeeklyPoint};

/// Fewer weekly points than this is a construction failure.
pub const MIN_WEEKLY_POINTS: usize = 5;

const WEEKS_1W: usize = 1;
const WEEKS_2W: usize = 2;
const WEEKS_1M: usize = 4;
const WEEKS_3M: usize = 13;
const WEEKS_6M: usize = 26;
const WEEKS_1Y: usize = 52;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMetrics {
    pub symbol: String,
    pub date: NaiveDate,
    pub total_weeks: usize,

    pub linear_slope_pct: f64,
    pub linear_r_squared: f64,
    pub log_slope: f64,
    pub log_r_squared: f64,

    pub change_1w_pct: f64,
    pub change_2w_pct: f64,
    pub change_1m_pct: f64,
    pub change_3m_pct: f64,
    pub change_6m_pct: f64,
    pub change_1y_pct: f64,

    pub max_jump_1w_pct: f64,
    pub max_drop_1w_pct: f64,
    pub max_jump_2w_pct: f64,
    pub max_drop_2w_pct: f64,
    pub max_jump_4w_pct: f64,
    pub max_drop_4w_pct: f64,
}

/// Numeric fields of [`StockMetrics`] addressable from a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricField {
    TotalWeeks,
    LinearSlopePct,
    LinearRSquared,
    LogSlope,
    LogRSquared,
    Change1wPct,
    Change2wPct,
    Change1mPct,
    Change3mPct,
    Change6mPct,
    Change1yPct,
    MaxJump1wPct,
    MaxDrop1wPct,
    MaxJump2wPct,
    MaxDrop2wPct,
    MaxJump4wPct,
    MaxDrop4wPct,
}

impl MetricField {
    pub const ALL: [MetricField; 17] = [
        MetricField::TotalWeeks,
        MetricField::LinearSlopePct,
        MetricField::LinearRSquared,
        MetricField::LogSlope,
        MetricField::LogRSquared,
        MetricField::Change1wPct,
        MetricField::Change2wPct,
        MetricField::Change1mPct,
        MetricField::Change3mPct,
        MetricField::Change6mPct,
        MetricField::Change1yPct,
        MetricField::MaxJump1wPct,
        MetricField::MaxDrop1wPct,
        MetricField::MaxJump2wPct,
        MetricField::MaxDrop2wPct,
        MetricField::MaxJump4wPct,
        MetricField::MaxDrop4wPct,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricField::TotalWeeks => "total_weeks",
            MetricField::LinearSlopePct => "linear_slope_pct",
            MetricField::LinearRSquared => "linear_r_squared",
            MetricField::LogSlope => "log_slope",
            MetricField::LogRSquared => "log_r_squared",
            MetricField::Change1wPct => "change_1w_pct",
            MetricField::Change2wPct => "change_2w_pct",
            MetricField::Change1mPct => "change_1m_pct",
            MetricField::Change3mPct => "change_3m_pct",
            MetricField::Change6mPct => "change_6m_pct",
            MetricField::Change1yPct => "change_1y_pct",
            MetricField::MaxJump1wPct => "max_jump_1w_pct",
            MetricField::MaxDrop1wPct => "max_drop_1w_pct",
            MetricField::MaxJump2wPct => "max_jump_2w_pct",
            MetricField::MaxDrop2wPct => "max_drop_2w_pct",
            MetricField::MaxJump4wPct => "max_jump_4w_pct",
            MetricField::MaxDrop4wPct => "max_drop_4w_pct",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl StockMetrics {
    pub fn field(&self, field: MetricField) -> f64 {
        match field {
            MetricField::TotalWeeks => self.total_weeks as f64,
            MetricField::LinearSlopePct => self.linear_slope_pct,
            MetricField::LinearRSquared => self.linear_r_squared,
            MetricField::LogSlope => self.log_slope,
            MetricField::LogRSquared => self.log_r_squared,
            MetricField::Change1wPct => self.change_1w_pct,
            MetricField::Change2wPct => self.change_2w_pct,
            MetricField::Change1mPct => self.change_1m_pct,
            MetricField::Change3mPct => self.change_3m_pct,
            MetricField::Change6mPct => self.change_6m_pct,
            MetricField::Change1yPct => self.change_1y_pct,
            MetricField::MaxJump1wPct => self.max_jump_1w_pct,
            MetricField::MaxDrop1wPct => self.max_drop_1w_pct,
            MetricField::MaxJump2wPct => self.max_jump_2w_pct,
            MetricField::MaxDrop2wPct => self.max_drop_2w_pct,
            MetricField::MaxJump4wPct => self.max_jump_4w_pct,
            MetricField::MaxDrop4wPct => self.max_drop_4w_pct,
        }
    }
}

/// (new - old) / old * 100, or 0 when `old` is 0.
pub fn pct_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        return 0.0;
    }
    (new - old) / old * 100.0
}

/// Percent changes over every consecutive pair `lag` weeks apart.
fn lagged_changes(closes: &[f64], lag: usize) -> Vec<f64> {
    if closes.len() <= lag {
        return Vec::new();
    }
    closes
        .iter()
        .zip(&closes[lag..])
        .map(|(&old, &new)| pct_change(old, new))
        .collect()
}

/// (max jump, max drop) of a change series; drop is the negated minimum.
fn extremes(changes: &[f64]) -> (f64, f64) {
    if changes.is_empty() {
        return (0.0, 0.0);
    }
    let max = changes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = changes.iter().copied().fold(f64::INFINITY, f64::min);
    (max, -min)
}

/// Change over `min(weeks, N - 1)` weeks ending at the last close.
fn horizon_change(closes: &[f64], weeks: usize) -> f64 {
    let span = weeks.min(closes.len().saturating_sub(1));
    if span == 0 {
        return 0.0;
    }
    let last = closes.len() - 1;
    pct_change(closes[last - span], closes[last])
}

/// Compute metrics for `symbol` from daily prices in `[from_date, to_date]`.
pub fn compute(
    symbol: &str,
    prices: &[DailyPrice],
    from_date: NaiveDate,
    to_date: NaiveDate,
) -> Result<StockMetrics, TrendpickError> {
    let weekly = aggregate(prices, from_date, to_date);
    compute_from_weekly(symbol, &weekly, to_date)
}

pub fn compute_from_weekly(
    symbol: &str,
    weekly: &[WeeklyPoint],
    as_of: NaiveDate,
) -> Result<StockMetrics, TrendpickError> {
    if weekly.len() < MIN_WEEKLY_POINTS {
        return Err(TrendpickError::InsufficientData {
            symbol: symbol.to_string(),
            weeks: weekly.len(),
            minimum: MIN_WEEKLY_POINTS,
        });
    }

    let closes: Vec<f64> = weekly.iter().map(|w| w.closing_price).collect();

    let (max_jump_1w_pct, max_drop_1w_pct) = extremes(&lagged_changes(&closes, 1));
    let (max_jump_2w_pct, max_drop_2w_pct) = extremes(&lagged_changes(&closes, 2));
    let (max_jump_4w_pct, max_drop_4w_pct) = extremes(&lagged_changes(&closes, 4));

    let linear = fit_against_index(&closes);
    let starting_price = closes[0];
    let linear_slope_pct = if starting_price != 0.0 {
        linear.slope / starting_price * 100.0
    } else {
        0.0
    };

    // ln is undefined for non-positive closes
    let (log_slope, log_r_squared) = if closes.iter().all(|&c| c > 0.0) {
        let log_closes: Vec<f64> = closes.iter().map(|c| c.ln()).collect();
        let fit = fit_against_index(&log_closes);
        (fit.slope, fit.r_squared)
    } else {
        (0.0, 0.0)
    };

    Ok(StockMetrics {
        symbol: symbol.to_string(),
        date: as_of,
        total_weeks: weekly.len(),
        linear_slope_pct,
        linear_r_squared: linear.r_squared,
        log_slope,
        log_r_squared,
        change_1w_pct: horizon_change(&closes, WEEKS_1W),
        change_2w_pct: horizon_change(&closes, WEEKS_2W),
        change_1m_pct: horizon_change(&closes, WEEKS_1M),
        change_3m_pct: horizon_change(&closes, WEEKS_3M),
        change_6m_pct: horizon_change(&closes, WEEKS_6M),
        change_1y_pct: horizon_change(&closes, WEEKS_1Y),
        max_jump_1w_pct,
        max_drop_1w_pct,
        max_jump_2w_pct,
        max_drop_2w_pct,
        max_jump_4w_pct,
        max_drop_4w_pct,
    })
}
