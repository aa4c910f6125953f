//! Periodic-rebalancing backtest.
//!
//! Starting from the first Monday after `date_start`, the simulator steps in
//! blocks of `rebalance_interval_weeks`. At each boundary it picks the top
//! ranked index members, splits the running balance equally across them,
//! holds until the next boundary and books the realized profit. Each period
//! the same pre-period balance is also put into the baseline index, whose
//! profits accrue to a separate running balance. A period that would end
//! after `date_end` is never started.

use crate::domain::batch::{self, LOOKBACK_WEEKS, MAX_CONCURRENT_SYMBOLS};
use crate::domain::error::TrendpickError;
use crate::domain::investment::{self, Investment};
use crate::domain::metrics::StockMetrics;
use crate::domain::price::DailyPrice;
use crate::domain::ranking;
use crate::domain::rule_eval::CompiledRule;
use crate::domain::universe::StockIndex;
use crate::ports::index_port::IndexPort;
use crate::ports::price_port::PricePort;
use chrono::{Datelike, Duration, NaiveDate};
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Starting cash for both the portfolio and the baseline.
pub const INITIAL_BALANCE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub max_stocks: usize,
    pub rebalance_interval_weeks: u32,
    pub index: StockIndex,
    pub baseline_index: StockIndex,
}

impl SimulationParams {
    pub fn validate(&self) -> Result<(), TrendpickError> {
        if self.date_start >= self.date_end {
            return Err(TrendpickError::ConfigInvalid {
                section: "simulation".into(),
                key: "date_start".into(),
                reason: format!(
                    "date_start ({}) must be before date_end ({})",
                    self.date_start, self.date_end
                ),
            });
        }
        if self.max_stocks == 0 {
            return Err(TrendpickError::ConfigInvalid {
                section: "simulation".into(),
                key: "max_stocks".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.rebalance_interval_weeks == 0 {
            return Err(TrendpickError::ConfigInvalid {
                section: "simulation".into(),
                key: "rebalance_interval_weeks".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Echo of the inputs that produced a [`SimulationResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub max_stocks: usize,
    pub rebalance_interval_weeks: u32,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub rule: String,
    pub index: StockIndex,
    pub involved_keys: Vec<String>,
}

/// Outcome of one holding period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceHistory {
    pub date: NaiveDate,
    /// Portfolio balance before the period.
    pub balance: f64,
    pub investments: Vec<Investment>,
    /// Fraction of `balance`, not a percentage.
    pub profit_pct: f64,
    pub profit: f64,
    /// Percent move of the baseline index over the period.
    pub baseline_profit_pct: f64,
    pub baseline_profit: f64,
    /// Baseline balance before the period.
    pub baseline_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub rebalance_history: Vec<RebalanceHistory>,
    /// Fraction of the initial balance.
    pub profit_pct: f64,
    pub profit: f64,
    pub baseline_index: StockIndex,
    pub baseline_profit_pct: f64,
    pub baseline_profit: f64,
    pub baseline_balance: f64,
    pub simulation_config: SimulationConfig,
}

/// The Monday after `date`. A Monday maps to the following Monday.
pub fn next_monday(date: NaiveDate) -> NaiveDate {
    let days_from_monday = date.weekday().num_days_from_monday() as i64;
    date + Duration::days(7 - days_from_monday)
}

fn fraction(profit: f64, base: f64) -> f64 {
    if base == 0.0 { 0.0 } else { profit / base }
}

pub struct Simulator<'a> {
    params: SimulationParams,
    rule: CompiledRule,
    prices: &'a dyn PricePort,
    index: &'a dyn IndexPort,
    pool: ThreadPool,
}

impl<'a> Simulator<'a> {
    pub fn new(
        params: SimulationParams,
        rule: CompiledRule,
        prices: &'a dyn PricePort,
        index: &'a dyn IndexPort,
    ) -> Result<Self, TrendpickError> {
        params.validate()?;
        let pool = batch::build_pool(MAX_CONCURRENT_SYMBOLS)?;
        Ok(Self {
            params,
            rule,
            prices,
            index,
            pool,
        })
    }

    /// Ranked selection at `today`, at most `max_stocks` long.
    pub fn pick_stocks(&self, today: NaiveDate) -> Result<Vec<StockMetrics>, TrendpickError> {
        let symbols = self.index.constituents_at(self.params.index, today)?;
        let batch = batch::compute_metrics_batch(self.prices, &symbols, today, LOOKBACK_WEEKS, &self.pool);
        let candidates = batch.len();

        let mut selected = ranking::apply(batch, |m| self.rule.matches(m));
        let filtered = selected.len();
        selected.truncate(self.params.max_stocks);

        info!(
            date = %today,
            members = symbols.len(),
            candidates,
            filtered,
            selected = ?selected.iter().map(|m| m.symbol.as_str()).collect::<Vec<_>>(),
            "stocks picked"
        );
        Ok(selected)
    }

    fn quote(
        &self,
        symbol: &str,
        buy_date: NaiveDate,
        sell_date: NaiveDate,
    ) -> Result<(DailyPrice, DailyPrice), TrendpickError> {
        let buy = self.prices.price_at(symbol, buy_date, true)?;
        let sell = self.prices.price_at(symbol, sell_date, true)?;
        Ok((buy, sell))
    }

    /// Buy `amount` of `symbol` at `buy_date` and sell at `sell_date`.
    pub fn invest(
        &self,
        symbol: &str,
        buy_date: NaiveDate,
        sell_date: NaiveDate,
        amount: f64,
    ) -> Result<Investment, TrendpickError> {
        let (buy, sell) = self.quote(symbol, buy_date, sell_date)?;
        Ok(investment::invest(
            symbol,
            amount,
            buy.adj_close,
            buy_date,
            sell.adj_close,
            sell_date,
        ))
    }

    /// Put all of `amount` in the baseline index. The simulator passes the
    /// portfolio's pre-period balance, so both legs start each period with
    /// the same stake.
    pub fn invest_baseline(
        &self,
        buy_date: NaiveDate,
        sell_date: NaiveDate,
        amount: f64,
    ) -> Result<Investment, TrendpickError> {
        let baseline = self.params.baseline_index;
        let (buy, sell) = self.quote(baseline.price_symbol(), buy_date, sell_date)?;
        Ok(investment::invest(
            baseline.name(),
            amount,
            buy.adj_close,
            buy_date,
            sell.adj_close,
            sell_date,
        ))
    }

    /// Equal-weight investments across the symbols that can be priced on
    /// both dates. Unpriceable symbols are dropped before the split.
    fn invest_selection(
        &self,
        selected: &[StockMetrics],
        buy_date: NaiveDate,
        sell_date: NaiveDate,
        balance: f64,
    ) -> Vec<Investment> {
        let quoted: Vec<(&str, DailyPrice, DailyPrice)> = selected
            .iter()
            .filter_map(|m| match self.quote(&m.symbol, buy_date, sell_date) {
                Ok((buy, sell)) => Some((m.symbol.as_str(), buy, sell)),
                Err(e) => {
                    warn!(symbol = %m.symbol, %buy_date, %sell_date, error = %e, "dropping unpriceable symbol");
                    None
                }
            })
            .collect();

        if quoted.is_empty() {
            return Vec::new();
        }
        let amount = balance / quoted.len() as f64;

        quoted
            .into_iter()
            .map(|(symbol, buy, sell)| {
                investment::invest(symbol, amount, buy.adj_close, buy_date, sell.adj_close, sell_date)
            })
            .collect()
    }

    pub fn simulate(&self) -> Result<SimulationResult, TrendpickError> {
        let p = &self.params;
        let interval = Duration::weeks(p.rebalance_interval_weeks as i64);

        let mut balance = INITIAL_BALANCE;
        let mut baseline_balance = INITIAL_BALANCE;
        let mut history: Vec<RebalanceHistory> = Vec::new();
        let mut date_iter = next_monday(p.date_start);

        while date_iter < p.date_end {
            let end_date = date_iter + interval;
            if end_date > p.date_end {
                break;
            }

            info!(date = %date_iter, hold_until = %end_date, balance, "rebalance");

            let selected = self.pick_stocks(date_iter)?;
            let investments = self.invest_selection(&selected, date_iter, end_date, balance);
            let profit: f64 = investments.iter().map(|i| i.profit).sum();

            let baseline = self.invest_baseline(date_iter, end_date, balance)?;

            history.push(RebalanceHistory {
                date: date_iter,
                balance,
                investments,
                profit_pct: fraction(profit, balance),
                profit,
                baseline_profit_pct: baseline.profit_pct,
                baseline_profit: baseline.profit,
                baseline_balance,
            });

            baseline_balance += baseline.profit;
            balance += profit;
            date_iter = end_date;
        }

        info!(
            periods = history.len(),
            final_balance = balance,
            baseline_balance,
            "simulation finished"
        );

        Ok(SimulationResult {
            initial_balance: INITIAL_BALANCE,
            final_balance: balance,
            date_start: p.date_start,
            date_end: p.date_end,
            rebalance_history: history,
            profit_pct: fraction(balance - INITIAL_BALANCE, INITIAL_BALANCE),
            profit: balance - INITIAL_BALANCE,
            baseline_index: p.baseline_index,
            baseline_profit_pct: fraction(baseline_balance - INITIAL_BALANCE, INITIAL_BALANCE),
            baseline_profit: baseline_balance - INITIAL_BALANCE,
            baseline_balance,
            simulation_config: SimulationConfig {
                max_stocks: p.max_stocks,
                rebalance_interval_weeks: p.rebalance_interval_weeks,
                date_start: p.date_start,
                date_end: p.date_end,
                rule: self.rule.source().to_string(),
                index: p.index,
                involved_keys: self.rule.referenced_fields(),
            },
        })
    }
}
