//! JSON result adapter implementing ResultPort.
//!
//! Writes simulation results and metrics batches as JSON documents. An
//! output path of `-` writes to stdout.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::domain::error::TrendpickError;
use crate::domain::metrics::StockMetrics;
use crate::domain::simulation::SimulationResult;
use crate::ports::result_port::ResultPort;
use serde::Serialize;

pub struct JsonReportAdapter {
    pretty: bool,
}

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, TrendpickError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(json)
    }

    fn write_document<T: Serialize + ?Sized>(&self, value: &T, output_path: &str) -> Result<(), TrendpickError> {
        let json = self.to_json(value)?;

        if output_path == "-" {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
            return Ok(());
        }

        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultPort for JsonReportAdapter {
    fn write_simulation(&self, result: &SimulationResult, output_path: &str) -> Result<(), TrendpickError> {
        self.write_document(result, output_path)
    }

    fn write_metrics(&self, metrics: &[StockMetrics], output_path: &str) -> Result<(), TrendpickError> {
        self.write_document(metrics, output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::simulation::{SimulationConfig, INITIAL_BALANCE};
    use crate::domain::universe::StockIndex;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_result() -> SimulationResult {
        SimulationResult {
            initial_balance: INITIAL_BALANCE,
            final_balance: 10_500.0,
            date_start: d(2024, 1, 1),
            date_end: d(2024, 6, 28),
            rebalance_history: Vec::new(),
            profit_pct: 0.05,
            profit: 500.0,
            baseline_index: StockIndex::Sp500,
            baseline_profit_pct: 0.02,
            baseline_profit: 200.0,
            baseline_balance: 10_200.0,
            simulation_config: SimulationConfig {
                max_stocks: 3,
                rebalance_interval_weeks: 2,
                date_start: d(2024, 1, 1),
                date_end: d(2024, 6, 28),
                rule: "change_3m_pct > 5".into(),
                index: StockIndex::Nasdaq,
                involved_keys: vec!["change_3m_pct".into()],
            },
        }
    }

    #[test]
    fn write_simulation_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("nested/run/result.json");

        JsonReportAdapter::new()
            .write_simulation(&sample_result(), output_path.to_str().unwrap())
            .unwrap();

        let contents = fs::read_to_string(&output_path).unwrap();
        let back: SimulationResult = serde_json::from_str(&contents).unwrap();
        assert_eq!(back, sample_result());
    }

    #[test]
    fn json_uses_plain_dates_and_index_names() {
        let json = JsonReportAdapter::compact().to_json(&sample_result()).unwrap();
        assert!(json.contains(r#""date_start":"2024-01-01""#));
        assert!(json.contains(r#""baseline_index":"SP500""#));
        assert!(json.contains(r#""index":"NASDAQ""#));
        assert!(json.contains(r#""involved_keys":["change_3m_pct"]"#));
    }

    #[test]
    fn write_metrics_writes_array() {
        let dir = tempdir().unwrap();
        let output_path = dir.path().join("metrics.json");
        JsonReportAdapter::new()
            .write_metrics(&[], output_path.to_str().unwrap())
            .unwrap();
        assert_eq!(fs::read_to_string(&output_path).unwrap().trim(), "[]");
    }
}
