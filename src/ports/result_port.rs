//! Result hand-off port trait.

use crate::domain::error::TrendpickError;
use crate::domain::metrics::StockMetrics;
use crate::domain::simulation::SimulationResult;

/// Receives finished results for storage. The domain defines no schema.
pub trait ResultPort {
    fn write_simulation(&self, result: &SimulationResult, output_path: &str) -> Result<(), TrendpickError>;

    fn write_metrics(&self, metrics: &[StockMetrics], output_path: &str) -> Result<(), TrendpickError>;
}
