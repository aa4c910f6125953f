//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod data_source;
pub mod file_config_adapter;
pub mod json_report_adapter;
pub mod price_cache;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
