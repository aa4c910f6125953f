//! Port traits the domain depends on.

pub mod config_port;
pub mod index_port;
pub mod price_port;
pub mod result_port;
