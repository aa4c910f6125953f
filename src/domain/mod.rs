//! Core domain types and logic.

pub mod price;
pub mod weekly;
pub mod regression;
pub mod metrics;
pub mod ranking;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod universe;
pub mod batch;
pub mod investment;
pub mod simulation;
pub mod config_validation;
pub mod error;
