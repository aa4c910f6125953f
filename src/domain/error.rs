//! Domain error types.

use chrono::NaiveDate;

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for trendpick.
#[derive(Debug, thiserror::Error)]
pub enum TrendpickError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("invalid rule: {reason}")]
    RuleInvalid { reason: String },

    #[error("no price for {symbol} on or before {date}")]
    PriceNotFound { symbol: String, date: NaiveDate },

    #[error("insufficient data for {symbol}: have {weeks} weekly points, need {minimum}")]
    InsufficientData {
        symbol: String,
        weeks: usize,
        minimum: usize,
    },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for TrendpickError {
    fn from(err: serde_json::Error) -> Self {
        TrendpickError::Serialization {
            reason: err.to_string(),
        }
    }
}

impl From<&TrendpickError> for std::process::ExitCode {
    fn from(err: &TrendpickError) -> Self {
        let code: u8 = match err {
            TrendpickError::Io(_) | TrendpickError::Serialization { .. } => 1,
            TrendpickError::ConfigParse { .. }
            | TrendpickError::ConfigMissing { .. }
            | TrendpickError::ConfigInvalid { .. } => 2,
            TrendpickError::Database { .. } | TrendpickError::DatabaseQuery { .. } => 3,
            TrendpickError::RuleParse(_) | TrendpickError::RuleInvalid { .. } => 4,
            TrendpickError::PriceNotFound { .. } | TrendpickError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_context_points_at_position() {
        let err = ParseError {
            message: "unexpected token".into(),
            position: 4,
        };
        let ctx = err.display_with_context("abc > > 1");
        let lines: Vec<&str> = ctx.lines().collect();
        assert_eq!(lines[0], "abc > > 1");
        assert_eq!(lines[1], "    ^");
        assert!(lines[2].contains("position 4"));
    }

    #[test]
    fn price_not_found_message() {
        let err = TrendpickError::PriceNotFound {
            symbol: "AAPL".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
        };
        assert_eq!(err.to_string(), "no price for AAPL on or before 2024-03-04");
    }

    #[test]
    fn exit_codes_group_by_family() {
        use std::process::ExitCode;
        let rule = TrendpickError::RuleInvalid {
            reason: "x".into(),
        };
        let data = TrendpickError::InsufficientData {
            symbol: "X".into(),
            weeks: 2,
            minimum: 5,
        };
        assert_eq!(
            format!("{:?}", ExitCode::from(&rule)),
            format!("{:?}", ExitCode::from(4))
        );
        assert_eq!(
            format!("{:?}", ExitCode::from(&data)),
            format!("{:?}", ExitCode::from(5))
        );
    }
}
