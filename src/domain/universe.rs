//! Index membership (the stock universe).
//!
//! Membership at a date is rebuilt by replaying the index's constituent
//! change log in date order up to and including that date. Within one change
//! entry the removal is applied before the addition.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockIndex {
    #[serde(rename = "SP500")]
    Sp500,
    #[serde(rename = "DOWJONES")]
    DowJones,
    #[serde(rename = "NASDAQ")]
    Nasdaq,
}

impl StockIndex {
    pub const ALL: [StockIndex; 3] = [StockIndex::Sp500, StockIndex::DowJones, StockIndex::Nasdaq];

    pub fn name(self) -> &'static str {
        match self {
            StockIndex::Sp500 => "SP500",
            StockIndex::DowJones => "DOWJONES",
            StockIndex::Nasdaq => "NASDAQ",
        }
    }

    /// Symbol under which the index's own price series is stored.
    pub fn price_symbol(self) -> &'static str {
        match self {
            StockIndex::Sp500 => "^GSPC",
            StockIndex::DowJones => "^DJI",
            StockIndex::Nasdaq => "^IXIC",
        }
    }
}

impl fmt::Display for StockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("unknown index '{0}' (expected SP500, DOWJONES or NASDAQ)")]
    UnknownIndex(String),

    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

impl FromStr for StockIndex {
    type Err = UniverseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        StockIndex::ALL
            .into_iter()
            .find(|idx| idx.name() == upper)
            .ok_or_else(|| UniverseError::UnknownIndex(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstituentChange {
    pub date: NaiveDate,
    pub added_symbol: Option<String>,
    pub removed_symbol: Option<String>,
}

/// Sorted membership after replaying every change dated on or before `as_of`.
pub fn constituents_at(changes: &[ConstituentChange], as_of: NaiveDate) -> Vec<String> {
    let mut ordered: Vec<&ConstituentChange> = changes.iter().filter(|c| c.date <= as_of).collect();
    ordered.sort_by_key(|c| c.date);

    let mut members: BTreeSet<String> = BTreeSet::new();
    for change in ordered {
        if let Some(removed) = &change.removed_symbol {
            members.remove(removed);
        }
        if let Some(added) = &change.added_symbol {
            members.insert(added.clone());
        }
    }
    members.into_iter().collect()
}

/// Parse a comma-separated symbol list, upper-casing each entry.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}
