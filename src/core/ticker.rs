//! Ticker symbols

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// An uppercase symbol identifying a tracked asset, e.g. `BTC`.
///
/// Every constructor normalizes the input, so two tickers compare equal exactly
/// when their uppercased, trimmed text is equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn new(symbol: &str) -> Self {
        Ticker(symbol.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Ticker {
    fn from(symbol: String) -> Self {
        Ticker::new(&symbol)
    }
}

impl From<&str> for Ticker {
    fn from(symbol: &str) -> Self {
        Ticker::new(symbol)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Splits a comma separated list such as `btc,ETH` into tickers.
///
/// Order and duplicates are preserved; empty entries are dropped.
pub fn parse_list(raw: &str) -> Vec<Ticker> {
    raw.split(',')
        .map(Ticker::new)
        .filter(|t| !t.as_str().is_empty())
        .collect()
}
