//! Quote abstractions and core types

use crate::core::ticker::Ticker;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A single price observation. Arrival order is chronological order.
///
/// The number is kept exactly as it was read, so `4` stays `4` and `4.0`
/// stays `4.0` when the store is written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotePoint(pub Number);

pub type QuoteSeries = Vec<QuotePoint>;

/// Price history of every ticker in the store, keyed by symbol.
pub type QuoteMap = BTreeMap<Ticker, QuoteSeries>;

/// Source of the valid-ticker set and of fresh prices.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_valid_tickers(&self) -> Result<HashSet<Ticker>>;

    /// Latest price for each requested ticker. Unknown tickers are left out.
    async fn fetch_quotes(&self, tickers: &[Ticker]) -> Result<HashMap<Ticker, QuotePoint>>;
}
