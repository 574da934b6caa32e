use crate::core::{QuoteMap, QuotePoint, StoreError, Ticker};
use crate::store::{read_json, write_json_atomic};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Price history of every ticker, persisted as one JSON object.
///
/// The file is the source of truth and its path is only reachable through the
/// lock: readers share it, while each writer holds it exclusively across its
/// whole read-modify-persist sequence.
pub struct QuoteStore {
    path: RwLock<PathBuf>,
}

impl QuoteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: RwLock::new(path.into()),
        }
    }

    pub async fn read_all(&self) -> Result<QuoteMap, StoreError> {
        let path = self.path.read().await;
        load(&path).await
    }

    /// Like [`QuoteStore::read_all`], keeping only `symbols`. Symbols that have
    /// no series are omitted.
    pub async fn read_filtered(&self, symbols: &HashSet<Ticker>) -> Result<QuoteMap, StoreError> {
        let mut quotes = self.read_all().await?;
        quotes.retain(|ticker, _| symbols.contains(ticker));
        Ok(quotes)
    }

    /// Replaces the whole series of every ticker in `series`.
    pub async fn replace(&self, series: QuoteMap) -> Result<(), StoreError> {
        self.update(|quotes| quotes.extend(series)).await
    }

    /// Appends one point to the series of each ticker, creating missing series.
    pub async fn append(&self, points: HashMap<Ticker, QuotePoint>) -> Result<(), StoreError> {
        self.update(|quotes| {
            for (ticker, point) in points {
                quotes.entry(ticker).or_default().push(point);
            }
        })
        .await
    }

    pub async fn delete_series(&self, symbols: &[Ticker]) -> Result<(), StoreError> {
        self.update(|quotes| {
            for symbol in symbols {
                if quotes.remove(symbol).is_some() {
                    debug!(%symbol, "Deleted quote series");
                }
            }
        })
        .await
    }

    async fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut QuoteMap),
    {
        let path = self.path.write().await;
        let mut quotes = load(&path).await?;
        apply(&mut quotes);
        write_json_atomic(&path, &quotes).await
    }
}

async fn load(path: &Path) -> Result<QuoteMap, StoreError> {
    Ok(read_json(path).await?.unwrap_or_default())
}

/// Parses a `step` query value from its leading integer, so `"2abc"` and
/// `"2.5"` are both 2. No leading digits, or a value below 1, is `None`.
pub fn parse_step(raw: Option<&str>) -> Option<usize> {
    let raw = raw?.trim();
    let (negative, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };

    let digits = unsigned.bytes().take_while(u8::is_ascii_digit).count();
    if negative || digits == 0 {
        return None;
    }

    // Only overflow can fail here
    let step = unsigned[..digits].parse::<usize>().unwrap_or(usize::MAX);
    (step > 0).then_some(step)
}

/// Trims every series to its most recent `step` points.
///
/// Without a step the map is returned unchanged. This never touches the store.
pub fn windowed(mut series_map: QuoteMap, step: Option<usize>) -> QuoteMap {
    let Some(step) = step.filter(|s| *s > 0) else {
        return series_map;
    };

    for series in series_map.values_mut() {
        if series.len() > step {
            series.drain(..series.len() - step);
        }
    }
    series_map
}
