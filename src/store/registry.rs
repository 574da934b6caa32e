use crate::core::{StoreError, Ticker};
use crate::store::{read_json, write_json_atomic};
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

/// The ordered set of tracked tickers, mirrored to a JSON array on disk.
///
/// Every mutation holds the write lock for its whole read-modify-persist
/// sequence and builds the new list on a copy. The copy only replaces the
/// in-memory list once it is on disk, so a failed write changes nothing.
pub struct TickerRegistry {
    path: PathBuf,
    tickers: RwLock<Vec<Ticker>>,
}

impl TickerRegistry {
    /// Loads the registry from `path`. A missing file is an empty registry.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut tickers: Vec<Ticker> = read_json(&path).await?.unwrap_or_default();

        // Hand edited files may carry duplicates
        let mut seen = HashSet::new();
        tickers.retain(|t| seen.insert(t.clone()));

        info!(
            count = tickers.len(),
            path = %path.display(),
            "Loaded ticker registry"
        );
        Ok(Self {
            path,
            tickers: RwLock::new(tickers),
        })
    }

    pub async fn list(&self) -> Vec<Ticker> {
        self.tickers.read().await.clone()
    }

    /// Read access that keeps removals out until the guard is dropped.
    pub async fn tracked(&self) -> RwLockReadGuard<'_, Vec<Ticker>> {
        self.tickers.read().await
    }

    /// Appends every candidate that is in `valid` and not yet tracked.
    ///
    /// Returns `false` without touching the file when nothing was added.
    pub async fn add(
        &self,
        candidates: &[Ticker],
        valid: &HashSet<Ticker>,
    ) -> Result<bool, StoreError> {
        let mut tickers = self.tickers.write().await;

        let mut updated = tickers.clone();
        for candidate in candidates {
            if valid.contains(candidate) && !updated.contains(candidate) {
                updated.push(candidate.clone());
            }
        }

        if updated.len() == tickers.len() {
            debug!(?candidates, "No new tickers to add");
            return Ok(false);
        }

        write_json_atomic(&self.path, &updated).await?;
        info!(added = ?&updated[tickers.len()..], "Added tickers");
        *tickers = updated;
        Ok(true)
    }

    /// Removes every tracked candidate. Returns `false` when none was tracked.
    pub async fn remove(&self, candidates: &[Ticker]) -> Result<bool, StoreError> {
        let removed = self
            .remove_then(candidates, |_| async { Ok::<(), StoreError>(()) })
            .await?;
        Ok(!removed.is_empty())
    }

    /// Removes every tracked candidate, running `on_removed` with the removed
    /// tickers before the registry itself is persisted.
    ///
    /// The write lock is held throughout. If `on_removed` fails the registry
    /// is left untouched and its error is returned.
    pub async fn remove_then<F, Fut>(
        &self,
        candidates: &[Ticker],
        on_removed: F,
    ) -> Result<Vec<Ticker>, StoreError>
    where
        F: FnOnce(Vec<Ticker>) -> Fut,
        Fut: Future<Output = Result<(), StoreError>>,
    {
        let candidates: HashSet<&Ticker> = candidates.iter().collect();
        let mut tickers = self.tickers.write().await;

        let (removed, kept): (Vec<Ticker>, Vec<Ticker>) = tickers
            .iter()
            .cloned()
            .partition(|t| candidates.contains(t));

        if removed.is_empty() {
            debug!("None of the tickers to remove are tracked");
            return Ok(removed);
        }

        on_removed(removed.clone()).await?;
        write_json_atomic(&self.path, &kept).await?;
        info!(?removed, "Removed tickers");
        *tickers = kept;
        Ok(removed)
    }
}
