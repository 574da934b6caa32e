//! Periodic refresh of the quote history of every tracked ticker.

use crate::core::QuoteProvider;
use crate::store::{QuoteStore, TickerRegistry};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

pub struct Refresher {
    registry: Arc<TickerRegistry>,
    quotes: Arc<QuoteStore>,
    provider: Arc<dyn QuoteProvider>,
    interval: Duration,
}

impl Refresher {
    pub fn new(
        registry: Arc<TickerRegistry>,
        quotes: Arc<QuoteStore>,
        provider: Arc<dyn QuoteProvider>,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            quotes,
            provider,
            interval,
        }
    }

    /// Fetches one fresh point for every tracked ticker and appends it.
    ///
    /// Returns the number of series that received a point.
    #[instrument(name = "RefreshCycle", skip(self))]
    pub async fn refresh_once(&self) -> Result<usize> {
        let tickers = self.registry.list().await;
        if tickers.is_empty() {
            debug!("No tracked tickers, skipping refresh");
            return Ok(0);
        }

        let fresh = self
            .provider
            .fetch_quotes(&tickers)
            .await
            .context("Failed to fetch quotes")?;

        // Tickers removed while the fetch was in flight must not get their
        // series back, so removals wait until the append is done.
        let tracked = self.registry.tracked().await;
        let fresh: HashMap<_, _> = fresh
            .into_iter()
            .filter(|(ticker, _)| tracked.contains(ticker))
            .collect();

        let updated = fresh.len();
        if updated > 0 {
            self.quotes
                .append(fresh)
                .await
                .context("Failed to store quotes")?;
        }
        drop(tracked);

        debug!(updated, requested = tickers.len(), "Refresh complete");
        Ok(updated)
    }

    /// Runs refresh cycles forever, one per interval. A failed cycle is logged
    /// and the next tick is a fresh attempt.
    pub async fn run(self) {
        info!(interval = ?self.interval, "Starting quote refresher");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh_once().await {
                warn!(error = ?e, "Refresh cycle failed");
            }
        }
    }
}
