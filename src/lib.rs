pub mod api;
pub mod core;
pub mod providers;
pub mod refresher;
pub mod store;

use crate::api::{AppState, create_router};
use crate::core::QuoteProvider;
use crate::core::config::AppConfig;
use crate::refresher::Refresher;
use crate::store::{QuoteStore, TickerRegistry};
use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

/// A bound, not yet running service: HTTP listener plus quote refresher.
pub struct App {
    listener: TcpListener,
    router: Router,
    refresher: Refresher,
}

impl App {
    /// Fetches the valid-ticker set, loads persisted state and binds `addr`.
    pub async fn bind(
        config: &AppConfig,
        addr: SocketAddr,
        provider: Arc<dyn QuoteProvider>,
    ) -> Result<Self> {
        let valid_tickers = provider
            .fetch_valid_tickers()
            .await
            .context("Failed to fetch the list of valid tickers")?;
        info!(count = valid_tickers.len(), "Fetched valid tickers");

        let tickers_path = config.tickers_path()?;
        let registry = Arc::new(
            TickerRegistry::load(&tickers_path)
                .await
                .with_context(|| format!("Failed to load tickers: {}", tickers_path.display()))?,
        );
        let quotes = Arc::new(QuoteStore::new(config.quotes_path()?));

        let refresher = Refresher::new(
            Arc::clone(&registry),
            Arc::clone(&quotes),
            provider,
            config.refresh_interval(),
        );
        let router = create_router(AppState {
            registry,
            quotes,
            valid_tickers: Arc::new(valid_tickers),
        });

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;

        Ok(Self {
            listener,
            router,
            refresher,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests and refreshes quotes until `shutdown` completes.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let refresher = tokio::spawn(self.refresher.run());

        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await;

        refresher.abort();
        info!("Server stopped");
        result.context("HTTP server failed")
    }
}

pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn QuoteProvider>> {
    let cc = config
        .providers
        .cryptocompare
        .as_ref()
        .context("No quote provider configured")?;
    Ok(Arc::new(providers::CryptoCompareProvider::new(
        &cc.base_url,
        &cc.currency,
    )))
}

pub async fn run(config_path: Option<&str>, port: Option<u16>) -> Result<()> {
    info!("Coinwatch starting...");

    let mut config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    if let Some(port) = port {
        config.port = port;
    }
    debug!("Loaded config: {config:#?}");

    let provider = build_provider(&config)?;
    let app = App::bind(&config, SocketAddr::from(([0, 0, 0, 0], config.port)), provider).await?;
    info!(addr = %app.local_addr()?, "Server listening");

    app.run(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
