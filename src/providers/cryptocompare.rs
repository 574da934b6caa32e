use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Number;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

use crate::core::{QuotePoint, QuoteProvider, Ticker};
use crate::providers::util::with_retry;

/// Upper bound on symbols per `pricemulti` request; the API caps `fsyms` length.
const MAX_SYMBOLS_PER_REQUEST: usize = 50;

// CryptoCompareProvider implementation for QuoteProvider
pub struct CryptoCompareProvider {
    base_url: String,
    currency: String,
}

impl CryptoCompareProvider {
    pub fn new(base_url: &str, currency: &str) -> Self {
        CryptoCompareProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            currency: currency.to_uppercase(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .user_agent("coinwatch/1.0")
            .build()?;
        let response = with_retry(|| async { client.get(url).send().await }, 3, 500)
            .await
            .with_context(|| format!("Request error for URL: {url}"))?;

        debug!(status = %response.status(), "Received CryptoCompare response");
        if !response.status().is_success() {
            bail!("HTTP error: {} for URL: {}", response.status(), url);
        }

        Ok(response.text().await?)
    }
}

#[derive(Debug, Deserialize)]
struct CoinListResponse {
    #[serde(rename = "Response")]
    response: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
    #[serde(rename = "Data", default)]
    data: HashMap<String, IgnoredAny>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceMultiResponse {
    Error {
        #[serde(rename = "Message")]
        message: String,
    },
    Prices(HashMap<String, HashMap<String, Number>>),
}

#[async_trait]
impl QuoteProvider for CryptoCompareProvider {
    #[instrument(name = "CryptoCompareCoinList", skip(self))]
    async fn fetch_valid_tickers(&self) -> Result<HashSet<Ticker>> {
        let url = format!("{}/data/all/coinlist?summary=true", self.base_url);
        debug!("Requesting coin list from {}", url);

        let text = self.get_text(&url).await?;
        let data: CoinListResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse coin list response: {}", e))?;

        if data.response.as_deref() == Some("Error") {
            bail!(
                "Coin list request failed: {}",
                data.message.unwrap_or_default()
            );
        }
        if data.data.is_empty() {
            bail!("Coin list response contained no tickers");
        }

        let tickers: HashSet<Ticker> = data.data.into_keys().map(Ticker::from).collect();
        debug!(count = tickers.len(), "Fetched valid tickers");
        Ok(tickers)
    }

    #[instrument(name = "CryptoCompareQuotes", skip(self), fields(count = tickers.len()))]
    async fn fetch_quotes(&self, tickers: &[Ticker]) -> Result<HashMap<Ticker, QuotePoint>> {
        let mut quotes = HashMap::new();

        for chunk in tickers.chunks(MAX_SYMBOLS_PER_REQUEST) {
            let symbols = chunk
                .iter()
                .map(Ticker::as_str)
                .collect::<Vec<_>>()
                .join(",");
            let url = format!(
                "{}/data/pricemulti?fsyms={}&tsyms={}",
                self.base_url, symbols, self.currency
            );
            debug!("Requesting prices from {}", url);

            let text = self.get_text(&url).await?;
            let data: PriceMultiResponse = serde_json::from_str(&text)
                .map_err(|e| anyhow!("Failed to parse price response for {}: {}", symbols, e))?;

            match data {
                PriceMultiResponse::Error { message } => {
                    bail!("Price request failed for {}: {}", symbols, message)
                }
                PriceMultiResponse::Prices(prices) => {
                    for (symbol, mut by_currency) in prices {
                        if let Some(price) = by_currency.remove(&self.currency) {
                            quotes.insert(Ticker::from(symbol), QuotePoint(price));
                        }
                    }
                }
            }
        }

        Ok(quotes)
    }
}
