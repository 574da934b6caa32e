//! HTTP API
//!
//! `GET`, `POST` and `DELETE` on any path under the `/crypto` prefix query the
//! quote history, start tracking tickers and stop tracking them. Every
//! response body is JSON.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use crate::core::ticker::parse_list;
use crate::core::{QuoteMap, StoreError, Ticker};
use crate::store::quotes::{parse_step, windowed};
use crate::store::{QuoteStore, TickerRegistry};

pub const NOT_FOUND_MESSAGE: &str = "Not found";
pub const SERVER_ERROR_MESSAGE: &str = "Internal server error";
pub const SUCCESS_ADD_MESSAGE: &str = "Ticker(s) added";
pub const SUCCESS_DELETE_MESSAGE: &str = "Ticker(s) removed";
pub const INVALID_REQUEST_MESSAGE: &str = "Invalid request";

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<TickerRegistry>,
    pub quotes: Arc<QuoteStore>,
    pub valid_tickers: Arc<HashSet<Ticker>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or unusable input; reported to the caller, not logged as a fault.
    #[error("invalid request")]
    Validation,

    #[error(transparent)]
    Persistence(#[from] StoreError),

    #[error("not found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation => (StatusCode::BAD_REQUEST, INVALID_REQUEST_MESSAGE),
            ApiError::Persistence(e) => {
                error!(error = %e, "Request failed on persisted state");
                (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE)
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE),
        };
        (status, MessageBody::new(message)).into_response()
    }
}

/// Every path starting with this prefix is served by the crypto handlers.
pub const CRYPTO_PATH_PREFIX: &str = "/crypto";

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

/// Routes by path prefix, so `/crypto/`, `/crypto/latest` and `/cryptox`
/// reach the same handlers as `/crypto`.
async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    if !uri.path().starts_with(CRYPTO_PATH_PREFIX) {
        return ApiError::NotFound.into_response();
    }

    match method {
        Method::GET => get_quotes(&state, &uri).await.into_response(),
        Method::POST => add_tickers(&state, &body).await.into_response(),
        Method::DELETE => remove_tickers(&state, &uri).await.into_response(),
        _ => ApiError::NotFound.into_response(),
    }
}

#[derive(Debug, Default)]
struct CryptoQuery {
    tickers: Option<String>,
    step: Option<String>,
}

impl CryptoQuery {
    /// Reads the query string. A repeated key keeps its first value.
    fn from_uri(uri: &Uri) -> Result<Self, ApiError> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).map_err(|e| {
            debug!(error = %e, "Malformed query string");
            ApiError::Validation
        })?;

        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "tickers" => &mut query.tickers,
                "step" => &mut query.step,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        Ok(query)
    }

    fn tickers(&self) -> Option<&str> {
        self.tickers.as_deref().filter(|raw| !raw.trim().is_empty())
    }
}

/// GET /crypto?tickers=BTC,ETH&step=10
async fn get_quotes(state: &AppState, uri: &Uri) -> Result<Json<QuoteMap>, ApiError> {
    let query = CryptoQuery::from_uri(uri)?;
    let quotes = match query.tickers() {
        Some(raw) => {
            let symbols: HashSet<Ticker> = parse_list(raw).into_iter().collect();
            state.quotes.read_filtered(&symbols).await?
        }
        None => state.quotes.read_all().await?,
    };

    Ok(Json(windowed(quotes, parse_step(query.step.as_deref()))))
}

/// POST /crypto with `"btc"` or `["btc", "eth"]`
async fn add_tickers(state: &AppState, body: &[u8]) -> Result<Json<MessageBody>, ApiError> {
    let candidates = parse_add_body(body);

    if state.registry.add(&candidates, &state.valid_tickers).await? {
        Ok(MessageBody::new(SUCCESS_ADD_MESSAGE))
    } else {
        debug!(?candidates, "Nothing to add");
        Err(ApiError::Validation)
    }
}

/// DELETE /crypto?tickers=BTC,ETH
async fn remove_tickers(state: &AppState, uri: &Uri) -> Result<Json<MessageBody>, ApiError> {
    let query = CryptoQuery::from_uri(uri)?;
    let candidates = parse_list(query.tickers().ok_or(ApiError::Validation)?);

    let quotes = Arc::clone(&state.quotes);
    let removed = state
        .registry
        .remove_then(&candidates, move |removed| async move {
            quotes.delete_series(&removed).await
        })
        .await?;

    if removed.is_empty() {
        debug!(?candidates, "Nothing to remove");
        return Err(ApiError::Validation);
    }
    Ok(MessageBody::new(SUCCESS_DELETE_MESSAGE))
}

/// Reads the tickers of an add request.
///
/// The whole body is uppercased before parsing. A JSON string is one
/// candidate, an array contributes its string elements, anything else none.
fn parse_add_body(body: &[u8]) -> Vec<Ticker> {
    let raw = String::from_utf8_lossy(body).to_uppercase();
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::String(symbol)) => vec![Ticker::from(symbol)],
        Ok(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(Ticker::new)
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            debug!(error = %e, "Malformed add request body");
            Vec::new()
        }
    }
}
