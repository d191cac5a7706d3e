//! Thin request wrapper around the Deribit public REST API.
//!
//! One method per endpoint, no retries: a failed call surfaces as a
//! [`CollectError`] and the caller decides whether to skip or continue.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::CollectError;
use crate::model::{Instrument, TimeWindow, TradePage};

pub const DERIBIT_MAINNET: &str = "https://www.deribit.com/api/v2";
pub const DERIBIT_TESTNET: &str = "https://test.deribit.com/api/v2";

pub const GET_INSTRUMENTS: &str = "public/get_instruments";
pub const GET_TRADES: &str = "public/get_last_trades_by_instrument_and_time";

/// Page limit of the trades endpoint. A window holding more trades than this
/// is truncated to the first page; callers needing completeness must shrink
/// the window.
pub const MAX_TRADES_PER_REQUEST: u32 = 1000;

const USER_AGENT: &str = "deribit-harvest/0.1";

// ── Trait ────────────────────────────────────────────────────────────

/// Read-only market data operations used by the pipeline.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// List option instruments on `underlying`, either live or expired ones.
    async fn list_instruments(
        &self,
        underlying: &str,
        expired: bool,
    ) -> Result<Vec<Instrument>, CollectError>;

    /// Trades of one instrument inside `window`, at most `max_count` of them
    /// (clamped to [`MAX_TRADES_PER_REQUEST`]).
    async fn fetch_trades(
        &self,
        instrument_name: &str,
        window: TimeWindow,
        max_count: u32,
    ) -> Result<TradePage, CollectError>;
}

// ── API response types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    message: String,
}

// ── HTTP client ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DeribitClient {
    http: reqwest::Client,
    base_url: String,
}

impl DeribitClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollectError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CollectError::Config(format!("creating HTTP client: {e}")))?;
        Ok(Self::with_http(http, base_url))
    }

    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        DeribitClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, CollectError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let transport = |source| CollectError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(transport)?;

        decode_response(endpoint, status, &body)
    }
}

#[async_trait]
impl MarketData for DeribitClient {
    async fn list_instruments(
        &self,
        underlying: &str,
        expired: bool,
    ) -> Result<Vec<Instrument>, CollectError> {
        let query = instruments_query(underlying, expired);
        let instruments: Vec<Instrument> = self.get(GET_INSTRUMENTS, &query).await?;
        debug!(underlying, expired, count = instruments.len(), "listed instruments");
        Ok(instruments)
    }

    async fn fetch_trades(
        &self,
        instrument_name: &str,
        window: TimeWindow,
        max_count: u32,
    ) -> Result<TradePage, CollectError> {
        let query = trades_query(instrument_name, window, max_count);
        let page: TradePage = self.get(GET_TRADES, &query).await?;
        debug!(
            instrument = instrument_name,
            start_ms = window.start_ms(),
            trades = page.trades.len(),
            has_more = page.has_more,
            "fetched trades"
        );
        Ok(page)
    }
}

// ── Query construction ───────────────────────────────────────────────

fn instruments_query(underlying: &str, expired: bool) -> [(&'static str, String); 3] {
    [
        ("currency", underlying.to_string()),
        ("kind", "option".to_string()),
        ("expired", expired.to_string()),
    ]
}

fn trades_query(
    instrument_name: &str,
    window: TimeWindow,
    max_count: u32,
) -> [(&'static str, String); 5] {
    [
        ("instrument_name", instrument_name.to_string()),
        ("start_timestamp", window.start_ms().to_string()),
        ("end_timestamp", window.end_ms().to_string()),
        ("count", max_count.min(MAX_TRADES_PER_REQUEST).to_string()),
        ("include_old", "true".to_string()),
    ]
}

/// Turn a raw HTTP response into the envelope's `result`.
///
/// An `error` member wins over the status code since the exchange reports
/// JSON-RPC errors with a 400 and, occasionally, with a 200.
fn decode_response<T: DeserializeOwned>(
    endpoint: &str,
    status: StatusCode,
    body: &str,
) -> Result<T, CollectError> {
    let parsed = serde_json::from_str::<Envelope<T>>(body);

    if let Ok(Envelope {
        error: Some(err), ..
    }) = &parsed
    {
        return Err(CollectError::remote(
            endpoint,
            format!("HTTP {}: code {}: {}", status.as_u16(), err.code, err.message),
        ));
    }
    if !status.is_success() {
        return Err(CollectError::remote(
            endpoint,
            format!("HTTP {}: {}", status.as_u16(), snippet(body)),
        ));
    }

    match parsed {
        Ok(Envelope {
            result: Some(result),
            ..
        }) => Ok(result),
        Ok(_) => Err(CollectError::remote(endpoint, "response has no result")),
        Err(e) => Err(CollectError::remote(
            endpoint,
            format!("malformed response: {e}"),
        )),
    }
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
