//! Binance public REST endpoints (cold path)
//!
//! Snapshot data that complements the streams: 24h tickers, open interest,
//! funding, liquidations and klines. One attempt per call, bounded by the
//! configured request timeout.

use crate::core::{MarketType, Symbol};
use crate::infrastructure::config::RestConfig;
use crate::log_rest;
use serde_json::Value;
use std::future::Future;
use tracing::Level;
use url::Url;

/// A REST call that failed or returned a non-success status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{endpoint}: {reason}")]
pub struct UpstreamRequestError {
    pub endpoint: String,
    pub reason: String,
}

impl UpstreamRequestError {
    fn new(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

type Result<T> = std::result::Result<T, UpstreamRequestError>;

/// Source of market data snapshots
pub trait MarketDataSource: Send + Sync {
    /// 24h rolling ticker
    fn fetch_ticker(&self, symbol: &Symbol, market: MarketType) -> impl Future<Output = Result<Value>> + Send;

    /// Futures open interest
    fn fetch_open_interest(&self, symbol: &Symbol) -> impl Future<Output = Result<Value>> + Send;

    /// Futures mark price and last funding rate
    fn fetch_funding_rate(&self, symbol: &Symbol) -> impl Future<Output = Result<Value>> + Send;

    /// Recent futures liquidation orders
    fn fetch_liquidations(&self, symbol: &Symbol) -> impl Future<Output = Result<Value>> + Send;

    /// Candles for `interval` (e.g. "1m"), at most `limit`
    fn fetch_klines(
        &self,
        symbol: &Symbol,
        market: MarketType,
        interval: &str,
        limit: u16,
    ) -> impl Future<Output = Result<Value>> + Send;
}

/// reqwest-backed client for Binance spot and USDⓈ-M futures
pub struct RestClient {
    client: reqwest::Client,
    spot_base_url: String,
    futures_base_url: String,
}

impl RestClient {
    pub fn new(config: &RestConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.timeout())
                .user_agent(concat!("market-stream/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            spot_base_url: config.spot_base_url.clone(),
            futures_base_url: config.futures_base_url.clone(),
        }
    }

    /// Build the full URL for `path` on the market's host
    pub fn endpoint(&self, market: MarketType, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let base = match market {
            MarketType::Spot => &self.spot_base_url,
            MarketType::Futures => &self.futures_base_url,
        };
        let mut url = Url::parse(base)
            .and_then(|base| base.join(path))
            .map_err(|e| UpstreamRequestError::new(path, format!("invalid url: {}", e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        let endpoint = url.path().to_string();
        log_rest!(Level::DEBUG, "GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            log_rest!(Level::WARN, endpoint = %endpoint, "request failed: {}", e);
            UpstreamRequestError::new(&endpoint, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log_rest!(Level::WARN, endpoint = %endpoint, status = status.as_u16(), "upstream rejected request");
            return Err(UpstreamRequestError::new(
                endpoint,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamRequestError::new(endpoint, format!("invalid body: {}", e)))
    }
}

impl MarketDataSource for RestClient {
    async fn fetch_ticker(&self, symbol: &Symbol, market: MarketType) -> Result<Value> {
        let path = match market {
            MarketType::Spot => "/api/v3/ticker/24hr",
            MarketType::Futures => "/fapi/v1/ticker/24hr",
        };
        let url = self.endpoint(market, path, &[("symbol", symbol.as_str())])?;
        self.get_json(url).await
    }

    async fn fetch_open_interest(&self, symbol: &Symbol) -> Result<Value> {
        let url = self.endpoint(MarketType::Futures, "/fapi/v1/openInterest", &[("symbol", symbol.as_str())])?;
        self.get_json(url).await
    }

    async fn fetch_funding_rate(&self, symbol: &Symbol) -> Result<Value> {
        let url = self.endpoint(MarketType::Futures, "/fapi/v1/premiumIndex", &[("symbol", symbol.as_str())])?;
        self.get_json(url).await
    }

    async fn fetch_liquidations(&self, symbol: &Symbol) -> Result<Value> {
        let url = self.endpoint(MarketType::Futures, "/fapi/v1/allForceOrders", &[("symbol", symbol.as_str())])?;
        self.get_json(url).await
    }

    async fn fetch_klines(&self, symbol: &Symbol, market: MarketType, interval: &str, limit: u16) -> Result<Value> {
        let path = match market {
            MarketType::Spot => "/api/v3/klines",
            MarketType::Futures => "/fapi/v1/klines",
        };
        let limit = limit.to_string();
        let url = self.endpoint(
            market,
            path,
            &[("symbol", symbol.as_str()), ("interval", interval), ("limit", &limit)],
        )?;
        self.get_json(url).await
    }
}
