//! Price oracle adapter: USD/HBAR quotes and the tinybar-per-cent rate derived from them

use async_trait::async_trait;
use hem_core::rate;
use num_bigint::BigUint;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PriceFeedConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("HBAR price unavailable")]
    Unavailable,
}

/// Source of the USD price of one HBAR
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// `Ok(None)` when the feed could not provide a quote
    async fn usd_per_hbar(&self) -> Result<Option<f64>, PriceError>;
}

/// Quote source returning a fixed value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedQuote(pub Option<f64>);

#[async_trait]
impl QuoteSource for FixedQuote {
    async fn usd_per_hbar(&self) -> Result<Option<f64>, PriceError> {
        Ok(self.0)
    }
}

/// Read `data.<asset_id>.quote.USD.price` from a quotes/latest response
pub fn extract_usd_price(body: &Value, asset_id: u64) -> Option<f64> {
    let mut entry = body.get("data")?.get(asset_id.to_string())?;
    // Symbol lookups return a list per key
    if let Some(first) = entry.as_array().and_then(|list| list.first()) {
        entry = first;
    }

    let price = entry.get("quote")?.get("USD")?.get("price")?;
    match price {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// CoinMarketCap quotes client
#[derive(Debug, Clone)]
pub struct CoinMarketCapClient {
    http: reqwest::Client,
    config: PriceFeedConfig,
}

impl CoinMarketCapClient {
    pub fn new(config: PriceFeedConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl QuoteSource for CoinMarketCapClient {
    async fn usd_per_hbar(&self) -> Result<Option<f64>, PriceError> {
        let response = self
            .http
            .get(&self.config.url)
            .header("X-CMC_PRO_API_KEY", &self.config.api_key)
            .query(&[("id", self.config.asset_id)])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("Price feed request failed: {}", e);
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            warn!("Price feed returned status {}", response.status());
            return Ok(None);
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Price feed response is not JSON: {}", e);
                return Ok(None);
            }
        };

        let price = extract_usd_price(&body, self.config.asset_id);
        if price.is_none() {
            warn!(
                "Price feed response has no USD price for asset {}",
                self.config.asset_id
            );
        }
        Ok(price)
    }
}

/// Converts live quotes into the escrow contract's exchange rate
pub struct PriceOracle<Q> {
    source: Q,
}

impl<Q: QuoteSource> PriceOracle<Q> {
    pub fn new(source: Q) -> Self {
        Self { source }
    }

    pub async fn get_hbar_price(&self) -> Result<Option<f64>, PriceError> {
        self.source.usd_per_hbar().await
    }

    /// Current tinybar-per-cent rate; a missing or degenerate quote is an error
    pub async fn get_tinybar_per_cent(&self) -> Result<BigUint, PriceError> {
        let usd_per_hbar = self.source.usd_per_hbar().await?;
        let rate = rate::tinybar_per_cent(usd_per_hbar).map_err(|_| PriceError::Unavailable)?;
        debug!(?usd_per_hbar, %rate, "Derived tinybar per cent");
        Ok(rate)
    }
}
