// src/quotes.rs
use crate::error::AppError;
use crate::models::Quote;
use async_trait::async_trait;
use log::{error, info};
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Resolves ticker symbols to a current name and price.
///
/// `Ok(None)` means the provider does not know the symbol; `Err` means the
/// provider could not be asked at all.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>, AppError>;
}

pub type SharedQuoteProvider = Arc<dyn QuoteProvider>;

/// Upper-cases and trims a user supplied symbol. Returns `None` for input
/// that cannot be a ticker, so it never reaches a request URL.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_ascii_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 16
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    valid.then_some(symbol)
}

#[derive(Deserialize)]
struct IexQuote {
    symbol: String,
    #[serde(rename = "companyName")]
    company_name: String,
    #[serde(rename = "latestPrice")]
    latest_price: Option<f64>,
}

impl IexQuote {
    /// A quote without a usable positive price is treated as unknown.
    fn into_quote(self) -> Option<Quote> {
        let price = self
            .latest_price
            .and_then(Decimal::from_f64)
            .map(|price| price.round_dp(4))
            .filter(|price| *price > Decimal::ZERO)?;
        Some(Quote {
            symbol: self.symbol.to_ascii_uppercase(),
            name: self.company_name,
            price,
        })
    }
}

/// Quote provider backed by an IEX Cloud style HTTP API:
/// `GET {base}/stock/{symbol}/quote?token={api_key}`.
pub struct HttpQuoteProvider {
    client: Client,
    base_url: String,
    api_key: Arc<String>,
}

impl HttpQuoteProvider {
    pub fn new(base_url: impl Into<String>, api_key: Arc<String>) -> Result<Self, AppError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(HttpQuoteProvider {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    async fn lookup(&self, symbol: &str) -> Result<Option<Quote>, AppError> {
        let symbol = match normalize_symbol(symbol) {
            Some(symbol) => symbol,
            None => return Ok(None),
        };
        let url = format!("{}/stock/{}/quote", self.base_url, symbol);
        info!("Looking up quote for {}.", symbol);

        let response = self
            .client
            .get(&url)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!("Quote request for {} failed: {}", symbol, e);
                AppError::from(e)
            })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                info!("Provider does not know symbol {}.", symbol);
                return Ok(None);
            }
            status => {
                error!("Failed to fetch quote for {}: HTTP {}", symbol, status);
                return Err(AppError::Upstream(format!("HTTP {}", status)));
            }
        }

        let quote = response.json::<IexQuote>().await.map_err(|e| {
            error!("Failed to parse quote for {}: {}", symbol, e);
            AppError::from(e)
        })?;

        Ok(quote.into_quote())
    }
}
