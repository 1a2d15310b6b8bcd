use anyhow::{Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::PriceBook;
use crate::error::PortfolioError;

/// One entry of the stock price endpoint
#[derive(Debug, Deserialize)]
struct StockPrice {
    symbol: String,
    price: Decimal,
}

/// The endpoint serves either a bare list or `{"stocks": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceListResponse {
    List(Vec<StockPrice>),
    Wrapped { stocks: Vec<StockPrice> },
}

/// Parse a price list body into a quote book.
///
/// Entries with a blank symbol or a non-positive price are dropped; a later
/// entry for the same symbol overrides an earlier one.
pub fn parse_price_list(body: &str) -> Result<PriceBook> {
    let response: PriceListResponse =
        serde_json::from_str(body).context("Failed to parse price feed response")?;

    let entries = match response {
        PriceListResponse::List(entries) => entries,
        PriceListResponse::Wrapped { stocks } => stocks,
    };

    let mut book = PriceBook::new();
    for entry in entries {
        let symbol = entry.symbol.trim();
        if symbol.is_empty() || entry.price <= Decimal::ZERO {
            warn!("Ignoring price feed entry {:?} = {}", entry.symbol, entry.price);
            continue;
        }
        book.insert(symbol.to_uppercase(), entry.price);
    }

    debug!("Parsed {} quotes from price feed", book.len());
    Ok(book)
}

/// Fetch all current prices from the configured endpoint
pub async fn fetch_price_list(url: &str, timeout: Duration) -> Result<PriceBook> {
    info!("Fetching current prices from {}", url);

    let client = Client::builder()
        .user_agent("stockbook/0.1")
        .timeout(timeout)
        .build()?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send request to price feed")?;

    if !response.status().is_success() {
        return Err(PortfolioError::PricingError(format!(
            "price feed returned error status: {}",
            response.status()
        ))
        .into());
    }

    let body = response
        .text()
        .await
        .context("Failed to read price feed response")?;

    parse_price_list(&body)
}
