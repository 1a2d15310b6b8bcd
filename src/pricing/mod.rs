// Pricing module - live price feed and quote book

pub mod feed;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::db::PriceQuote;

/// Source of current unit prices.
///
/// `None` means the feed has no quote for the symbol; the caller decides
/// whether that is fatal.
pub trait PriceFeed {
    fn current_price(&self, symbol: &str) -> Option<Decimal>;
}

/// In-memory snapshot of quotes, keyed by symbol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceBook {
    prices: HashMap<String, Decimal>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, price: Decimal) {
        self.prices.insert(symbol.into(), price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Convert to stored quotes stamped with `quoted_at`
    pub fn to_quotes(&self, quoted_at: DateTime<Utc>, source: &str) -> Vec<PriceQuote> {
        let mut quotes: Vec<PriceQuote> = self
            .prices
            .iter()
            .map(|(symbol, price)| PriceQuote {
                symbol: symbol.clone(),
                price: *price,
                quoted_at,
                source: source.to_string(),
            })
            .collect();
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        quotes
    }
}

impl PriceFeed for PriceBook {
    fn current_price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }
}

impl PriceFeed for HashMap<String, Decimal> {
    fn current_price(&self, symbol: &str) -> Option<Decimal> {
        self.get(symbol).copied()
    }
}

impl FromIterator<PriceQuote> for PriceBook {
    fn from_iter<I: IntoIterator<Item = PriceQuote>>(iter: I) -> Self {
        let mut book = PriceBook::new();
        for quote in iter {
            book.insert(quote.symbol, quote.price);
        }
        book
    }
}

impl FromIterator<(String, Decimal)> for PriceBook {
    fn from_iter<I: IntoIterator<Item = (String, Decimal)>>(iter: I) -> Self {
        PriceBook {
            prices: iter.into_iter().collect(),
        }
    }
}
