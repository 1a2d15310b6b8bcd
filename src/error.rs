//! Error handling for stockbook
//!
//! Defines the typed errors raised by the cost-basis core and establishes a
//! unified Result type using anyhow for context chaining at the application
//! seams (store, price feed, importers, CLI).

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the lot tracker and the holdings projector.
///
/// None of these are retryable from inside the core: they describe a defect
/// in the inputs (or a missing quote) and propagate unchanged to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BasisError {
    #[error("invalid transaction: {reason}")]
    InvalidTransaction { reason: String },

    #[error(
        "{symbol}: insufficient lots for sale. Selling {requested} shares but only {available} held"
    )]
    InsufficientLots {
        symbol: String,
        requested: u64,
        available: u64,
    },

    #[error("no price available for {symbol}")]
    PriceUnavailable { symbol: String },

    #[error("invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
}

impl BasisError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        BasisError::InvalidTransaction {
            reason: reason.into(),
        }
    }
}

/// Application-level failures that need a stable message
#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("database error: {0}")]
    DbError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("pricing error: {0}")]
    PricingError(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for application operations
pub type Result<T> = anyhow::Result<T>;
