use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Transaction type (buy or sell)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
        }
    }
}

impl FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "B" => Ok(TransactionType::Buy),
            "SELL" | "S" => Ok(TransactionType::Sell),
            _ => Err(()),
        }
    }
}

/// Payment state of a transaction. Only `Paid` transactions are settled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

impl FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" | "SETTLED" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            _ => Err(()),
        }
    }
}

/// Instrument (listed stock) with its display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
}

/// Transaction (buy or sell of an instrument by a user)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: Option<i64>,
    pub user_address: String,
    pub transaction_type: TransactionType,
    pub instrument_symbol: String,
    pub share_count: u64,
    /// Total paid for a buy; ignored by cost-basis accounting for a sell
    pub gross_amount: Decimal,
    pub executed_at: DateTime<Utc>,
    pub status: PaymentStatus,
}

impl Transaction {
    pub fn is_settled(&self) -> bool {
        self.status.is_settled()
    }
}

/// Price quote for an instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: Decimal,
    pub quoted_at: DateTime<Utc>,
    pub source: String, // 'FEED', 'MANUAL'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_parsing() {
        assert_eq!("buy".parse::<TransactionType>(), Ok(TransactionType::Buy));
        assert_eq!(" SELL ".parse::<TransactionType>(), Ok(TransactionType::Sell));
        assert_eq!("s".parse::<TransactionType>(), Ok(TransactionType::Sell));
        assert!("transfer".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_payment_status_round_trip_names() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>(), Ok(status));
        }
        assert_eq!("settled".parse::<PaymentStatus>(), Ok(PaymentStatus::Paid));
    }

    #[test]
    fn test_only_paid_is_settled() {
        assert!(PaymentStatus::Paid.is_settled());
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(!PaymentStatus::Failed.is_settled());
    }
}
