use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A batch of shares acquired by one buy, tracked until fully sold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lot {
    pub instrument_symbol: String,
    pub remaining_shares: u64,
    /// Fixed at acquisition: gross amount / share count
    pub unit_cost: Decimal,
    pub acquired_at: DateTime<Utc>,
}

impl Lot {
    /// Cost of the shares still open in this lot
    pub fn cost(&self) -> Decimal {
        self.unit_cost * Decimal::from(self.remaining_shares)
    }
}
