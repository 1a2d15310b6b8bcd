//! FIFO lot tracking and cost basis
//!
//! Replays a user's settled buy/sell history into per-instrument queues of
//! open lots. Buys append a lot; sells consume the oldest lots first. The
//! cost basis ("initial investment") is the cost of whatever is still open.

mod lot;

pub use lot::Lot;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};

use crate::db::{Transaction, TransactionType};
use crate::error::BasisError;

/// Open lots per instrument, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LotTracker {
    lots: BTreeMap<String, VecDeque<Lot>>,
}

impl LotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one transaction. Settlement status is the caller's concern.
    pub fn apply(&mut self, tx: &Transaction) -> Result<(), BasisError> {
        match tx.transaction_type {
            TransactionType::Buy => self.buy(
                &tx.instrument_symbol,
                tx.share_count,
                tx.gross_amount,
                tx.executed_at,
            ),
            TransactionType::Sell => self.sell(&tx.instrument_symbol, tx.share_count).map(|_| ()),
        }
    }

    /// Open a new lot at `gross_amount / shares` per share
    pub fn buy(
        &mut self,
        symbol: &str,
        shares: u64,
        gross_amount: Decimal,
        acquired_at: DateTime<Utc>,
    ) -> Result<(), BasisError> {
        if shares == 0 {
            return Err(BasisError::invalid(format!(
                "{}: buy with zero shares",
                symbol
            )));
        }
        if gross_amount <= Decimal::ZERO {
            return Err(BasisError::invalid(format!(
                "{}: buy amount must be positive, got {}",
                symbol, gross_amount
            )));
        }

        let unit_cost = gross_amount
            .checked_div(Decimal::from(shares))
            .ok_or_else(|| {
                BasisError::invalid(format!("{}: unit cost overflow", symbol))
            })?;

        self.lots
            .entry(symbol.to_string())
            .or_default()
            .push_back(Lot {
                instrument_symbol: symbol.to_string(),
                remaining_shares: shares,
                unit_cost,
                acquired_at,
            });

        Ok(())
    }

    /// Consume `shares` from the oldest lots of `symbol`.
    ///
    /// Returns the FIFO cost of the shares sold. Fails without touching any
    /// lot when fewer than `shares` are held.
    pub fn sell(&mut self, symbol: &str, shares: u64) -> Result<Decimal, BasisError> {
        if shares == 0 {
            return Err(BasisError::invalid(format!(
                "{}: sell with zero shares",
                symbol
            )));
        }

        let available = self.shares_held(symbol);
        if available == 0 {
            warn!("{}: sell of {} shares with no open lots", symbol, shares);
        } else if shares > available {
            warn!(
                "{}: sell of {} shares exceeds the {} held in open lots",
                symbol, shares, available
            );
        }

        let insufficient = || BasisError::InsufficientLots {
            symbol: symbol.to_string(),
            requested: shares,
            available,
        };

        if shares > available {
            return Err(insufficient());
        }

        let queue = self.lots.get_mut(symbol).ok_or_else(insufficient)?;
        let mut outstanding = shares;
        let mut sold_cost = Decimal::ZERO;

        while outstanding > 0 {
            let oldest = queue.front_mut().ok_or_else(insufficient)?;

            if oldest.remaining_shares > outstanding {
                oldest.remaining_shares -= outstanding;
                sold_cost += oldest.unit_cost * Decimal::from(outstanding);
                debug!(
                    "{}: took {} from lot of {}, {} left",
                    symbol, outstanding, oldest.acquired_at, oldest.remaining_shares
                );
                outstanding = 0;
            } else {
                outstanding -= oldest.remaining_shares;
                sold_cost += oldest.cost();
                debug!(
                    "{}: closed lot of {} ({} shares)",
                    symbol, oldest.acquired_at, oldest.remaining_shares
                );
                queue.pop_front();
            }
        }

        if queue.is_empty() {
            self.lots.remove(symbol);
        }

        Ok(sold_cost)
    }

    /// Open lots of one instrument, oldest first
    pub fn open_lots<'a>(&'a self, symbol: &str) -> impl Iterator<Item = &'a Lot> + 'a {
        self.lots.get(symbol).into_iter().flatten()
    }

    /// Every open lot, grouped by instrument symbol
    pub fn all_lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.values().flatten()
    }

    /// Instruments with at least one open lot
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.lots.keys().map(String::as_str)
    }

    pub fn shares_held(&self, symbol: &str) -> u64 {
        self.open_lots(symbol).map(|lot| lot.remaining_shares).sum()
    }

    /// Cost of the open lots of one instrument, or of all instruments
    pub fn cost_basis(&self, instrument_filter: Option<&str>) -> Decimal {
        match instrument_filter {
            Some(symbol) => self.open_lots(symbol).map(Lot::cost).sum(),
            None => self.all_lots().map(Lot::cost).sum(),
        }
    }
}

/// Replay settled transactions into a tracker.
///
/// Transactions are sorted by execution time (stable, so same-instant entries
/// keep their log order). With `as_of`, processing stops at the first
/// transaction executed after it. With `instrument_filter`, only that
/// instrument is replayed.
pub fn replay(
    transactions: &[Transaction],
    instrument_filter: Option<&str>,
    as_of: Option<DateTime<Utc>>,
) -> Result<LotTracker, BasisError> {
    let mut settled: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| tx.is_settled())
        .filter(|tx| instrument_filter.map_or(true, |symbol| tx.instrument_symbol == symbol))
        .collect();
    settled.sort_by_key(|tx| tx.executed_at);

    let mut tracker = LotTracker::new();
    for tx in settled {
        if as_of.is_some_and(|cutoff| tx.executed_at > cutoff) {
            break;
        }
        tracker.apply(tx)?;
    }

    Ok(tracker)
}

/// Total cost of the shares still held, under FIFO consumption
pub fn compute_cost_basis(
    transactions: &[Transaction],
    instrument_filter: Option<&str>,
    as_of: Option<DateTime<Utc>>,
) -> Result<Decimal, BasisError> {
    let tracker = replay(transactions, instrument_filter, as_of)?;
    Ok(tracker.cost_basis(instrument_filter))
}

/// Settled buys minus settled sells for one instrument
pub fn net_shares(transactions: &[Transaction], symbol: &str) -> i128 {
    transactions
        .iter()
        .filter(|tx| tx.is_settled() && tx.instrument_symbol == symbol)
        .map(|tx| match tx.transaction_type {
            TransactionType::Buy => i128::from(tx.share_count),
            TransactionType::Sell => -i128::from(tx.share_count),
        })
        .sum()
}
