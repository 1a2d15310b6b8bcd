use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::basis::{self, compute_cost_basis};
use crate::db::Transaction;
use crate::error::BasisError;
use crate::pricing::PriceFeed;

/// A currently held instrument, priced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub instrument_symbol: String,
    pub display_name: String,
    pub shares_held: u64,
    pub average_unit_cost: Decimal,
    pub current_unit_price: Decimal,
    pub unrealized_profit_percent: Decimal,
    /// Cost of the open lots behind this holding
    pub cost_basis: Decimal,
}

impl Holding {
    pub fn current_value(&self) -> Decimal {
        Decimal::from(self.shares_held) * self.current_unit_price
    }

    pub fn unrealized_profit(&self) -> Decimal {
        self.current_value() - self.cost_basis
    }
}

/// Portfolio-level aggregates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioTotals {
    pub invested: Decimal,
    pub current_value: Decimal,
}

impl PortfolioTotals {
    pub fn profit(&self) -> Decimal {
        self.current_value - self.invested
    }

    /// Profit relative to the invested amount; zero when nothing is invested
    pub fn profit_percent(&self) -> Decimal {
        if self.invested.is_zero() {
            return Decimal::ZERO;
        }
        self.profit() / self.invested * Decimal::from(100)
    }
}

/// Holdings plus totals, as shown on the portfolio view
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub holdings: Vec<Holding>,
    pub totals: PortfolioTotals,
}

/// Settled instruments in order of first transaction
fn transacted_symbols(transactions: &[Transaction]) -> Vec<&str> {
    let mut settled: Vec<&Transaction> = transactions.iter().filter(|tx| tx.is_settled()).collect();
    settled.sort_by_key(|tx| tx.executed_at);

    let mut seen = HashSet::new();
    settled
        .into_iter()
        .map(|tx| tx.instrument_symbol.as_str())
        .filter(|symbol| seen.insert(*symbol))
        .collect()
}

/// Project the user's open positions against current prices.
///
/// Fully divested instruments are omitted. A held instrument without a quote
/// fails the whole projection with `PriceUnavailable`.
pub fn compute_holdings<F>(
    transactions: &[Transaction],
    names: &HashMap<String, String>,
    feed: &F,
) -> Result<Vec<Holding>, BasisError>
where
    F: PriceFeed + ?Sized,
{
    let tracker = basis::replay(transactions, None, None)?;
    let mut holdings = Vec::new();

    for symbol in transacted_symbols(transactions) {
        let net = basis::net_shares(transactions, symbol);
        if net == 0 {
            debug!("{}: fully divested, skipping", symbol);
            continue;
        }

        let shares_held = tracker.shares_held(symbol);
        debug_assert_eq!(i128::from(shares_held), net);

        let cost_basis = tracker.cost_basis(Some(symbol));
        let average_unit_cost = cost_basis / Decimal::from(shares_held);
        if average_unit_cost.is_zero() {
            return Err(BasisError::invalid(format!(
                "{}: zero average cost",
                symbol
            )));
        }

        let current_unit_price = feed.current_price(symbol).ok_or_else(|| {
            BasisError::PriceUnavailable {
                symbol: symbol.to_string(),
            }
        })?;

        let unrealized_profit_percent =
            (current_unit_price - average_unit_cost) / average_unit_cost * Decimal::from(100);

        holdings.push(Holding {
            instrument_symbol: symbol.to_string(),
            display_name: names
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| symbol.to_string()),
            shares_held,
            average_unit_cost,
            current_unit_price,
            unrealized_profit_percent,
            cost_basis,
        });
    }

    Ok(holdings)
}

fn totals_for(holdings: &[Holding], invested: Decimal) -> PortfolioTotals {
    PortfolioTotals {
        invested,
        current_value: holdings.iter().map(Holding::current_value).sum(),
    }
}

/// Total invested (open cost basis) and total current value
pub fn compute_portfolio_totals<F>(
    transactions: &[Transaction],
    feed: &F,
) -> Result<PortfolioTotals, BasisError>
where
    F: PriceFeed + ?Sized,
{
    let holdings = compute_holdings(transactions, &HashMap::new(), feed)?;
    let invested = compute_cost_basis(transactions, None, None)?;
    Ok(totals_for(&holdings, invested))
}

/// Holdings and totals in one pass over the history
pub fn calculate_portfolio<F>(
    transactions: &[Transaction],
    names: &HashMap<String, String>,
    feed: &F,
) -> Result<PortfolioReport, BasisError>
where
    F: PriceFeed + ?Sized,
{
    let holdings = compute_holdings(transactions, names, feed)?;
    let invested = compute_cost_basis(transactions, None, None)?;
    let totals = totals_for(&holdings, invested);

    Ok(PortfolioReport { holdings, totals })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{PaymentStatus, TransactionType};
    use crate::pricing::PriceBook;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn make_tx(
        tx_type: TransactionType,
        symbol: &str,
        shares: u64,
        amount: Decimal,
        day: i64,
    ) -> Transaction {
        Transaction {
            id: None,
            user_address: "0.0.777".to_string(),
            transaction_type: tx_type,
            instrument_symbol: symbol.to_string(),
            share_count: shares,
            gross_amount: amount,
            executed_at: Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap() + Duration::days(day),
            status: PaymentStatus::Paid,
        }
    }

    fn buy(symbol: &str, shares: u64, amount: Decimal, day: i64) -> Transaction {
        make_tx(TransactionType::Buy, symbol, shares, amount, day)
    }

    fn sell(symbol: &str, shares: u64, day: i64) -> Transaction {
        make_tx(TransactionType::Sell, symbol, shares, dec!(1), day)
    }

    fn book(entries: &[(&str, Decimal)]) -> PriceBook {
        entries
            .iter()
            .map(|(symbol, price)| (symbol.to_string(), *price))
            .collect()
    }

    #[test]
    fn test_holding_fields() {
        let txs = vec![
            buy("SCOM", 10, dec!(100), 0), // 10 each
            buy("SCOM", 10, dec!(200), 1), // 20 each
            sell("SCOM", 10, 2),
        ];
        let mut names = HashMap::new();
        names.insert("SCOM".to_string(), "Safaricom PLC".to_string());

        let holdings = compute_holdings(&txs, &names, &book(&[("SCOM", dec!(25))])).unwrap();
        assert_eq!(holdings.len(), 1);

        let h = &holdings[0];
        assert_eq!(h.instrument_symbol, "SCOM");
        assert_eq!(h.display_name, "Safaricom PLC");
        assert_eq!(h.shares_held, 10);
        assert_eq!(h.average_unit_cost, dec!(20));
        assert_eq!(h.current_unit_price, dec!(25));
        assert_eq!(h.unrealized_profit_percent, dec!(25));
        assert_eq!(h.cost_basis, dec!(200));
        assert_eq!(h.current_value(), dec!(250));
        assert_eq!(h.unrealized_profit(), dec!(50));
    }

    #[test]
    fn test_loss_is_negative_percent() {
        let txs = vec![buy("EQTY", 4, dec!(200), 0)];
        let holdings =
            compute_holdings(&txs, &HashMap::new(), &book(&[("EQTY", dec!(40))])).unwrap();

        assert_eq!(holdings[0].unrealized_profit_percent, dec!(-20));
        // Display name falls back to the symbol
        assert_eq!(holdings[0].display_name, "EQTY");
    }

    #[test]
    fn test_divested_instrument_is_omitted_and_not_priced() {
        let txs = vec![
            buy("SCOM", 10, dec!(100), 0),
            sell("SCOM", 10, 1),
            buy("EQTY", 2, dec!(90), 2),
        ];

        // No SCOM quote: must not matter since nothing is held
        let holdings =
            compute_holdings(&txs, &HashMap::new(), &book(&[("EQTY", dec!(50))])).unwrap();
        let symbols: Vec<_> = holdings.iter().map(|h| h.instrument_symbol.as_str()).collect();
        assert_eq!(symbols, vec!["EQTY"]);
    }

    #[test]
    fn test_missing_price_for_held_instrument_fails() {
        let txs = vec![buy("SCOM", 10, dec!(100), 0), buy("KCB", 3, dec!(120), 1)];

        let err = compute_holdings(&txs, &HashMap::new(), &book(&[("SCOM", dec!(11))])).unwrap_err();
        assert_eq!(
            err,
            BasisError::PriceUnavailable {
                symbol: "KCB".to_string()
            }
        );
        assert!(compute_portfolio_totals(&txs, &book(&[("SCOM", dec!(11))])).is_err());
    }

    #[test]
    fn test_log_inconsistency_propagates() {
        let txs = vec![buy("SCOM", 5, dec!(50), 0), sell("SCOM", 6, 1)];
        let result = compute_holdings(&txs, &HashMap::new(), &book(&[("SCOM", dec!(10))]));
        assert!(matches!(result, Err(BasisError::InsufficientLots { .. })));
    }

    #[test]
    fn test_holdings_follow_first_transaction_order() {
        let txs = vec![
            buy("KCB", 1, dec!(40), 2),
            buy("SCOM", 1, dec!(20), 0),
            buy("EQTY", 1, dec!(45), 1),
        ];
        let prices = book(&[("KCB", dec!(41)), ("SCOM", dec!(21)), ("EQTY", dec!(46))]);

        let holdings = compute_holdings(&txs, &HashMap::new(), &prices).unwrap();
        let symbols: Vec<_> = holdings.iter().map(|h| h.instrument_symbol.as_str()).collect();
        assert_eq!(symbols, vec!["SCOM", "EQTY", "KCB"]);
    }

    #[test]
    fn test_totals_match_holdings_exactly() {
        let txs = vec![
            buy("SCOM", 3, dec!(100), 0), // 33.33.. each
            buy("SCOM", 7, dec!(250), 1),
            buy("EQTY", 9, dec!(401.13), 2),
            sell("SCOM", 4, 3),
            buy("KCB", 11, dec!(397.7), 4),
            sell("EQTY", 2, 5),
        ];
        let prices = book(&[
            ("SCOM", dec!(28.37)),
            ("EQTY", dec!(44.91)),
            ("KCB", dec!(36.05)),
        ]);

        let report = calculate_portfolio(&txs, &HashMap::new(), &prices).unwrap();
        let summed: Decimal = report
            .holdings
            .iter()
            .map(|h| Decimal::from(h.shares_held) * h.current_unit_price)
            .sum();
        assert_eq!(summed, report.totals.current_value);

        let totals = compute_portfolio_totals(&txs, &prices).unwrap();
        assert_eq!(totals, report.totals);
        assert_eq!(totals.invested, compute_cost_basis(&txs, None, None).unwrap());
    }

    #[test]
    fn test_invested_equals_sum_of_per_instrument_basis() {
        let txs = vec![
            buy("SCOM", 10, dec!(100), 0),
            buy("EQTY", 4, dec!(180), 1),
            sell("SCOM", 3, 2),
        ];
        let prices = book(&[("SCOM", dec!(12)), ("EQTY", dec!(50))]);

        let totals = compute_portfolio_totals(&txs, &prices).unwrap();
        let per_instrument = compute_cost_basis(&txs, Some("SCOM"), None).unwrap()
            + compute_cost_basis(&txs, Some("EQTY"), None).unwrap();
        assert_eq!(totals.invested, per_instrument);
        assert_eq!(totals.invested, dec!(250));
        assert_eq!(totals.current_value, dec!(284));
        assert_eq!(totals.profit(), dec!(34));
        assert_eq!(totals.profit_percent(), dec!(13.6));
    }

    #[test]
    fn test_empty_history_has_zero_totals() {
        let totals = compute_portfolio_totals(&[], &PriceBook::new()).unwrap();
        assert_eq!(totals.invested, Decimal::ZERO);
        assert_eq!(totals.current_value, Decimal::ZERO);
        assert_eq!(totals.profit_percent(), Decimal::ZERO);
    }
}
