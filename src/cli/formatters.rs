//! Output formatting module for CLI display
//!
//! Keeps presentation (tables, colors, JSON shapes) apart from the
//! calculations in the library.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use stockbook::basis::Lot;
use stockbook::db::{Instrument, PriceQuote, Transaction};
use stockbook::reports::{HistoryPoint, PortfolioReport};
use stockbook::utils::{format_currency, format_percent};
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn colored_amount(value: Decimal, text: String) -> String {
    if value >= Decimal::ZERO {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

/// Format a portfolio report for JSON output
pub fn format_portfolio_json(report: &PortfolioReport) -> String {
    #[derive(Serialize)]
    struct JsonHolding<'a> {
        symbol: &'a str,
        name: &'a str,
        shares: u64,
        average_cost: String,
        current_price: String,
        cost_basis: String,
        current_value: String,
        unrealized_profit: String,
        unrealized_profit_pct: String,
    }

    #[derive(Serialize)]
    struct JsonPortfolio<'a> {
        holdings: Vec<JsonHolding<'a>>,
        invested: String,
        current_value: String,
        profit: String,
        profit_pct: String,
    }

    let holdings = report
        .holdings
        .iter()
        .map(|h| JsonHolding {
            symbol: &h.instrument_symbol,
            name: &h.display_name,
            shares: h.shares_held,
            average_cost: h.average_unit_cost.round_dp(6).to_string(),
            current_price: h.current_unit_price.to_string(),
            cost_basis: h.cost_basis.round_dp(6).to_string(),
            current_value: h.current_value().to_string(),
            unrealized_profit: h.unrealized_profit().round_dp(6).to_string(),
            unrealized_profit_pct: h.unrealized_profit_percent.round_dp(4).to_string(),
        })
        .collect();

    to_json(&JsonPortfolio {
        holdings,
        invested: report.totals.invested.round_dp(6).to_string(),
        current_value: report.totals.current_value.to_string(),
        profit: report.totals.profit().round_dp(6).to_string(),
        profit_pct: report.totals.profit_percent().round_dp(4).to_string(),
    })
}

/// Format a portfolio report for terminal table output
pub fn format_portfolio_table(report: &PortfolioReport, currency: &str) -> String {
    let mut output = format!("\n{} Portfolio\n\n", "📊".cyan().bold());

    #[derive(Tabled)]
    struct HoldingRow {
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Shares")]
        shares: u64,
        #[tabled(rename = "Avg Cost")]
        avg_cost: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Return %")]
        return_pct: String,
    }

    let rows: Vec<HoldingRow> = report
        .holdings
        .iter()
        .map(|h| HoldingRow {
            symbol: h.instrument_symbol.clone(),
            name: h.display_name.clone(),
            shares: h.shares_held,
            avg_cost: format_currency(h.average_unit_cost, currency),
            price: format_currency(h.current_unit_price, currency),
            value: format_currency(h.current_value(), currency),
            return_pct: colored_amount(
                h.unrealized_profit_percent,
                format_percent(h.unrealized_profit_percent),
            ),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    // Right-align numeric columns
    table.modify(Columns::new(2..), Alignment::right());
    output.push_str(&table.to_string());

    let totals = &report.totals;
    output.push_str(&format!("\n\n{} Summary", "━".repeat(60).bright_black()));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Invested:".bold(),
        format_currency(totals.invested, currency)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Current Value:".bold(),
        format_currency(totals.current_value, currency)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Profit/Loss:".bold(),
        colored_amount(totals.profit(), format_currency(totals.profit(), currency))
    ));
    output.push_str(&format!(
        "\n{:<20} {}\n",
        "Return:".bold(),
        colored_amount(totals.profit(), format_percent(totals.profit_percent()))
    ));

    output
}

/// Format empty portfolio message
pub fn format_empty_portfolio() -> String {
    format!(
        "\n{} No positions found. Record a purchase with `stockbook transactions add`.\n",
        "ℹ".blue().bold()
    )
}

/// Cost basis figure, optionally for one instrument and point in time
pub fn format_basis(
    invested: Decimal,
    symbol: Option<&str>,
    as_of: Option<&str>,
    currency: &str,
) -> String {
    let scope = symbol.unwrap_or("all instruments");
    let when = as_of
        .map(|d| format!(" as of {}", d))
        .unwrap_or_default();
    format!(
        "{} Invested in {}{}: {}",
        "💰".bold(),
        scope.cyan(),
        when,
        format_currency(invested, currency).bold()
    )
}

pub fn format_basis_json(invested: Decimal, symbol: Option<&str>, as_of: Option<&str>) -> String {
    #[derive(Serialize)]
    struct JsonBasis<'a> {
        symbol: Option<&'a str>,
        as_of: Option<&'a str>,
        invested: String,
    }

    to_json(&JsonBasis {
        symbol,
        as_of,
        invested: invested.round_dp(6).to_string(),
    })
}

#[derive(Tabled)]
struct LotRow {
    #[tabled(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Acquired")]
    acquired: String,
    #[tabled(rename = "Shares")]
    shares: u64,
    #[tabled(rename = "Unit Cost")]
    unit_cost: String,
    #[tabled(rename = "Cost")]
    cost: String,
}

/// Open lots, oldest first within each instrument
pub fn format_lots_table(lots: &[&Lot], currency: &str) -> String {
    if lots.is_empty() {
        return format!("{} No open lots.", "ℹ".blue().bold());
    }

    let rows: Vec<LotRow> = lots
        .iter()
        .map(|lot| LotRow {
            symbol: lot.instrument_symbol.clone(),
            acquired: lot.acquired_at.format("%Y-%m-%d %H:%M").to_string(),
            shares: lot.remaining_shares,
            unit_cost: format_currency(lot.unit_cost, currency),
            cost: format_currency(lot.cost(), currency),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..), Alignment::right());
    table.to_string()
}

pub fn format_lots_json(lots: &[&Lot]) -> String {
    to_json(&lots)
}

/// Invested capital series
pub fn format_history_table(points: &[HistoryPoint], currency: &str) -> String {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Invested")]
        invested: String,
    }

    let rows: Vec<HistoryRow> = points
        .iter()
        .map(|p| HistoryRow {
            date: p.date.format("%Y-%m-%d").to_string(),
            invested: format_currency(p.invested, currency),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

pub fn format_history_json(points: &[HistoryPoint]) -> String {
    to_json(&points)
}

/// Transaction log of one user
pub fn format_transactions_table(transactions: &[Transaction], currency: &str) -> String {
    if transactions.is_empty() {
        return format!("{} No transactions recorded.", "ℹ".blue().bold());
    }

    #[derive(Tabled)]
    struct TransactionRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Type")]
        tx_type: String,
        #[tabled(rename = "Shares")]
        shares: u64,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<TransactionRow> = transactions
        .iter()
        .map(|tx| TransactionRow {
            id: tx.id.map(|id| id.to_string()).unwrap_or_default(),
            date: tx.executed_at.format("%Y-%m-%d %H:%M").to_string(),
            symbol: tx.instrument_symbol.clone(),
            tx_type: tx.transaction_type.as_str().to_string(),
            shares: tx.share_count,
            amount: format_currency(tx.gross_amount, currency),
            status: tx.status.as_str().to_string(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(4..6), Alignment::right());
    table.to_string()
}

pub fn format_transactions_json(transactions: &[Transaction]) -> String {
    to_json(&transactions)
}

/// Latest stored quotes
pub fn format_quotes_table(quotes: &[PriceQuote], currency: &str) -> String {
    if quotes.is_empty() {
        return format!("{} No prices stored.", "ℹ".blue().bold());
    }

    #[derive(Tabled)]
    struct QuoteRow {
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Quoted")]
        quoted_at: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    let rows: Vec<QuoteRow> = quotes
        .iter()
        .map(|q| QuoteRow {
            symbol: q.symbol.clone(),
            price: format_currency(q.price, currency),
            quoted_at: q.quoted_at.format("%Y-%m-%d %H:%M").to_string(),
            source: q.source.clone(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..2), Alignment::right());
    table.to_string()
}

pub fn format_quotes_json(quotes: &[PriceQuote]) -> String {
    to_json(&quotes)
}

pub fn format_instruments_table(instruments: &[Instrument]) -> String {
    if instruments.is_empty() {
        return format!("{} No instruments registered.", "ℹ".blue().bold());
    }

    #[derive(Tabled)]
    struct InstrumentRow {
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Name")]
        name: String,
    }

    let rows: Vec<InstrumentRow> = instruments
        .iter()
        .map(|i| InstrumentRow {
            symbol: i.symbol.clone(),
            name: i.name.clone(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.to_string()
}

pub fn format_instruments_json(instruments: &[Instrument]) -> String {
    to_json(&instruments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockbook::reports::{Holding, PortfolioTotals};

    fn sample_report() -> PortfolioReport {
        PortfolioReport {
            holdings: vec![Holding {
                instrument_symbol: "SCOM".to_string(),
                display_name: "Safaricom PLC".to_string(),
                shares_held: 10,
                average_unit_cost: dec!(20),
                current_unit_price: dec!(25),
                unrealized_profit_percent: dec!(25),
                cost_basis: dec!(200),
            }],
            totals: PortfolioTotals {
                invested: dec!(200),
                current_value: dec!(250),
            },
        }
    }

    #[test]
    fn test_portfolio_json_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&format_portfolio_json(&sample_report())).unwrap();

        assert_eq!(json["holdings"][0]["symbol"], "SCOM");
        assert_eq!(json["holdings"][0]["shares"], 10);
        assert_eq!(json["holdings"][0]["current_value"], "250");
        assert_eq!(json["invested"], "200");
        assert_eq!(json["profit"], "50");
        let profit_pct: Decimal = json["profit_pct"].as_str().unwrap().parse().unwrap();
        assert_eq!(profit_pct, dec!(25));
    }

    #[test]
    fn test_portfolio_table_lists_holdings_and_totals() {
        colored::control::set_override(false);
        let table = format_portfolio_table(&sample_report(), "KSH");

        assert!(table.contains("SCOM"));
        assert!(table.contains("Safaricom PLC"));
        assert!(table.contains("KSH 250.00"));
        assert!(table.contains("+25.00%"));
        assert!(table.contains("Total Invested:"));
    }

    #[test]
    fn test_basis_json() {
        let json: serde_json::Value =
            serde_json::from_str(&format_basis_json(dec!(45), Some("SCOM"), None)).unwrap();
        assert_eq!(json["symbol"], "SCOM");
        assert!(json["as_of"].is_null());
        assert_eq!(json["invested"], "45");
    }
}
