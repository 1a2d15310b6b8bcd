use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;
use stockbook::basis;
use stockbook::config::Config;
use stockbook::db::{self, PaymentStatus, Transaction, TransactionType};
use stockbook::error::PortfolioError;
use stockbook::utils::{format_currency, parse_timestamp};
use tracing::info;

use super::open_store;
use crate::cli::{formatters, TransactionCommands};

pub fn dispatch_transactions(
    action: &TransactionCommands,
    user: Option<&str>,
    config: &Config,
    json_output: bool,
) -> Result<()> {
    let user = config.resolve_user(user)?;

    match action {
        TransactionCommands::Add {
            symbol,
            transaction_type,
            shares,
            amount,
            date,
            status,
        } => dispatch_transaction_add(
            &user,
            TransactionInput {
                symbol,
                transaction_type,
                shares,
                amount,
                date: date.as_deref(),
                status,
            },
            config,
            json_output,
        ),
        TransactionCommands::List => dispatch_transactions_list(&user, config, json_output),
        TransactionCommands::Settle { id, failed } => {
            dispatch_transaction_settle(&user, *id, *failed, config, json_output)
        }
    }
}

struct TransactionInput<'a> {
    symbol: &'a str,
    transaction_type: &'a str,
    shares: &'a str,
    amount: &'a str,
    date: Option<&'a str>,
    status: &'a str,
}

fn validation(message: impl Into<String>) -> anyhow::Error {
    PortfolioError::ValidationError(message.into()).into()
}

/// Turn command line arguments into a transaction for `user`
fn build_transaction(user: &str, input: &TransactionInput) -> Result<Transaction> {
    let symbol = input.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(validation("Symbol cannot be empty"));
    }

    let transaction_type = TransactionType::from_str(input.transaction_type)
        .map_err(|_| validation(format!("Unknown transaction type '{}'", input.transaction_type)))?;

    let share_count: u64 = input
        .shares
        .trim()
        .parse()
        .map_err(|_| validation("Invalid share count. Must be a whole number"))?;
    if share_count == 0 {
        return Err(validation("Share count must be greater than zero"));
    }

    let gross_amount =
        Decimal::from_str(input.amount.trim()).context("Invalid amount. Must be a decimal number")?;
    match transaction_type {
        TransactionType::Buy if gross_amount <= Decimal::ZERO => {
            return Err(validation("Buy amount must be greater than zero"));
        }
        TransactionType::Sell if gross_amount < Decimal::ZERO => {
            return Err(validation("Sell amount cannot be negative"));
        }
        _ => {}
    }

    let executed_at = match input.date {
        Some(date) => parse_timestamp(date)?,
        None => Utc::now(),
    };

    let status = PaymentStatus::from_str(input.status)
        .map_err(|_| validation(format!("Unknown status '{}'", input.status)))?;

    Ok(Transaction {
        id: None,
        user_address: user.to_string(),
        transaction_type,
        instrument_symbol: symbol,
        share_count,
        gross_amount,
        executed_at,
        status,
    })
}

/// Reject a settled transaction that would sell more than the user holds
/// at that point of the history
fn ensure_consistent(conn: &Connection, tx: &Transaction) -> Result<()> {
    if !tx.is_settled() || tx.transaction_type != TransactionType::Sell {
        return Ok(());
    }

    let mut history =
        db::fetch_settled_transactions(conn, &tx.user_address, Some(&tx.instrument_symbol), None)?;
    history.push(tx.clone());

    basis::replay(&history, Some(&tx.instrument_symbol), None)
        .map(|_| ())
        .map_err(|e| validation(e.to_string()))
}

fn dispatch_transaction_add(
    user: &str,
    input: TransactionInput,
    config: &Config,
    json_output: bool,
) -> Result<()> {
    info!("Adding manual transaction for {}", input.symbol);

    let mut tx = build_transaction(user, &input)?;
    let conn = open_store(config)?;
    ensure_consistent(&conn, &tx)?;

    db::upsert_instrument(&conn, &tx.instrument_symbol, None)?;
    let id = db::insert_transaction(&conn, &tx)?;
    tx.id = Some(id);

    if json_output {
        println!(
            "{}",
            formatters::format_transactions_json(std::slice::from_ref(&tx))
        );
    } else {
        println!(
            "{} Recorded {} {} {} for {} (id {}, {})",
            "✓".green().bold(),
            tx.transaction_type.as_str(),
            tx.share_count,
            tx.instrument_symbol.cyan(),
            format_currency(tx.gross_amount, &config.currency),
            id,
            tx.status.as_str()
        );
    }
    Ok(())
}

fn dispatch_transactions_list(user: &str, config: &Config, json_output: bool) -> Result<()> {
    let conn = open_store(config)?;
    let transactions = db::list_transactions(&conn, user)?;

    if json_output {
        println!("{}", formatters::format_transactions_json(&transactions));
    } else {
        println!(
            "{}",
            formatters::format_transactions_table(&transactions, &config.currency)
        );
    }
    Ok(())
}

fn dispatch_transaction_settle(
    user: &str,
    id: i64,
    failed: bool,
    config: &Config,
    json_output: bool,
) -> Result<()> {
    let conn = open_store(config)?;
    let mut tx = db::list_transactions(&conn, user)?
        .into_iter()
        .find(|tx| tx.id == Some(id))
        .ok_or_else(|| validation(format!("No transaction {} for user {}", id, user)))?;

    if tx.status != PaymentStatus::Pending {
        return Err(validation(format!(
            "Transaction {} is already {}",
            id,
            tx.status.as_str()
        )));
    }

    tx.status = if failed {
        PaymentStatus::Failed
    } else {
        PaymentStatus::Paid
    };
    ensure_consistent(&conn, &tx)?;
    db::set_transaction_status(&conn, id, tx.status)?;

    if json_output {
        println!(
            "{}",
            formatters::format_transactions_json(std::slice::from_ref(&tx))
        );
    } else {
        println!(
            "{} Transaction {} marked {}",
            "✓".green().bold(),
            id,
            tx.status.as_str()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input<'a>(
        transaction_type: &'a str,
        shares: &'a str,
        amount: &'a str,
    ) -> TransactionInput<'a> {
        TransactionInput {
            symbol: " scom ",
            transaction_type,
            shares,
            amount,
            date: Some("2025-01-10"),
            status: "paid",
        }
    }

    #[test]
    fn test_build_transaction_normalizes_input() {
        let tx = build_transaction("0.0.7", &input("buy", "10", "250.5")).unwrap();
        assert_eq!(tx.instrument_symbol, "SCOM");
        assert_eq!(tx.transaction_type, TransactionType::Buy);
        assert_eq!(tx.share_count, 10);
        assert_eq!(tx.gross_amount, dec!(250.5));
        assert_eq!(tx.status, PaymentStatus::Paid);
        assert_eq!(tx.user_address, "0.0.7");
    }

    #[test]
    fn test_build_transaction_rejects_bad_values() {
        assert!(build_transaction("u", &input("buy", "0", "10")).is_err());
        assert!(build_transaction("u", &input("buy", "1.5", "10")).is_err());
        assert!(build_transaction("u", &input("buy", "2", "0")).is_err());
        assert!(build_transaction("u", &input("sell", "2", "-1")).is_err());
        assert!(build_transaction("u", &input("hold", "2", "10")).is_err());
        assert!(build_transaction("u", &input("sell", "2", "0")).is_ok());
    }
}
