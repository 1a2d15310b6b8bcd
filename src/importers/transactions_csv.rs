use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::db::{PaymentStatus, Transaction, TransactionType};
use crate::utils::parse_timestamp;

/// A transaction row as read from a CSV file, before user resolution
#[derive(Debug, Clone, PartialEq)]
pub struct RawTransaction {
    pub executed_at: DateTime<Utc>,
    pub user_address: Option<String>,
    pub symbol: String,
    pub transaction_type: TransactionType,
    pub share_count: u64,
    pub gross_amount: Decimal,
    pub status: PaymentStatus,
}

impl RawTransaction {
    /// Build a storable transaction, attributing rows without a user column
    /// to `default_user`
    pub fn to_transaction(&self, default_user: &str) -> Transaction {
        Transaction {
            id: None,
            user_address: self
                .user_address
                .clone()
                .unwrap_or_else(|| default_user.to_string()),
            transaction_type: self.transaction_type,
            instrument_symbol: self.symbol.clone(),
            share_count: self.share_count,
            gross_amount: self.gross_amount,
            executed_at: self.executed_at,
            status: self.status,
        }
    }
}

#[derive(Debug)]
struct CsvColumnMapping {
    date: usize,
    symbol: usize,
    transaction_type: usize,
    shares: usize,
    amount: usize,
    user: Option<usize>,
    status: Option<usize>,
}

/// Parse a transactions CSV file.
///
/// Expects a header row naming at least date, symbol, type, shares and
/// amount columns; user and status are optional. Rows that fail validation
/// are skipped with a warning.
pub fn parse_transactions_csv<P: AsRef<Path>>(file_path: P) -> Result<Vec<RawTransaction>> {
    let path = file_path.as_ref();
    info!("Parsing transactions CSV file: {:?}", path);

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .context("Failed to open CSV file")?;

    let headers = reader
        .headers()
        .context("Failed to read CSV headers")?
        .clone();
    debug!("CSV headers: {:?}", headers);

    let mapping = find_columns(&headers)?;
    debug!("Column mapping: {:?}", mapping);

    let mut transactions = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let row_num = idx + 2;
        let record = result.context("Failed to read CSV record")?;

        match parse_csv_row(&record, &mapping, row_num) {
            Ok(Some(transaction)) => transactions.push(transaction),
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping row {}: {}", row_num, e);
                continue;
            }
        }
    }

    info!(
        "Successfully parsed {} transactions from CSV",
        transactions.len()
    );
    Ok(transactions)
}

fn find_columns(headers: &StringRecord) -> Result<CsvColumnMapping> {
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
    };

    Ok(CsvColumnMapping {
        date: find(&["date", "executed_at", "timestamp", "purchase_date"])
            .ok_or_else(|| anyhow!("Date column not found"))?,
        symbol: find(&["symbol", "stock_symbol", "instrument", "ticker"])
            .ok_or_else(|| anyhow!("Symbol column not found"))?,
        transaction_type: find(&["type", "transaction_type", "side"])
            .ok_or_else(|| anyhow!("Transaction type column not found"))?,
        shares: find(&["shares", "share_count", "amount_shares", "quantity"])
            .ok_or_else(|| anyhow!("Shares column not found"))?,
        amount: find(&["amount", "gross_amount", "buy_price", "total"])
            .ok_or_else(|| anyhow!("Amount column not found"))?,
        user: find(&["user", "user_address", "account"]),
        status: find(&["status", "payment_status"]),
    })
}

fn field<'r>(record: &'r StringRecord, idx: usize, what: &str, row_num: usize) -> Result<&'r str> {
    record
        .get(idx)
        .ok_or_else(|| anyhow!("Missing {} at row {}", what, row_num))
}

fn parse_csv_row(
    record: &StringRecord,
    mapping: &CsvColumnMapping,
    row_num: usize,
) -> Result<Option<RawTransaction>> {
    // Blank symbol means a spacer or summary row
    let symbol = field(record, mapping.symbol, "symbol", row_num)?.to_uppercase();
    if symbol.is_empty() {
        return Ok(None);
    }

    let executed_at = parse_timestamp(field(record, mapping.date, "date", row_num)?)?;

    let type_str = field(record, mapping.transaction_type, "transaction type", row_num)?;
    let transaction_type = TransactionType::from_str(type_str)
        .map_err(|_| anyhow!("Unknown transaction type '{}'", type_str))?;

    let shares_str = field(record, mapping.shares, "shares", row_num)?;
    let share_count: u64 = shares_str
        .parse()
        .map_err(|_| anyhow!("Shares must be a whole positive number, got '{}'", shares_str))?;
    if share_count == 0 {
        return Err(anyhow!("Shares must be greater than zero"));
    }

    let gross_amount = parse_csv_decimal(field(record, mapping.amount, "amount", row_num)?)?;
    if transaction_type == TransactionType::Buy && gross_amount <= Decimal::ZERO {
        return Err(anyhow!("Buy amount must be greater than zero"));
    }
    if gross_amount < Decimal::ZERO {
        return Err(anyhow!("Amount cannot be negative"));
    }

    let user_address = mapping
        .user
        .and_then(|idx| record.get(idx))
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let status = match mapping.status.and_then(|idx| record.get(idx)) {
        Some(s) if !s.is_empty() => {
            PaymentStatus::from_str(s).map_err(|_| anyhow!("Unknown status '{}'", s))?
        }
        _ => PaymentStatus::Paid,
    };

    Ok(Some(RawTransaction {
        executed_at,
        user_address,
        symbol,
        transaction_type,
        share_count,
        gross_amount,
        status,
    }))
}

fn parse_csv_decimal(text: &str) -> Result<Decimal> {
    let cleaned: String = text
        .trim()
        .trim_start_matches("KSH")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    Decimal::from_str(&cleaned).context(format!("Failed to parse amount '{}'", text))
}
