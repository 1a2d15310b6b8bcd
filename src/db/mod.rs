// Database module - SQLite transaction store and price quotes

pub mod models;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::PortfolioError;
pub use models::{Instrument, PaymentStatus, PriceQuote, Transaction, TransactionType};

/// Get the default data directory (~/.stockbook)
pub fn get_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".stockbook"))
}

/// Get the default database path (~/.stockbook/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let data_dir = get_data_dir()?;

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&data_dir).context("Failed to create .stockbook directory")?;

    Ok(data_dir.join("data.db"))
}

fn resolve_path(db_path: Option<PathBuf>) -> Result<PathBuf> {
    match db_path {
        Some(path) => Ok(path),
        None => get_default_db_path(),
    }
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = resolve_path(db_path)?;
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Initialize the database with schema
///
/// Creates the database file (and its parent directory) and runs the schema
/// SQL. Safe to call repeatedly.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = resolve_path(db_path)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create database directory {:?}", parent))?;
    }

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    conn.execute_batch(include_str!("schema.sql"))
        .context("Failed to execute schema")?;

    debug!("Database schema ready");
    Ok(())
}

/// Insert an instrument, or update its display name when one is given
pub fn upsert_instrument(conn: &Connection, symbol: &str, name: Option<&str>) -> Result<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT name FROM instruments WHERE symbol = ?1",
            [symbol],
            |row| row.get(0),
        )
        .optional()?;

    match (existing, name) {
        (Some(_), Some(name)) => {
            conn.execute(
                "UPDATE instruments SET name = ?2, updated_at = CURRENT_TIMESTAMP WHERE symbol = ?1",
                params![symbol, name],
            )?;
        }
        (Some(_), None) => {}
        (None, name) => {
            conn.execute(
                "INSERT INTO instruments (symbol, name) VALUES (?1, ?2)",
                params![symbol, name.unwrap_or(symbol)],
            )?;
        }
    }

    Ok(())
}

/// Display names keyed by symbol
pub fn get_instrument_names(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT symbol, name FROM instruments")?;
    let names = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(names)
}

/// All registered instruments, ordered by symbol
pub fn get_all_instruments(conn: &Connection) -> Result<Vec<Instrument>> {
    let mut stmt = conn.prepare("SELECT symbol, name FROM instruments ORDER BY symbol")?;
    let instruments = stmt
        .query_map([], |row| {
            Ok(Instrument {
                symbol: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(instruments)
}

/// Insert transaction
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<i64> {
    let share_count =
        i64::try_from(tx.share_count).context("Share count too large to store")?;

    conn.execute(
        "INSERT INTO transactions (
            user_address, transaction_type, instrument_symbol,
            share_count, gross_amount, executed_at, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tx.user_address,
            tx.transaction_type.as_str(),
            tx.instrument_symbol,
            share_count,
            tx.gross_amount.to_string(),
            tx.executed_at,
            tx.status.as_str(),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Number of stored transactions identical to `tx`.
///
/// Identity covers every recorded field except the row id, so two real
/// trades of the same size on the same day but for different amounts are
/// never confused.
pub fn count_matching_transactions(conn: &Connection, tx: &Transaction) -> Result<usize> {
    let share_count =
        i64::try_from(tx.share_count).context("Share count too large to store")?;

    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions
         WHERE user_address = ?1 AND instrument_symbol = ?2 AND transaction_type = ?3
           AND executed_at = ?4 AND share_count = ?5 AND gross_amount = ?6
           AND status = ?7",
        params![
            tx.user_address,
            tx.instrument_symbol,
            tx.transaction_type.as_str(),
            tx.executed_at,
            share_count,
            tx.gross_amount.to_string(),
            tx.status.as_str(),
        ],
        |row| row.get(0),
    )?;

    Ok(usize::try_from(count).unwrap_or(0))
}

/// Record the payment outcome of a transaction
pub fn set_transaction_status(conn: &Connection, id: i64, status: PaymentStatus) -> Result<()> {
    let updated = conn.execute(
        "UPDATE transactions SET status = ?2 WHERE id = ?1",
        params![id, status.as_str()],
    )?;

    if updated == 0 {
        return Err(PortfolioError::DbError(format!("transaction {} not found", id)).into());
    }

    info!("Transaction {} marked {}", id, status.as_str());
    Ok(())
}

const TRANSACTION_COLUMNS: &str = "id, user_address, transaction_type, instrument_symbol,
        share_count, gross_amount, executed_at, status";

/// All transactions of a user regardless of status, oldest first
pub fn list_transactions(conn: &Connection, user: &str) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transactions
         WHERE user_address = ?1
         ORDER BY executed_at ASC, id ASC",
        TRANSACTION_COLUMNS
    ))?;

    let transactions = stmt
        .query_map([user], row_to_transaction)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(transactions)
}

/// Settled transactions of a user, ordered by execution time.
///
/// Optionally restricted to one instrument and to transactions executed at
/// or before `as_of`.
pub fn fetch_settled_transactions(
    conn: &Connection,
    user: &str,
    instrument: Option<&str>,
    as_of: Option<DateTime<Utc>>,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM transactions
         WHERE user_address = ?1
           AND status = ?2
           AND (?3 IS NULL OR instrument_symbol = ?3)
           AND (?4 IS NULL OR executed_at <= ?4)
         ORDER BY executed_at ASC, id ASC",
        TRANSACTION_COLUMNS
    ))?;

    let transactions = stmt
        .query_map(
            params![user, PaymentStatus::Paid.as_str(), instrument, as_of],
            row_to_transaction,
        )?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to load settled transactions")?;

    debug!(
        "Loaded {} settled transactions for {}",
        transactions.len(),
        user
    );
    Ok(transactions)
}

fn row_to_transaction(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let tx_type: String = row.get(2)?;
    let status: String = row.get(7)?;
    let share_count: i64 = row.get(4)?;

    Ok(Transaction {
        id: Some(row.get(0)?),
        user_address: row.get(1)?,
        transaction_type: TransactionType::from_str(&tx_type)
            .map_err(|_| unknown_value(2, "transaction type", &tx_type))?,
        instrument_symbol: row.get(3)?,
        share_count: u64::try_from(share_count)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(4, share_count))?,
        gross_amount: get_decimal_value(row, 5)?,
        executed_at: row.get(6)?,
        status: PaymentStatus::from_str(&status)
            .map_err(|_| unknown_value(7, "payment status", &status))?,
    })
}

fn unknown_value(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(PortfolioError::ParseError(format!(
            "unknown {} '{}'",
            what, value
        ))),
    )
}

/// Store a price quote
pub fn insert_price_quote(conn: &Connection, quote: &PriceQuote) -> Result<i64> {
    conn.execute(
        "INSERT INTO price_quotes (symbol, price, quoted_at, source) VALUES (?1, ?2, ?3, ?4)",
        params![
            quote.symbol,
            quote.price.to_string(),
            quote.quoted_at,
            quote.source
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Most recent quote per symbol
pub fn get_latest_prices(conn: &Connection) -> Result<Vec<PriceQuote>> {
    let mut stmt = conn.prepare(
        "SELECT q.symbol, q.price, q.quoted_at, q.source
         FROM price_quotes q
         WHERE q.id = (
             SELECT q2.id FROM price_quotes q2
             WHERE q2.symbol = q.symbol
             ORDER BY q2.quoted_at DESC, q2.id DESC
             LIMIT 1
         )
         ORDER BY q.symbol",
    )?;

    let quotes = stmt
        .query_map([], |row| {
            Ok(PriceQuote {
                symbol: row.get(0)?,
                price: get_decimal_value(row, 1)?,
                quoted_at: row.get(2)?,
                source: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quotes)
}

/// Helper to read Decimal from SQLite (handles both INTEGER and TEXT)
fn get_decimal_value(row: &Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    // TEXT storage
    if let Ok(s) = row.get::<_, String>(idx) {
        return Decimal::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        });
    }

    // INTEGER storage due to SQLite type affinity
    if let Ok(i) = row.get::<_, i64>(idx) {
        return Ok(Decimal::from(i));
    }

    Err(rusqlite::Error::InvalidColumnType(
        idx,
        "decimal".to_string(),
        rusqlite::types::Type::Null,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn create_test_db() -> (TempDir, Connection) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        init_database(Some(db_path.clone())).unwrap();
        let conn = open_db(Some(db_path)).unwrap();
        (temp_dir, conn)
    }

    fn make_tx(
        tx_type: TransactionType,
        symbol: &str,
        shares: u64,
        amount: Decimal,
        day: u32,
        status: PaymentStatus,
    ) -> Transaction {
        Transaction {
            id: None,
            user_address: "0.0.1001".to_string(),
            transaction_type: tx_type,
            instrument_symbol: symbol.to_string(),
            share_count: shares,
            gross_amount: amount,
            executed_at: Utc.with_ymd_and_hms(2025, 3, day, 10, 0, 0).unwrap(),
            status,
        }
    }

    #[test]
    fn test_insert_and_fetch_settled_only() {
        let (_dir, conn) = create_test_db();

        let buy = make_tx(TransactionType::Buy, "SCOM", 10, dec!(250.50), 1, PaymentStatus::Paid);
        let pending = make_tx(TransactionType::Buy, "SCOM", 5, dec!(120), 2, PaymentStatus::Pending);
        insert_transaction(&conn, &buy).unwrap();
        insert_transaction(&conn, &pending).unwrap();

        let settled = fetch_settled_transactions(&conn, "0.0.1001", None, None).unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].share_count, 10);
        assert_eq!(settled[0].gross_amount, dec!(250.50));
        assert_eq!(settled[0].executed_at, buy.executed_at);

        let all = list_transactions(&conn, "0.0.1001").unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_fetch_orders_by_execution_time_and_filters() {
        let (_dir, conn) = create_test_db();

        // Inserted out of order on purpose
        let later = make_tx(TransactionType::Sell, "SCOM", 3, dec!(90), 20, PaymentStatus::Paid);
        let earlier = make_tx(TransactionType::Buy, "SCOM", 10, dec!(250), 5, PaymentStatus::Paid);
        let other = make_tx(TransactionType::Buy, "EQTY", 2, dec!(80), 10, PaymentStatus::Paid);
        insert_transaction(&conn, &later).unwrap();
        insert_transaction(&conn, &earlier).unwrap();
        insert_transaction(&conn, &other).unwrap();

        let all = fetch_settled_transactions(&conn, "0.0.1001", None, None).unwrap();
        let days: Vec<_> = all.iter().map(|t| t.executed_at).collect();
        let mut sorted = days.clone();
        sorted.sort();
        assert_eq!(days, sorted);

        let scom = fetch_settled_transactions(&conn, "0.0.1001", Some("SCOM"), None).unwrap();
        assert_eq!(scom.len(), 2);

        let cutoff = Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap();
        let until = fetch_settled_transactions(&conn, "0.0.1001", None, Some(cutoff)).unwrap();
        assert_eq!(until.len(), 2);
        assert!(until.iter().all(|t| t.executed_at <= cutoff));
    }

    #[test]
    fn test_set_transaction_status_settles_pending() {
        let (_dir, conn) = create_test_db();
        let pending = make_tx(TransactionType::Buy, "KCB", 4, dec!(160), 3, PaymentStatus::Pending);
        let id = insert_transaction(&conn, &pending).unwrap();

        assert!(fetch_settled_transactions(&conn, "0.0.1001", None, None)
            .unwrap()
            .is_empty());

        set_transaction_status(&conn, id, PaymentStatus::Paid).unwrap();
        let settled = fetch_settled_transactions(&conn, "0.0.1001", None, None).unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].id, Some(id));

        assert!(set_transaction_status(&conn, 9999, PaymentStatus::Paid).is_err());
    }

    #[test]
    fn test_count_matching_transactions_uses_amount_and_status() {
        let (_dir, conn) = create_test_db();
        let buy = make_tx(TransactionType::Buy, "SCOM", 10, dec!(100), 1, PaymentStatus::Paid);
        assert_eq!(count_matching_transactions(&conn, &buy).unwrap(), 0);
        insert_transaction(&conn, &buy).unwrap();
        assert_eq!(count_matching_transactions(&conn, &buy).unwrap(), 1);

        // Same day and size, different amount: a separate trade
        let other_amount =
            make_tx(TransactionType::Buy, "SCOM", 10, dec!(300), 1, PaymentStatus::Paid);
        assert_eq!(count_matching_transactions(&conn, &other_amount).unwrap(), 0);

        let pending = make_tx(TransactionType::Buy, "SCOM", 10, dec!(100), 1, PaymentStatus::Pending);
        assert_eq!(count_matching_transactions(&conn, &pending).unwrap(), 0);

        insert_transaction(&conn, &buy).unwrap();
        assert_eq!(count_matching_transactions(&conn, &buy).unwrap(), 2);
    }

    #[test]
    fn test_upsert_instrument_keeps_or_updates_name() {
        let (_dir, conn) = create_test_db();
        upsert_instrument(&conn, "SCOM", None).unwrap();
        assert_eq!(get_instrument_names(&conn).unwrap()["SCOM"], "SCOM");

        upsert_instrument(&conn, "SCOM", Some("Safaricom PLC")).unwrap();
        upsert_instrument(&conn, "SCOM", None).unwrap();
        assert_eq!(get_instrument_names(&conn).unwrap()["SCOM"], "Safaricom PLC");
        assert_eq!(get_all_instruments(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_latest_price_per_symbol() {
        let (_dir, conn) = create_test_db();
        let quote = |symbol: &str, price: Decimal, day: u32| PriceQuote {
            symbol: symbol.to_string(),
            price,
            quoted_at: Utc.with_ymd_and_hms(2025, 4, day, 9, 0, 0).unwrap(),
            source: "MANUAL".to_string(),
        };

        insert_price_quote(&conn, &quote("SCOM", dec!(28.10), 2)).unwrap();
        insert_price_quote(&conn, &quote("SCOM", dec!(27.55), 1)).unwrap();
        insert_price_quote(&conn, &quote("EQTY", dec!(45), 1)).unwrap();

        let latest = get_latest_prices(&conn).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].symbol, "EQTY");
        assert_eq!(latest[1].symbol, "SCOM");
        assert_eq!(latest[1].price, dec!(28.10));
    }
}
