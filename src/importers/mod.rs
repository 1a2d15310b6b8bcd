// Import module - transaction history files

pub mod transactions_csv;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::db::{self, Transaction};

pub use transactions_csv::RawTransaction;

/// Outcome of storing a batch of imported transactions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOutcome {
    pub imported: usize,
    pub skipped_duplicates: usize,
    pub errors: usize,
    /// Users that received at least one new transaction
    pub users: BTreeSet<String>,
}

type TransactionKey = (
    String,
    String,
    &'static str,
    DateTime<Utc>,
    u64,
    String,
    &'static str,
);

fn transaction_key(tx: &Transaction) -> TransactionKey {
    (
        tx.user_address.clone(),
        tx.instrument_symbol.clone(),
        tx.transaction_type.as_str(),
        tx.executed_at,
        tx.share_count,
        tx.gross_amount.to_string(),
        tx.status.as_str(),
    )
}

/// Store imported transactions, skipping the ones already in the database.
///
/// Identical rows within one batch are distinct trades: the n-th copy is
/// stored only when fewer than n identical transactions exist, so a first
/// load keeps every row and a re-import of the same file stores nothing.
pub fn store_transactions(conn: &Connection, transactions: &[Transaction]) -> Result<StoreOutcome> {
    let mut outcome = StoreOutcome::default();
    let mut occurrences: HashMap<TransactionKey, usize> = HashMap::new();

    for tx in transactions {
        let seen = occurrences.entry(transaction_key(tx)).or_insert(0);
        *seen += 1;

        if db::count_matching_transactions(conn, tx)? >= *seen {
            debug!(
                "Skipping duplicate {} {} x{} at {}",
                tx.transaction_type.as_str(),
                tx.instrument_symbol,
                tx.share_count,
                tx.executed_at
            );
            outcome.skipped_duplicates += 1;
            continue;
        }

        let stored = db::upsert_instrument(conn, &tx.instrument_symbol, None)
            .and_then(|_| db::insert_transaction(conn, tx));
        match stored {
            Ok(_) => {
                outcome.imported += 1;
                outcome.users.insert(tx.user_address.clone());
            }
            Err(e) => {
                warn!("Failed to store {} transaction: {:#}", tx.instrument_symbol, e);
                outcome.errors += 1;
            }
        }
    }

    info!(
        "Stored {} transactions ({} duplicates, {} errors)",
        outcome.imported, outcome.skipped_duplicates, outcome.errors
    );
    Ok(outcome)
}

/// Import transactions from a file (format chosen by extension)
pub fn import_file<P: AsRef<Path>>(file_path: P) -> Result<Vec<RawTransaction>> {
    let path = file_path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow!("File has no extension"))?
        .to_lowercase();

    info!("Importing file: {:?} (type: {})", path, extension);

    match extension.as_str() {
        "csv" | "txt" => transactions_csv::parse_transactions_csv(path),
        _ => Err(anyhow!(
            "Unsupported file type '.{}'. Export the history as CSV",
            extension
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_extension() {
        let err = import_file("history.xlsx").unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
        assert!(import_file("history").is_err());
    }
}
