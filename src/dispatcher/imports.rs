use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use stockbook::basis;
use stockbook::config::Config;
use stockbook::db::{self, Transaction};
use stockbook::importers;
use tracing::{info, warn};

use super::open_store;
use crate::cli::formatters;

const PREVIEW_ROWS: usize = 10;

#[derive(Debug, Default, Serialize)]
struct ImportStats {
    parsed: usize,
    imported: usize,
    skipped_duplicates: usize,
    errors: usize,
    dry_run: bool,
}

pub fn dispatch_import(
    path: &str,
    dry_run: bool,
    user: Option<&str>,
    config: &Config,
    json_output: bool,
) -> Result<()> {
    info!("Importing from: {}", path);

    let raw_transactions = importers::import_file(path)
        .with_context(|| format!("Error reading import file {}", path))?;

    // Rows without a user column belong to the acting user
    let default_user = if raw_transactions.iter().any(|raw| raw.user_address.is_none()) {
        config.resolve_user(user)?
    } else {
        String::new()
    };

    let transactions: Vec<Transaction> = raw_transactions
        .iter()
        .map(|raw| raw.to_transaction(&default_user))
        .collect();

    let mut stats = ImportStats {
        parsed: transactions.len(),
        dry_run,
        ..ImportStats::default()
    };

    if !json_output {
        println!(
            "\n{} Found {} transactions\n",
            "✓".green().bold(),
            transactions.len()
        );
        let preview: Vec<Transaction> = transactions.iter().take(PREVIEW_ROWS).cloned().collect();
        if !preview.is_empty() {
            println!(
                "{}",
                formatters::format_transactions_table(&preview, &config.currency)
            );
        }
    }

    if dry_run {
        if json_output {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("\n{} Dry run - no changes saved", "ℹ".blue().bold());
        }
        return Ok(());
    }

    let mut conn = open_store(config)?;
    let db_tx = conn.transaction()?;
    let outcome = importers::store_transactions(&db_tx, &transactions)?;
    db_tx.commit()?;

    stats.imported = outcome.imported;
    stats.skipped_duplicates = outcome.skipped_duplicates;
    stats.errors = outcome.errors;

    // Imported history may oversell; report it without rejecting the file
    let mut inconsistent = Vec::new();
    for user in &outcome.users {
        let settled = db::fetch_settled_transactions(&conn, user, None, None)?;
        if let Err(e) = basis::replay(&settled, None, None) {
            warn!("Imported history of {} is inconsistent: {}", user, e);
            inconsistent.push(format!("{}: {}", user, e));
        }
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "\n{} Imported {} transactions ({} duplicates skipped, {} errors)",
            "✓".green().bold(),
            stats.imported,
            stats.skipped_duplicates,
            stats.errors
        );
        for problem in &inconsistent {
            println!("{} {}", "⚠".yellow().bold(), problem);
        }
    }

    Ok(())
}
