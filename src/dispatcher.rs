//! Command dispatcher that routes parsed clap commands to their handlers.

mod imports;
mod instruments;
mod portfolio;
mod prices;
mod transactions;

use anyhow::Result;
use colored::Colorize;
use rusqlite::Connection;
use stockbook::config::Config;
use stockbook::db;
use tracing::info;

use crate::cli::{Cli, Commands};

/// Route a parsed command line to its handler
pub async fn dispatch(cli: Cli, config: &Config) -> Result<()> {
    let json_output = cli.json;
    let user = cli.user.as_deref();

    match cli.command {
        Commands::Init => dispatch_init(config, json_output),
        Commands::Import { file, dry_run } => {
            imports::dispatch_import(&file, dry_run, user, config, json_output)
        }
        Commands::Transactions { action } => {
            transactions::dispatch_transactions(&action, user, config, json_output)
        }
        Commands::Instruments { action } => {
            instruments::dispatch_instruments(&action, config, json_output)
        }
        Commands::Prices { action } => prices::dispatch_prices(&action, config, json_output).await,
        Commands::Portfolio { action } => {
            portfolio::dispatch_portfolio(&action, user, config, json_output).await
        }
    }
}

fn dispatch_init(config: &Config, json_output: bool) -> Result<()> {
    let path = match &config.database_path {
        Some(path) => path.clone(),
        None => db::get_default_db_path()?,
    };
    db::init_database(Some(path.clone()))?;
    info!("Database ready at {:?}", path);

    if json_output {
        println!(
            "{}",
            serde_json::json!({ "database": path.display().to_string() })
        );
    } else {
        println!(
            "{} Database ready at {}",
            "✓".green().bold(),
            path.display()
        );
    }
    Ok(())
}

/// Make sure the schema exists, then open the configured database
pub(crate) fn open_store(config: &Config) -> Result<Connection> {
    db::init_database(config.database_path.clone())?;
    db::open_db(config.database_path.clone())
}
