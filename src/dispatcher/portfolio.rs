use anyhow::{Context, Result};
use chrono::Utc;
use std::str::FromStr;
use stockbook::basis::{self, Lot};
use stockbook::config::Config;
use stockbook::db;
use stockbook::reports::{self, Interval, Range};
use stockbook::utils::parse_as_of;
use tracing::info;

use super::{open_store, prices};
use crate::cli::{formatters, PortfolioCommands};

pub async fn dispatch_portfolio(
    action: &PortfolioCommands,
    user: Option<&str>,
    config: &Config,
    json_output: bool,
) -> Result<()> {
    let user = config.resolve_user(user)?;

    match action {
        PortfolioCommands::Show => dispatch_portfolio_show(&user, config, json_output).await,
        PortfolioCommands::Basis { symbol, as_of } => dispatch_portfolio_basis(
            &user,
            symbol.as_deref(),
            as_of.as_deref(),
            config,
            json_output,
        ),
        PortfolioCommands::Lots { symbol, as_of } => dispatch_portfolio_lots(
            &user,
            symbol.as_deref(),
            as_of.as_deref(),
            config,
            json_output,
        ),
        PortfolioCommands::History { range, interval } => {
            dispatch_portfolio_history(&user, range, interval.as_deref(), config, json_output)
        }
    }
}

async fn dispatch_portfolio_show(user: &str, config: &Config, json_output: bool) -> Result<()> {
    info!("Generating portfolio report for {}", user);

    let store = config.clone();
    let owner = user.to_string();

    // Transaction history and current prices load concurrently
    let ((transactions, names), price_book) = tokio::try_join!(
        async move {
            tokio::task::spawn_blocking(move || -> Result<_> {
                let conn = open_store(&store)?;
                let transactions = db::fetch_settled_transactions(&conn, &owner, None, None)?;
                let names = db::get_instrument_names(&conn)?;
                Ok((transactions, names))
            })
            .await
            .context("Transaction loader task failed")?
        },
        prices::load_price_book(config),
    )?;

    let report = reports::calculate_portfolio(&transactions, &names, &price_book)?;

    if json_output {
        println!("{}", formatters::format_portfolio_json(&report));
    } else if report.holdings.is_empty() {
        println!("{}", formatters::format_empty_portfolio());
    } else {
        println!(
            "{}",
            formatters::format_portfolio_table(&report, &config.currency)
        );
    }

    Ok(())
}

fn dispatch_portfolio_basis(
    user: &str,
    symbol: Option<&str>,
    as_of: Option<&str>,
    config: &Config,
    json_output: bool,
) -> Result<()> {
    let symbol = symbol.map(str::to_uppercase);
    let cutoff = as_of.map(parse_as_of).transpose()?;

    let conn = open_store(config)?;
    let transactions = db::fetch_settled_transactions(&conn, user, symbol.as_deref(), cutoff)?;
    let invested = basis::compute_cost_basis(&transactions, symbol.as_deref(), cutoff)?;

    if json_output {
        println!(
            "{}",
            formatters::format_basis_json(invested, symbol.as_deref(), as_of)
        );
    } else {
        println!(
            "{}",
            formatters::format_basis(invested, symbol.as_deref(), as_of, &config.currency)
        );
    }

    Ok(())
}

fn dispatch_portfolio_lots(
    user: &str,
    symbol: Option<&str>,
    as_of: Option<&str>,
    config: &Config,
    json_output: bool,
) -> Result<()> {
    let symbol = symbol.map(str::to_uppercase);
    let cutoff = as_of.map(parse_as_of).transpose()?;

    let conn = open_store(config)?;
    let transactions = db::fetch_settled_transactions(&conn, user, symbol.as_deref(), cutoff)?;
    let tracker = basis::replay(&transactions, symbol.as_deref(), cutoff)?;

    let lots: Vec<&Lot> = match symbol.as_deref() {
        Some(symbol) => tracker.open_lots(symbol).collect(),
        None => tracker.all_lots().collect(),
    };

    if json_output {
        println!("{}", formatters::format_lots_json(&lots));
    } else {
        println!("{}", formatters::format_lots_table(&lots, &config.currency));
    }

    Ok(())
}

fn dispatch_portfolio_history(
    user: &str,
    range: &str,
    interval: Option<&str>,
    config: &Config,
    json_output: bool,
) -> Result<()> {
    let range = Range::from_str(range).map_err(anyhow::Error::msg)?;
    let interval = match interval {
        Some(s) => Interval::from_str(s).map_err(anyhow::Error::msg)?,
        None => range.default_interval(),
    };

    let today = Utc::now().date_naive();
    let conn = open_store(config)?;
    let transactions = db::fetch_settled_transactions(&conn, user, None, None)?;
    let points = reports::invested_series(&transactions, range.start(today), today, interval)?;

    if json_output {
        println!("{}", formatters::format_history_json(&points));
    } else {
        println!(
            "{}",
            formatters::format_history_table(&points, &config.currency)
        );
    }

    Ok(())
}
