use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use colored::Colorize;
use rust_decimal::Decimal;
use std::str::FromStr;
use stockbook::config::Config;
use stockbook::db::{self, PriceQuote};
use stockbook::error::PortfolioError;
use stockbook::pricing::{feed, PriceBook};
use tracing::{debug, info, warn};

use super::open_store;
use crate::cli::{formatters, PriceCommands};

const FEED_SOURCE: &str = "feed";
const MANUAL_SOURCE: &str = "manual";

pub async fn dispatch_prices(
    action: &PriceCommands,
    config: &Config,
    json_output: bool,
) -> Result<()> {
    match action {
        PriceCommands::Set { symbol, price } => {
            dispatch_price_set(symbol, price, config, json_output)
        }
        PriceCommands::Update => dispatch_price_update(config, json_output).await,
        PriceCommands::List => dispatch_price_list(config, json_output),
    }
}

fn dispatch_price_set(symbol: &str, price: &str, config: &Config, json_output: bool) -> Result<()> {
    let symbol = symbol.trim().to_uppercase();
    let price =
        Decimal::from_str(price.trim()).context("Invalid price. Must be a decimal number")?;
    if price <= Decimal::ZERO {
        return Err(
            PortfolioError::ValidationError("Price must be greater than zero".into()).into(),
        );
    }

    let quote = PriceQuote {
        symbol,
        price,
        quoted_at: Utc::now(),
        source: MANUAL_SOURCE.to_string(),
    };

    let conn = open_store(config)?;
    db::insert_price_quote(&conn, &quote)?;
    info!("Stored manual quote {} = {}", quote.symbol, quote.price);

    if json_output {
        println!("{}", formatters::format_quotes_json(std::slice::from_ref(&quote)));
    } else {
        println!(
            "{} {} priced at {}",
            "✓".green().bold(),
            quote.symbol.cyan(),
            stockbook::utils::format_currency(quote.price, &config.currency)
        );
    }
    Ok(())
}

async fn dispatch_price_update(config: &Config, json_output: bool) -> Result<()> {
    let url = config
        .price_feed_url
        .as_deref()
        .ok_or_else(|| {
            anyhow!("No price feed configured. Set price_feed_url in config.toml or STOCKBOOK_PRICE_URL")
        })?;

    let book = feed::fetch_price_list(url, config.price_timeout()).await?;
    let quotes = book.to_quotes(Utc::now(), FEED_SOURCE);
    store_quotes(config, quotes.clone()).await?;

    if json_output {
        println!("{}", formatters::format_quotes_json(&quotes));
    } else {
        println!(
            "{} Updated {} prices",
            "✓".green().bold(),
            quotes.len()
        );
    }
    Ok(())
}

fn dispatch_price_list(config: &Config, json_output: bool) -> Result<()> {
    let conn = open_store(config)?;
    let quotes = db::get_latest_prices(&conn)?;

    if json_output {
        println!("{}", formatters::format_quotes_json(&quotes));
    } else {
        println!(
            "{}",
            formatters::format_quotes_table(&quotes, &config.currency)
        );
    }
    Ok(())
}

async fn store_quotes(config: &Config, quotes: Vec<PriceQuote>) -> Result<()> {
    let store = config.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let conn = open_store(&store)?;
        for quote in &quotes {
            db::insert_price_quote(&conn, quote)?;
        }
        debug!("Stored {} quotes", quotes.len());
        Ok(())
    })
    .await
    .context("Quote writer task failed")?
}

/// Current prices for valuation.
///
/// Starts from the latest stored quote of every symbol and overlays a fresh
/// pull from the price feed, which is stored as well. A failing feed only
/// warns; stored quotes are used as they are.
pub(crate) async fn load_price_book(config: &Config) -> Result<PriceBook> {
    let store = config.clone();
    let stored = tokio::task::spawn_blocking(move || -> Result<Vec<PriceQuote>> {
        let conn = open_store(&store)?;
        db::get_latest_prices(&conn)
    })
    .await
    .context("Quote loader task failed")??;

    let mut book: PriceBook = stored.into_iter().collect();

    if config.skip_price_fetch {
        debug!("Price fetch disabled, using {} stored quotes", book.len());
        return Ok(book);
    }
    let Some(url) = config.price_feed_url.as_deref() else {
        debug!("No price feed configured, using {} stored quotes", book.len());
        return Ok(book);
    };

    match feed::fetch_price_list(url, config.price_timeout()).await {
        Ok(live) => {
            let quotes = live.to_quotes(Utc::now(), FEED_SOURCE);
            store_quotes(config, quotes.clone()).await?;
            for quote in quotes {
                book.insert(quote.symbol, quote.price);
            }
        }
        Err(e) => {
            warn!("Price feed unavailable, using stored quotes: {:#}", e);
            eprintln!(
                "{} Price feed unavailable, using stored quotes",
                "⚠".yellow().bold()
            );
        }
    }

    Ok(book)
}
