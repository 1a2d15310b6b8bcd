use anyhow::Result;
use colored::Colorize;
use stockbook::config::Config;
use stockbook::db::{self, Instrument};

use super::open_store;
use crate::cli::{formatters, InstrumentCommands};

pub fn dispatch_instruments(
    action: &InstrumentCommands,
    config: &Config,
    json_output: bool,
) -> Result<()> {
    let conn = open_store(config)?;

    match action {
        InstrumentCommands::Add { symbol, name } => {
            let instrument = Instrument {
                symbol: symbol.trim().to_uppercase(),
                name: name.trim().to_string(),
            };
            db::upsert_instrument(&conn, &instrument.symbol, Some(&instrument.name))?;
            if json_output {
                println!(
                    "{}",
                    formatters::format_instruments_json(std::slice::from_ref(&instrument))
                );
            } else {
                println!(
                    "{} {} is now {}",
                    "✓".green().bold(),
                    instrument.symbol.cyan(),
                    instrument.name
                );
            }
            Ok(())
        }
        InstrumentCommands::List => {
            let instruments = db::get_all_instruments(&conn)?;
            if json_output {
                println!("{}", formatters::format_instruments_json(&instruments));
            } else {
                println!("{}", formatters::format_instruments_table(&instruments));
            }
            Ok(())
        }
    }
}
