use clap::{Parser, Subcommand};

pub mod formatters;

#[derive(Parser)]
#[command(name = "stockbook")]
#[command(version, about = "Stock portfolio tracker with FIFO cost basis")]
#[command(
    long_about = "Track stock purchases and sales, reconstruct your cost basis with FIFO lot accounting, and value your holdings against live prices."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// User (wallet address or account id) to act for
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database
    Init,

    /// Import transactions from a CSV file
    Import {
        /// Path to the CSV file
        file: String,

        /// Preview only, don't save to database
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Manual transaction management
    Transactions {
        #[command(subcommand)]
        action: TransactionCommands,
    },

    /// Instrument display names
    Instruments {
        #[command(subcommand)]
        action: InstrumentCommands,
    },

    /// Price data management
    Prices {
        #[command(subcommand)]
        action: PriceCommands,
    },

    /// Portfolio viewing
    Portfolio {
        #[command(subcommand)]
        action: PortfolioCommands,
    },
}

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Record a buy or sell
    Add {
        /// Instrument symbol (e.g., SCOM)
        symbol: String,

        /// buy or sell
        transaction_type: String,

        /// Number of shares (whole number)
        shares: String,

        /// Gross amount paid (buys) or received (sells)
        amount: String,

        /// Execution time (RFC 3339 or YYYY-MM-DD); defaults to now
        #[arg(short, long)]
        date: Option<String>,

        /// Payment status: paid, pending or failed
        #[arg(long, default_value = "paid")]
        status: String,
    },

    /// List all transactions of the user
    List,

    /// Mark a pending transaction's payment as cleared
    Settle {
        /// Transaction id
        id: i64,

        /// Record the payment as failed instead
        #[arg(long)]
        failed: bool,
    },
}

#[derive(Subcommand)]
pub enum InstrumentCommands {
    /// Register or rename an instrument
    Add {
        /// Instrument symbol (e.g., SCOM)
        symbol: String,

        /// Display name (e.g., "Safaricom PLC")
        name: String,
    },

    /// List registered instruments
    List,
}

#[derive(Subcommand)]
pub enum PriceCommands {
    /// Record a manual quote
    Set {
        /// Instrument symbol
        symbol: String,

        /// Current unit price
        price: String,
    },

    /// Fetch current quotes from the configured price feed
    Update,

    /// Show the latest stored quotes
    List,
}

#[derive(Subcommand)]
pub enum PortfolioCommands {
    /// Show holdings with unrealized profit and portfolio totals
    Show,

    /// Show the cost basis (initial investment) of open positions
    Basis {
        /// Restrict to one instrument
        #[arg(short, long)]
        symbol: Option<String>,

        /// Point in time (YYYY-MM-DD, YYYY-MM, YYYY or RFC 3339)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// List open FIFO lots
    Lots {
        /// Restrict to one instrument
        #[arg(short, long)]
        symbol: Option<String>,

        /// Point in time (YYYY-MM-DD, YYYY-MM, YYYY or RFC 3339)
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Invested capital over a trailing window
    History {
        /// Window: 1w, 1m or 3m
        #[arg(short, long, default_value = "1w")]
        range: String,

        /// Spacing: daily, weekly or monthly
        #[arg(short, long)]
        interval: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_portfolio_basis_with_globals() {
        let cli = Cli::try_parse_from([
            "stockbook",
            "portfolio",
            "basis",
            "--symbol",
            "SCOM",
            "--as-of",
            "2025-03",
            "--json",
            "--user",
            "0.0.42",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.user.as_deref(), Some("0.0.42"));
        match cli.command {
            Commands::Portfolio {
                action: PortfolioCommands::Basis { symbol, as_of },
            } => {
                assert_eq!(symbol.as_deref(), Some("SCOM"));
                assert_eq!(as_of.as_deref(), Some("2025-03"));
            }
            _ => panic!("expected portfolio basis"),
        }
    }

    #[test]
    fn test_transaction_add_defaults_to_paid() {
        let cli = Cli::try_parse_from([
            "stockbook",
            "transactions",
            "add",
            "SCOM",
            "buy",
            "10",
            "250",
        ])
        .unwrap();

        match cli.command {
            Commands::Transactions {
                action: TransactionCommands::Add { status, date, .. },
            } => {
                assert_eq!(status, "paid");
                assert!(date.is_none());
            }
            _ => panic!("expected transactions add"),
        }
    }
}
