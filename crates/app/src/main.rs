use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "saldo",
    version,
    about = "Credit card statement extraction and multi-currency balances"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a structured statement from a credit card PDF
    Extract {
        /// Path to the statement PDF
        pdf: PathBuf,

        /// Provider configuration file (defaults to ./saldo.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Fetch the current USD/ARS quote and store it
    FetchRates {
        /// Database file (defaults to the per-user data directory)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Quote endpoint override
        #[arg(long)]
        url: Option<String>,
    },

    /// Convert an amount between currencies using the closest stored rate
    Convert {
        amount: Decimal,
        from: String,
        to: String,

        /// Valuation date (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Database file (defaults to the per-user data directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List stored exchange rates in a date range
    Rates {
        start: NaiveDate,
        end: NaiveDate,

        /// Database file (defaults to the per-user data directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extract { pdf, config } => commands::extract(&pdf, config.as_deref()).await,
        Command::FetchRates { db, url } => commands::fetch_rates(db, url).await,
        Command::Convert {
            amount,
            from,
            to,
            date,
            db,
        } => commands::convert(amount, &from, &to, date, db).await,
        Command::Rates { start, end, db } => commands::rates(start, end, db).await,
    }
}
