use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;

use saldo_core::Currency;
use saldo_extract::{
    ChatCompletionsProvider, CompositeProvider, ExtractionProvider, ExtractionResult,
    ExtractionSettings, ProviderMode, ProviderSettings, StatementExtractor,
};
use saldo_fx::{convert_amount, RateFetcher};
use saldo_storage::{create_db, get_rates_in_range, upsert_rate, DbPool};

pub async fn extract(pdf: &Path, config: Option<&Path>) -> Result<()> {
    let config_path = config.unwrap_or(Path::new("saldo.toml"));
    let settings = ExtractionSettings::from_path(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let pdf_bytes = tokio::fs::read(pdf)
        .await
        .with_context(|| format!("reading {}", pdf.display()))?;

    let result = match settings.mode()? {
        ProviderMode::Single(provider) => {
            run_extraction(chat_provider(provider)?, &pdf_bytes).await
        }
        ProviderMode::Composite { ocr, statement } => {
            let provider =
                CompositeProvider::new(chat_provider(ocr)?, chat_provider(statement)?)?;
            run_extraction(provider, &pdf_bytes).await
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn chat_provider(settings: &ProviderSettings) -> Result<ChatCompletionsProvider> {
    ChatCompletionsProvider::new(
        settings.name.as_str(),
        settings.base_url.as_str(),
        settings.api_key.as_str(),
        settings.ocr_model_list(),
        settings.statement_model_list(),
    )
    .with_context(|| format!("building provider {}", settings.name))
}

async fn run_extraction<P: ExtractionProvider>(provider: P, pdf: &[u8]) -> ExtractionResult {
    StatementExtractor::new(provider).extract(pdf).await
}

pub async fn fetch_rates(db: Option<PathBuf>, url: Option<String>) -> Result<()> {
    let fetcher = match url {
        Some(url) => RateFetcher::new(url),
        None => RateFetcher::default(),
    };
    let quote = fetcher.fetch().await.context("fetching quote")?;

    let pool = open_db(db).await?;
    let mut conn = pool.acquire().await?;
    let stored = upsert_rate(&mut conn, &quote).await?;

    println!(
        "Stored {} quote for {}: buy {} / sell {}",
        stored.source, stored.rate_date, stored.buy_rate, stored.sell_rate
    );
    Ok(())
}

pub async fn convert(
    amount: Decimal,
    from: &str,
    to: &str,
    date: Option<NaiveDate>,
    db: Option<PathBuf>,
) -> Result<()> {
    let from = Currency::new(from)?;
    let to = Currency::new(to)?;
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    let pool = open_db(db).await?;
    let mut conn = pool.acquire().await?;
    let conversion = convert_amount(&mut conn, amount, &from, &to, date).await?;

    println!(
        "{amount} {from} = {:.2} {to} (rate {} from {})",
        conversion.amount, conversion.rate, conversion.rate_date
    );
    Ok(())
}

pub async fn rates(start: NaiveDate, end: NaiveDate, db: Option<PathBuf>) -> Result<()> {
    let pool = open_db(db).await?;
    let mut conn = pool.acquire().await?;
    let rows = get_rates_in_range(&mut conn, start, end).await?;

    if rows.is_empty() {
        println!("No rates stored between {start} and {end}");
        return Ok(());
    }
    for rate in rows {
        println!(
            "{}  buy {:>12.2}  sell {:>12.2}  {} (fetched {})",
            rate.rate_date,
            rate.buy_rate,
            rate.sell_rate,
            rate.source,
            rate.fetched_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn open_db(db: Option<PathBuf>) -> Result<DbPool> {
    let path = match db {
        Some(path) => path,
        None => default_db_path()?,
    };
    tracing::debug!("Using database {}", path.display());
    create_db(&path)
        .await
        .with_context(|| format!("opening database {}", path.display()))
}

fn default_db_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "saldo", "Saldo")
        .context("could not determine a data directory")?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;
    Ok(data_dir.join("saldo.db"))
}
