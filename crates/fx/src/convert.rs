use chrono::NaiveDate;
use rust_decimal::Decimal;
use saldo_core::{Currency, Money};
use saldo_storage::get_closest_rate;
use serde::Serialize;
use sqlx::SqliteConnection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FxError {
    #[error("No exchange rate available for {from}/{to} on {date}")]
    RateNotAvailable {
        from: Currency,
        to: Currency,
        date: NaiveDate,
    },
    #[error("Could not convert {currency} balance: {source}")]
    Balance {
        currency: Currency,
        #[source]
        source: Box<FxError>,
    },
    #[error("Rate endpoint returned HTTP {status}: {body}")]
    Fetch { status: u16, body: String },
    #[error("Rate endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Outcome of a single conversion: the rounded target-currency amount, the
/// multiplier that was applied, and the date of the quote it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub amount: Decimal,
    pub rate: Decimal,
    pub rate_date: NaiveDate,
}

struct AppliedRate {
    multiplier: Decimal,
    rate_date: NaiveDate,
}

/// Converts `amount` from one currency to another using the stored quote
/// closest to `target_date`. Same-currency conversion is the identity and
/// never touches the repository. The result satisfies
/// `amount_out == (amount_in * rate).round_dp(2)`.
pub async fn convert_amount(
    conn: &mut SqliteConnection,
    amount: Decimal,
    from: &Currency,
    to: &Currency,
    target_date: NaiveDate,
) -> Result<Conversion, FxError> {
    if from == to {
        return Ok(Conversion {
            amount: amount.round_dp(2),
            rate: Decimal::ONE,
            rate_date: target_date,
        });
    }

    let applied = lookup_multiplier(conn, from, to, target_date).await?;
    tracing::debug!(
        %from,
        %to,
        rate = %applied.multiplier,
        rate_date = %applied.rate_date,
        "applying exchange rate"
    );

    Ok(Conversion {
        amount: (amount * applied.multiplier).round_dp(2),
        rate: applied.multiplier,
        rate_date: applied.rate_date,
    })
}

fn rate_not_available(from: &Currency, to: &Currency, date: NaiveDate) -> FxError {
    FxError::RateNotAvailable {
        from: from.clone(),
        to: to.clone(),
        date,
    }
}

/// Resolves the multiplier for a currency pair. The stored table quotes a
/// single pair (USD priced in ARS); everything else is unsupported.
async fn lookup_multiplier(
    conn: &mut SqliteConnection,
    from: &Currency,
    to: &Currency,
    date: NaiveDate,
) -> Result<AppliedRate, FxError> {
    let quote = match (from.code(), to.code()) {
        ("USD", "ARS") | ("ARS", "USD") => get_closest_rate(conn, date).await?,
        _ => None,
    };
    let quote = quote.ok_or_else(|| rate_not_available(from, to, date))?;

    // A zero quote is unusable in either direction.
    if quote.sell_rate.is_zero() {
        return Err(rate_not_available(from, to, date));
    }

    let multiplier = if from.code() == "USD" {
        quote.sell_rate
    } else {
        Decimal::ONE / quote.sell_rate
    };

    Ok(AppliedRate {
        multiplier,
        rate_date: quote.rate_date,
    })
}

/// Converts a list of balances into `to`, preserving input order. The first
/// balance that cannot be converted aborts the whole batch; a partial total
/// would be worse than a visible failure.
pub async fn convert_amounts(
    conn: &mut SqliteConnection,
    balances: &[Money],
    to: &Currency,
    target_date: NaiveDate,
) -> Result<Vec<Conversion>, FxError> {
    let mut out = Vec::with_capacity(balances.len());
    for balance in balances {
        let converted = convert_amount(conn, balance.amount, &balance.currency, to, target_date)
            .await
            .map_err(|e| FxError::Balance {
                currency: balance.currency.clone(),
                source: Box::new(e),
            })?;
        out.push(converted);
    }
    Ok(out)
}

/// Sums a batch conversion into a single target-currency amount.
pub async fn total_in(
    conn: &mut SqliteConnection,
    balances: &[Money],
    to: &Currency,
    target_date: NaiveDate,
) -> Result<Money, FxError> {
    let conversions = convert_amounts(conn, balances, to, target_date).await?;
    let total: Decimal = conversions.iter().map(|c| c.amount).sum();
    Ok(Money::new(total, to.clone()))
}
