use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use saldo_storage::NewExchangeRate;
use serde::Deserialize;

use crate::convert::FxError;

/// Official USD/ARS quote endpoint.
pub const DEFAULT_RATE_URL: &str = "https://dolarapi.com/v1/dolares/oficial";

/// Wire shape of the quote endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RateQuote {
    pub compra: Decimal,
    pub venta: Decimal,
    pub casa: String,
    #[serde(rename = "fechaActualizacion")]
    pub fecha_actualizacion: DateTime<Utc>,
}

/// Maps a wire quote into the insert shape. `rate_date` is the UTC calendar
/// date the source last updated the quote; `fetched_at` is when we pulled it.
pub fn map_quote(quote: RateQuote, fetched_at: DateTime<Utc>) -> NewExchangeRate {
    NewExchangeRate {
        rate_date: quote.fecha_actualizacion.date_naive(),
        buy_rate: quote.compra,
        sell_rate: quote.venta,
        source: quote.casa,
        fetched_at,
    }
}

pub struct RateFetcher {
    client: reqwest::Client,
    url: String,
}

impl RateFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub async fn fetch(&self) -> Result<NewExchangeRate, FxError> {
        tracing::debug!(url = %self.url, "fetching exchange rate");
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FxError::Fetch {
                status: status.as_u16(),
                body,
            });
        }

        let quote: RateQuote = response.json().await?;
        Ok(map_quote(quote, Utc::now()))
    }
}

impl Default for RateFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_URL)
    }
}
