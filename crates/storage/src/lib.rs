pub mod db;
pub mod rates;

pub use db::{create_db, DbPool};
pub use rates::{
    get_closest_rate, get_latest_rate, get_rate_for_date, get_rates_in_range, upsert_rate,
    ExchangeRate, NewExchangeRate,
};
