pub mod convert;
pub mod fetch;

pub use convert::{convert_amount, convert_amounts, total_in, Conversion, FxError};
pub use fetch::{map_quote, RateFetcher, RateQuote, DEFAULT_RATE_URL};
