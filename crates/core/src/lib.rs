pub mod money;
pub mod statement;

pub use money::{Currency, Money, MoneyError};
pub use statement::{
    ExtractedCard, ExtractedCycle, ExtractedStatement, ExtractedTransaction, InstallmentInfo,
    StatementError,
};
