use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatementError {
    #[error("Statement has no current balance")]
    MissingCurrentBalance,
    #[error("Invalid installment {current}/{total} on '{merchant}'")]
    InvalidInstallment {
        merchant: String,
        current: u32,
        total: u32,
    },
}

/// Position within an installment plan, e.g. 3/12 ("cuota 3 de 12").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentInfo {
    pub current: u32,
    pub total: u32,
}

impl InstallmentInfo {
    pub fn is_valid(&self) -> bool {
        self.current >= 1 && self.total >= 1 && self.current <= self.total
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTransaction {
    pub date: NaiveDate,
    pub merchant: String,
    /// Voucher/receipt number as printed on the statement, when legible.
    #[serde(default)]
    pub coupon: Option<String>,
    pub amount: Money,
    #[serde(default)]
    pub installment: Option<InstallmentInfo>,
}

/// A billing cycle. `start <= end <= due_date` is what statements normally
/// print, but the model does not enforce it; consumers treat the dates as
/// extracted text, not ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractedCycle {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub next_cycle_start: Option<NaiveDate>,
}

/// Best-effort card identification; statements often mask or omit both fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedCard {
    #[serde(default)]
    pub last_four: Option<String>,
    #[serde(default)]
    pub holder_name: Option<String>,
}

/// The structured result of parsing one statement PDF.
///
/// Balances are lists because Argentine card statements carry separate peso and
/// dollar columns for the same statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedStatement {
    pub statement_id: String,
    #[serde(default)]
    pub card: Option<ExtractedCard>,
    pub period: ExtractedCycle,
    #[serde(default)]
    pub previous_balance: Vec<Money>,
    pub current_balance: Vec<Money>,
    #[serde(default)]
    pub minimum_payment: Vec<Money>,
    #[serde(default)]
    pub credit_limit: Option<Money>,
    #[serde(default)]
    pub transactions: Vec<ExtractedTransaction>,
}

impl ExtractedStatement {
    /// Shape checks beyond what deserialization guarantees: a statement with no
    /// current balance is unusable, and installment counters must be coherent.
    pub fn validate(&self) -> Result<(), StatementError> {
        if self.current_balance.is_empty() {
            return Err(StatementError::MissingCurrentBalance);
        }
        for tx in &self.transactions {
            if let Some(inst) = &tx.installment {
                if !inst.is_valid() {
                    return Err(StatementError::InvalidInstallment {
                        merchant: tx.merchant.clone(),
                        current: inst.current,
                        total: inst.total,
                    });
                }
            }
        }
        Ok(())
    }
}
