use bzk_domain::{PeriodId, TransactionId};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid limit: {0} (limit must be zero or more)")]
    InvalidLimit(Decimal),
    #[error("Invalid amount: {0} (amount must be greater than zero)")]
    InvalidAmount(Decimal),
    #[error("No active budget period")]
    NoActivePeriod,
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),
    #[error("Period not found: {0}")]
    PeriodNotFound(PeriodId),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Snapshot schema v{found} is newer than supported v{supported}")]
    UnsupportedSchema { found: u8, supported: u8 },
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

impl CoreError {
    /// True for the caller-facing validation failures that never touch state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidLimit(_)
                | CoreError::InvalidAmount(_)
                | CoreError::NoActivePeriod
                | CoreError::TransactionNotFound(_)
                | CoreError::PeriodNotFound(_)
        )
    }
}
