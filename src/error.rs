use crate::domain::transaction::TransactionStatus;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error taxonomy for the ledger and orchestration layers.
///
/// `ConcurrencyConflict` is transient and absorbed by the ledger's internal
/// retry loop; it only escapes after the retry budget is exhausted. All other
/// variants are terminal for the attempt that produced them.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(
        "Insufficient funds in wallet {wallet_id}: requested {requested}, available {available}"
    )]
    InsufficientFunds {
        wallet_id: Uuid,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Concurrent modification of wallet {0}")]
    ConcurrencyConflict(Uuid),

    #[error("Duplicate transaction reference: {0}")]
    DuplicateReference(String),

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Event delivery failed: {0}")]
    Delivery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Coarse machine-readable code carried on `TransactionFailed` events.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            LedgerError::DuplicateReference(_) => "DUPLICATE_REFERENCE",
            LedgerError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LedgerError::Validation(_) => "VALIDATION",
            LedgerError::Timeout(_) => "TIMEOUT",
            LedgerError::Delivery(_) => "DELIVERY_FAILURE",
            LedgerError::Storage(_) | LedgerError::Csv(_) | LedgerError::Io(_) => "STORAGE",
        }
    }
}
