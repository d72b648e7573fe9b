use thiserror::Error;

use tally_store::StoreError;
use tally_types::{Amount, TypesError, WalletId};
use tally_work::WorkError;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: wallet {wallet} is not owned by {principal}")]
    Authorization { wallet: WalletId, principal: String },

    #[error("signature verification failed")]
    Signature,

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Amount, available: Amount },

    #[error("{0} not found")]
    NotFound(String),

    /// Store failure; the surrounding write scope was rolled back.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("mining cancelled")]
    Cancelled,

    #[error("chain tip moved while sealing (expected height {expected:?}, found {actual:?})")]
    StaleTip {
        expected: Option<u64>,
        actual: Option<u64>,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TypesError> for LedgerError {
    fn from(e: TypesError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<WorkError> for LedgerError {
    fn from(e: WorkError) -> Self {
        match e {
            WorkError::Cancelled => Self::Cancelled,
            WorkError::DifficultyOutOfRange { .. } => Self::Validation(e.to_string()),
            WorkError::ThreadPool(msg) => Self::Internal(msg),
        }
    }
}
