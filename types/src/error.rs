//! Parsing errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid {kind} id: {value:?}")]
    InvalidId { kind: &'static str, value: String },

    #[error("invalid signature scalar: {0:?}")]
    InvalidScalar(String),

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),
}
