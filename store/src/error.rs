use thiserror::Error;

/// Failures surfaced by a [`LedgerStore`](crate::LedgerStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An insert-once record (block height, wallet id, ...) already exists.
    #[error("record already stored: {0}")]
    Duplicate(String),

    #[error("ledger store backend failed: {0}")]
    Backend(String),

    #[error("could not encode or decode ledger record: {0}")]
    Serialization(String),

    /// An index points at a record that is missing or unreadable.
    #[error("ledger store is inconsistent: {0}")]
    Corruption(String),
}
