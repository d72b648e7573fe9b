//! UTXO ledger engine.
//!
//! - [`TransferBuilder`] validates and applies transfers: signature check,
//!   idempotency on `(sender, nonce)`, FIFO coin selection, atomic spend and mint.
//! - [`BlockMiner`] seals an explicit batch of pending transactions into a
//!   proof-of-work block appended at the chain tip.
//! - [`ChainValidator`] replays the chain and reports every hash, link and
//!   Merkle-root mismatch it finds.
//! - [`levy`] mints the periodic system-issued levy transactions.
//!
//! Every component receives its store handle at construction; all multi-step
//! mutations run inside one store write transaction.

pub mod dto;
pub mod error;
pub mod explorer;
pub mod header;
pub mod ids;
pub mod levy;
pub mod merkle;
pub mod miner;
pub mod ownership;
pub mod transfer;
pub mod validator;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::LedgerError;
pub use explorer::Explorer;
pub use header::{format_timestamp, BlockHeader};
pub use levy::{mint_levies, LevyEntry, LevyPolicy};
pub use merkle::{merkle_root, tx_merkle_root};
pub use miner::{BlockMiner, SealedBlock};
pub use ownership::{OwnershipCheck, StoreOwnership};
pub use transfer::{
    canonical_payload, effective_fee, TransferBuilder, TransferOutcome, MAX_NONCE_LEN,
};
pub use validator::{ChainValidator, ValidationReport};
pub use wallet::{fund_wallet, register_wallet};
