//! LMDB storage backend for the tally ledger.
//!
//! Implements the `tally-store` traits using the `heed` LMDB bindings.
//! Records live in one set of named databases inside a single environment;
//! secondary indexes map composite binary keys to 32-byte identifiers.
//!
//! LMDB admits exactly one write transaction at a time, which is what makes
//! UTXO selection-and-spend and tip-check-and-append serializable.

pub mod environment;
pub mod error;
mod keys;
mod read;
pub mod txn;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use txn::{LmdbReadTxn, LmdbWriteTxn};
