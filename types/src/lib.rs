//! Fundamental types for the tally ledger.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, block hashes, amounts, timestamps, signatures, and transaction state.

pub mod amount;
pub mod block;
pub mod error;
pub mod hash;
pub mod keys;
pub mod state;
pub mod time;

pub use amount::Amount;
pub use block::{BlockHash, BlockId};
pub use error::TypesError;
pub use hash::{TxId, UtxoId, WalletId};
pub use keys::Signature;
pub use state::{Provenance, TxStatus};
pub use time::{Clock, SystemClock, Timestamp};
