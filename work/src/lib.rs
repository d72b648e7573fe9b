//! Proof-of-work for sealing blocks.
//!
//! A block is sealed by finding the smallest nonce for which
//! `SHA-256(header_prefix ++ decimal(nonce))` starts with `difficulty`
//! zero hex digits. The search is CPU-bound, runs on a dedicated rayon pool
//! and can be aborted through a [`CancelToken`].

pub mod cancel;
pub mod error;
pub mod generator;
pub mod validator;

pub use cancel::CancelToken;
pub use error::WorkError;
pub use generator::WorkGenerator;
pub use validator::{hash_with_nonce, validate_work};

use tally_types::BlockHash;

/// Highest meaningful difficulty: a SHA-256 digest has 64 hex digits.
pub const MAX_DIFFICULTY: u32 = 64;

/// The result of a successful search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkSolution {
    pub nonce: u64,
    pub hash: BlockHash,
}
