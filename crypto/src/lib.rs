//! Cryptographic primitives for the tally ledger.
//!
//! - **SHA-256** for Merkle nodes, block headers and identifiers
//! - **ECDSA P-256** for transfer signatures (signature as `(r, s)` scalars)
//! - **AES-256-GCM** for sealing wallet private keys at rest
//!
//! Everything here is a pure function over bytes; no state is kept.

pub mod encryption;
pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use encryption::{open_secret, seal_secret};
pub use error::CryptoError;
pub use hash::{sha256, sha256_hex, sha256_multi};
pub use keys::{
    derive_wallet_id, generate_keypair, keypair_from_seed, parse_public_key, signing_key_from_bytes,
    WalletKeys,
};
pub use sign::{sign_payload, verify_signature};
