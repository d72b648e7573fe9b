//! Wallet records.

use serde::{Deserialize, Serialize};
use tally_types::{Timestamp, WalletId};

/// A registered wallet. Immutable once created; balance is derived from UTXOs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: WalletId,
    /// Identifier of the owning user (authenticated principal).
    pub owner: String,
    /// SEC1-encoded P-256 public key.
    pub public_key: Vec<u8>,
    /// Private key sealed with AES-GCM; opaque to the ledger.
    pub encrypted_private_key: Vec<u8>,
    pub created_at: Timestamp,
}
