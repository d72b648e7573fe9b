//! Block records.

use serde::{Deserialize, Serialize};
use tally_types::{BlockHash, BlockId, Timestamp};

/// A sealed block. Append-only: never updated or deleted once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: BlockId,
    pub height: u64,
    /// [`BlockHash::ZERO`] for the genesis block.
    pub prev_hash: BlockHash,
    pub hash: BlockHash,
    pub nonce: u64,
    /// Required number of leading zero hex digits in `hash`.
    pub difficulty: u32,
    /// Hex Merkle root over the block's transaction ids.
    pub merkle_root: String,
    /// Sealing time; exactly the value bound into `hash`.
    pub timestamp: Timestamp,
}
