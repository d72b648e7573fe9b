//! Block identifiers and block hashes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::hash::id_type;
use crate::TypesError;

id_type!(
    /// Block identifier, derived from the block's height and hash.
    BlockId,
    "block"
);

id_type!(
    /// A 32-byte SHA-256 block hash.
    ///
    /// [`BlockHash::ZERO`] is the genesis link: the `prev_hash` of the block at height 0.
    BlockHash,
    "block hash"
);

impl Default for BlockHash {
    fn default() -> Self {
        Self::ZERO
    }
}

impl BlockHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Text used inside block header preimages and API responses.
    ///
    /// The genesis link renders as `"0"`, every other hash as 64 hex digits.
    pub fn to_link_string(&self) -> String {
        if self.is_zero() {
            "0".to_string()
        } else {
            self.to_hex()
        }
    }

    /// Number of leading `'0'` characters in the hex rendering.
    pub fn leading_zero_digits(&self) -> u32 {
        let mut count = 0;
        for byte in &self.0 {
            if *byte == 0 {
                count += 2;
            } else {
                if *byte < 0x10 {
                    count += 1;
                }
                break;
            }
        }
        count
    }

    /// Whether the hex rendering starts with at least `difficulty` zero digits.
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.leading_zero_digits() >= difficulty
    }
}
