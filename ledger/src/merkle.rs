//! Merkle root over transaction ids.
//!
//! Leaves are `hex(sha256(id))`. A parent is `hex(sha256(left_hex ++ right_hex))`
//! computed over the hex *text* of its children, and an odd node at the end of
//! a level is paired with itself. The root of an empty list is the empty string.

use tally_crypto::sha256_hex;
use tally_types::TxId;

/// Merkle root of `ids` in the given order.
pub fn merkle_root<S: AsRef<str>>(ids: &[S]) -> String {
    if ids.is_empty() {
        return String::new();
    }
    let mut level: Vec<String> = ids
        .iter()
        .map(|id| sha256_hex(id.as_ref().as_bytes()))
        .collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                sha256_hex(format!("{left}{right}").as_bytes())
            })
            .collect();
    }
    level.pop().unwrap_or_default()
}

/// Merkle root over transaction ids rendered as lowercase hex.
pub fn tx_merkle_root(ids: &[TxId]) -> String {
    let hex: Vec<String> = ids.iter().map(TxId::to_hex).collect();
    merkle_root(&hex)
}
