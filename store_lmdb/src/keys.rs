//! Binary key layouts.
//!
//! Composite keys are `id(32) ++ seq(8, big-endian)` so a prefix scan over
//! one identifier yields entries in creation order.

pub(crate) const NEXT_SEQ_KEY: &[u8] = b"next_seq";

pub(crate) fn seq_key(seq: u64) -> [u8; 8] {
    seq.to_be_bytes()
}

pub(crate) fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

pub(crate) fn composite(prefix: &[u8; 32], seq: u64) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..32].copy_from_slice(prefix);
    key[32..].copy_from_slice(&seq.to_be_bytes());
    key
}

pub(crate) fn nonce_key(sender: &[u8; 32], nonce: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(32 + nonce.len());
    key.extend_from_slice(sender);
    key.extend_from_slice(nonce.as_bytes());
    key
}

/// Smallest key greater than every key starting with `prefix`, or `None`
/// if no such key exists (empty or all-`0xff` prefix).
pub(crate) fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < 0xff {
            upper.push(last + 1);
            return Some(upper);
        }
    }
    None
}
