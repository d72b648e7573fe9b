//! Header hashing with a trial nonce, and single-shot work validation.

use tally_crypto::sha256_multi;
use tally_types::BlockHash;

/// Render `n` as ASCII decimal into `buf`, returning the used tail.
fn decimal(mut n: u64, buf: &mut [u8; 20]) -> &[u8] {
    let mut pos = buf.len();
    loop {
        pos -= 1;
        buf[pos] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    &buf[pos..]
}

/// `SHA-256(prefix ++ decimal(nonce))`.
pub fn hash_with_nonce(prefix: &[u8], nonce: u64) -> BlockHash {
    let mut buf = [0u8; 20];
    BlockHash::new(sha256_multi(&[prefix, decimal(nonce, &mut buf)]))
}

/// Whether `nonce` satisfies `difficulty` for the given header prefix.
pub fn validate_work(prefix: &[u8], nonce: u64, difficulty: u32) -> bool {
    hash_with_nonce(prefix, nonce).meets_difficulty(difficulty)
}
