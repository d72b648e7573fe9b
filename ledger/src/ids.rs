//! Identifier derivation.
//!
//! Identifiers are SHA-256 digests over a domain tag and the fields that make
//! the entity unique, so a transaction id is a pure function of
//! `(sender, nonce)` and a UTXO id of its producing output.

use tally_crypto::sha256_multi;
use tally_types::{BlockHash, BlockId, TxId, UtxoId, WalletId};

pub fn tx_id(sender: &WalletId, nonce: &str) -> TxId {
    TxId::new(sha256_multi(&[
        b"tx:",
        sender.as_bytes(),
        b"|",
        nonce.as_bytes(),
    ]))
}

pub fn output_utxo_id(tx: &TxId, index: u32) -> UtxoId {
    UtxoId::new(sha256_multi(&[b"utxo:", tx.as_bytes(), &index.to_be_bytes()]))
}

pub fn funding_utxo_id(wallet: &WalletId, seq: u64) -> UtxoId {
    UtxoId::new(sha256_multi(&[b"fund:", wallet.as_bytes(), &seq.to_be_bytes()]))
}

pub fn block_id(height: u64, hash: &BlockHash) -> BlockId {
    BlockId::new(sha256_multi(&[b"block:", &height.to_be_bytes(), hash.as_bytes()]))
}
