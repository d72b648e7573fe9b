//! Block header preimage.
//!
//! The hash of a block is `sha256` over
//! `"{height}|{prev}|{timestamp}|{merkle_root}|{ids}|{nonce}"` where `prev` is
//! `"0"` for the genesis link, `timestamp` is RFC 3339 UTC at second precision
//! and `ids` are the transaction ids joined by `,` in sealing order.

use chrono::{DateTime, SecondsFormat};

use tally_types::{BlockHash, Timestamp, TxId};
use tally_work::hash_with_nonce;

use crate::LedgerError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: u64,
    pub prev_hash: BlockHash,
    pub timestamp: Timestamp,
    pub merkle_root: String,
    pub tx_ids: Vec<TxId>,
}

impl BlockHeader {
    /// Everything in the preimage before the nonce, including the trailing `|`.
    pub fn preimage_prefix(&self) -> Result<String, LedgerError> {
        let timestamp = format_timestamp(self.timestamp).ok_or_else(|| {
            LedgerError::Validation(format!("timestamp {} is out of range", self.timestamp))
        })?;
        let ids = self
            .tx_ids
            .iter()
            .map(TxId::to_hex)
            .collect::<Vec<_>>()
            .join(",");
        Ok(format!(
            "{}|{}|{}|{}|{}|",
            self.height,
            self.prev_hash.to_link_string(),
            timestamp,
            self.merkle_root,
            ids
        ))
    }

    pub fn hash(&self, nonce: u64) -> Result<BlockHash, LedgerError> {
        Ok(hash_with_nonce(self.preimage_prefix()?.as_bytes(), nonce))
    }
}

/// RFC 3339 UTC rendering with whole seconds, e.g. `2024-01-02T03:04:05Z`.
pub fn format_timestamp(ts: Timestamp) -> Option<String> {
    let secs = i64::try_from(ts.as_secs()).ok()?;
    let dt = DateTime::from_timestamp(secs, 0)?;
    Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}
