//! JSON request and response shapes.
//!
//! Identifiers are lowercase hex; timestamps are RFC 3339 text.

use serde::{Deserialize, Serialize};

use tally_store::{BlockRecord, TransactionRecord, TxOutput, UtxoRecord, WalletRecord};
use tally_types::{Provenance, Timestamp};

use crate::header::format_timestamp;
use crate::miner::SealedBlock;
use crate::validator::ValidationReport;

/// A user-signed transfer as submitted by clients.
///
/// The signature covers [`crate::canonical_payload`] built from
/// `from`, `to`, `amount`, `timestamp` and `note`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<i64>,
    pub nonce: String,
    pub timestamp: String,
    #[serde(default)]
    pub note: String,
    pub signature_r: String,
    pub signature_s: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputView {
    pub wallet: String,
    pub amount: u64,
    pub index: u32,
}

impl From<&TxOutput> for OutputView {
    fn from(o: &TxOutput) -> Self {
        Self {
            wallet: o.wallet.to_hex(),
            amount: o.amount.raw(),
            index: o.index,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResponse {
    pub tx_id: String,
    pub status: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<OutputView>,
}

impl From<&TransactionRecord> for TransferResponse {
    fn from(tx: &TransactionRecord) -> Self {
        Self {
            tx_id: tx.id.to_hex(),
            status: tx.status.as_str().to_string(),
            inputs: tx.inputs.iter().map(|u| u.to_hex()).collect(),
            outputs: tx.outputs.iter().map(OutputView::from).collect(),
        }
    }
}

/// Parameters of a "commit pending transactions" call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Upper bound on the batch size; `0` takes every pending transaction.
    #[serde(default)]
    pub max_tx: usize,
    /// Overrides the configured difficulty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCommitResponse {
    pub block_id: String,
    pub height: u64,
    pub prev_hash: String,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub tx_ids: Vec<String>,
    pub count: usize,
    pub timestamp: String,
}

impl From<&SealedBlock> for BlockCommitResponse {
    fn from(sealed: &SealedBlock) -> Self {
        let b = &sealed.block;
        Self {
            block_id: b.id.to_hex(),
            height: b.height,
            prev_hash: b.prev_hash.to_link_string(),
            hash: b.hash.to_hex(),
            nonce: b.nonce,
            difficulty: b.difficulty,
            tx_ids: sealed.tx_ids.iter().map(|t| t.to_hex()).collect(),
            count: sealed.tx_ids.len(),
            timestamp: render_time(b.timestamp),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub checked_blocks: u64,
    pub errors: Vec<String>,
    /// `-1` for an empty chain.
    pub last_height: i64,
    /// `"0"` for an empty chain.
    pub last_hash: String,
}

impl From<&ValidationReport> for ValidationResponse {
    fn from(r: &ValidationReport) -> Self {
        Self {
            valid: r.valid,
            checked_blocks: r.checked_blocks,
            errors: r.errors.clone(),
            last_height: r
                .last_height
                .and_then(|h| i64::try_from(h).ok())
                .unwrap_or(-1),
            last_hash: r
                .last_hash
                .map(|h| h.to_hex())
                .unwrap_or_else(|| "0".to_string()),
        }
    }
}

/// A registered wallet. The sealed private key is never exposed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletView {
    pub wallet: String,
    pub owner: String,
    /// SEC1 uncompressed public key, hex.
    pub public_key: String,
    pub created_at: String,
}

impl From<&WalletRecord> for WalletView {
    fn from(w: &WalletRecord) -> Self {
        Self {
            wallet: w.id.to_hex(),
            owner: w.owner.clone(),
            public_key: hex::encode(&w.public_key),
            created_at: render_time(w.created_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalanceView {
    pub wallet: String,
    pub owner: String,
    pub balance: u64,
    pub unspent_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoView {
    pub id: String,
    pub wallet: String,
    pub amount: u64,
    pub spent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tx: Option<String>,
    pub output_index: u32,
    pub created_at: String,
}

impl From<&UtxoRecord> for UtxoView {
    fn from(u: &UtxoRecord) -> Self {
        Self {
            id: u.id.to_hex(),
            wallet: u.wallet.to_hex(),
            amount: u.amount.raw(),
            spent: u.spent,
            source_tx: u.source_tx.map(|t| t.to_hex()),
            output_index: u.output_index,
            created_at: render_time(u.created_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputView {
    pub utxo: String,
    pub amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub tx_id: String,
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub fee: u64,
    pub change: u64,
    pub nonce: String,
    pub timestamp: String,
    pub note: String,
    pub provenance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_r: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_s: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    pub inputs: Vec<InputView>,
    pub outputs: Vec<OutputView>,
    pub created_at: String,
}

impl TransactionView {
    /// `inputs` carries the spent UTXOs resolved by the caller.
    pub fn new(tx: &TransactionRecord, inputs: Vec<InputView>) -> Self {
        let reason = match &tx.provenance {
            Provenance::SystemIssued { reason } => Some(reason.clone()),
            Provenance::UserSigned { .. } => None,
        };
        let signature = tx.provenance.signature();
        Self {
            tx_id: tx.id.to_hex(),
            from: tx.from.to_hex(),
            to: tx.to.to_hex(),
            amount: tx.amount.raw(),
            fee: tx.fee.raw(),
            change: tx.change().raw(),
            nonce: tx.nonce.clone(),
            timestamp: tx.timestamp.clone(),
            note: tx.note.clone(),
            provenance: tx.provenance.kind().to_string(),
            reason,
            signature_r: signature.map(|s| s.r_hex()),
            signature_s: signature.map(|s| s.s_hex()),
            status: tx.status.as_str().to_string(),
            block_id: tx.block_id.map(|b| b.to_hex()),
            inputs,
            outputs: tx.outputs.iter().map(OutputView::from).collect(),
            created_at: render_time(tx.created_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockView {
    pub block_id: String,
    pub height: u64,
    pub prev_hash: String,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub merkle_root: String,
    pub timestamp: String,
    pub tx_ids: Vec<String>,
}

impl BlockView {
    pub fn new(block: &BlockRecord, txs: &[TransactionRecord]) -> Self {
        Self {
            block_id: block.id.to_hex(),
            height: block.height,
            prev_hash: block.prev_hash.to_link_string(),
            hash: block.hash.to_hex(),
            nonce: block.nonce,
            difficulty: block.difficulty,
            merkle_root: block.merkle_root.clone(),
            timestamp: render_time(block.timestamp),
            tx_ids: txs.iter().map(|t| t.id.to_hex()).collect(),
        }
    }
}

fn render_time(ts: Timestamp) -> String {
    format_timestamp(ts).unwrap_or_else(|| ts.as_secs().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::BlockHash;

    #[test]
    fn transfer_request_defaults() {
        let json = r#"{"from":"a","to":"b","amount":5,"nonce":"n","timestamp":"t",
                       "signature_r":"1","signature_s":"2"}"#;
        let req: TransferRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.fee, None);
        assert_eq!(req.note, "");
    }

    #[test]
    fn empty_chain_report_renders_sentinels() {
        let report = ValidationReport {
            valid: true,
            checked_blocks: 0,
            errors: vec![],
            last_height: None,
            last_hash: None,
            system_transactions: 0,
            user_transactions: 0,
        };
        let resp = ValidationResponse::from(&report);
        assert_eq!(resp.last_height, -1);
        assert_eq!(resp.last_hash, "0");

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["last_height"], -1);
    }

    #[test]
    fn populated_report_renders_tip() {
        let report = ValidationReport {
            valid: false,
            checked_blocks: 2,
            errors: vec!["block 1 hash mismatch".into()],
            last_height: Some(1),
            last_hash: Some(BlockHash::new([0xab; 32])),
            system_transactions: 0,
            user_transactions: 2,
        };
        let resp = ValidationResponse::from(&report);
        assert_eq!(resp.last_height, 1);
        assert_eq!(resp.last_hash, "ab".repeat(32));
        assert!(!resp.valid);
    }

    #[test]
    fn commit_request_defaults_to_all_pending() {
        let req: CommitRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, CommitRequest::default());
    }
}
