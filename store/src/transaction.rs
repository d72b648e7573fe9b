//! Transaction records.

use serde::{Deserialize, Serialize};
use tally_types::{Amount, BlockId, Provenance, Timestamp, TxId, TxStatus, UtxoId, WalletId};

/// An output created by a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub utxo: UtxoId,
    pub wallet: WalletId,
    pub amount: Amount,
    pub index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TxId,
    pub from: WalletId,
    pub to: WalletId,
    pub amount: Amount,
    pub fee: Amount,
    /// Client-supplied idempotency key, unique per sender.
    pub nonce: String,
    /// Timestamp text exactly as bound into the signed payload.
    pub timestamp: String,
    pub note: String,
    pub provenance: Provenance,
    pub status: TxStatus,
    pub block_id: Option<BlockId>,
    /// Consumed UTXOs, in selection order.
    pub inputs: Vec<UtxoId>,
    pub outputs: Vec<TxOutput>,
    pub created_at: Timestamp,
    /// Creation-order sequence number assigned by the store.
    pub seq: u64,
}

impl TransactionRecord {
    /// Change returned to the sender, if any.
    pub fn change(&self) -> Amount {
        self.outputs
            .iter()
            .filter(|o| o.index > 0)
            .map(|o| o.amount)
            .sum()
    }
}
