//! Unspent transaction output records.

use serde::{Deserialize, Serialize};
use tally_types::{Amount, Timestamp, TxId, UtxoId, WalletId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoRecord {
    pub id: UtxoId,
    pub wallet: WalletId,
    pub amount: Amount,
    /// Once set, never cleared.
    pub spent: bool,
    /// Transaction that produced this output; `None` for external funding.
    pub source_tx: Option<TxId>,
    pub output_index: u32,
    pub created_at: Timestamp,
    /// Creation-order sequence number assigned by the store.
    pub seq: u64,
}
