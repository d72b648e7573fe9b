//! Abstract storage traits for the tally ledger.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.
//!
//! All access goes through transactions. A [`ReadTxn`] sees one consistent
//! snapshot. A [`WriteTxn`] is exclusive (backends admit one writer at a
//! time), reads its own writes, and is rolled back if dropped without
//! [`WriteTxn::commit`]. Multi-step ledger mutations rely on this to be
//! all-or-nothing.

pub mod block;
pub mod error;
pub mod transaction;
pub mod utxo;
pub mod wallet;

pub use block::BlockRecord;
pub use error::StoreError;
pub use transaction::{TransactionRecord, TxOutput};
pub use utxo::UtxoRecord;
pub use wallet::WalletRecord;

use tally_types::{Amount, BlockId, TxId, UtxoId, WalletId};

/// Entry point of a storage backend.
pub trait LedgerStore: Send + Sync {
    /// Open a read-only snapshot.
    fn read_txn(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError>;

    /// Open the exclusive write scope. Blocks while another writer is active.
    fn write_txn(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError>;
}

/// Read access shared by snapshots and write scopes.
pub trait ReadTxn {
    fn get_wallet(&self, id: &WalletId) -> Result<Option<WalletRecord>, StoreError>;

    /// All wallets, ordered by identifier.
    fn wallets(&self) -> Result<Vec<WalletRecord>, StoreError>;

    fn get_utxo(&self, id: &UtxoId) -> Result<Option<UtxoRecord>, StoreError>;

    /// Every UTXO ever owned by `wallet`, oldest first.
    fn wallet_utxos(&self, wallet: &WalletId) -> Result<Vec<UtxoRecord>, StoreError>;

    /// Unspent UTXOs owned by `wallet`, oldest first.
    fn unspent_utxos(&self, wallet: &WalletId) -> Result<Vec<UtxoRecord>, StoreError> {
        let mut utxos = self.wallet_utxos(wallet)?;
        utxos.retain(|u| !u.spent);
        Ok(utxos)
    }

    /// Sum of the wallet's unspent UTXO amounts.
    fn balance(&self, wallet: &WalletId) -> Result<Amount, StoreError> {
        Ok(self.unspent_utxos(wallet)?.iter().map(|u| u.amount).sum())
    }

    fn get_transaction(&self, id: &TxId) -> Result<Option<TransactionRecord>, StoreError>;

    /// Look up the transaction a sender submitted under `nonce`.
    fn tx_by_nonce(&self, sender: &WalletId, nonce: &str) -> Result<Option<TxId>, StoreError>;

    /// Pending transactions, oldest first. `limit == 0` means no limit.
    fn pending_transactions(&self, limit: usize) -> Result<Vec<TransactionRecord>, StoreError>;

    /// Transactions sent or received by `wallet`, oldest first.
    fn wallet_transactions(&self, wallet: &WalletId)
        -> Result<Vec<TransactionRecord>, StoreError>;

    /// Transactions sealed in `block`, oldest first.
    fn block_transactions(&self, block: &BlockId) -> Result<Vec<TransactionRecord>, StoreError>;

    /// The chain tip.
    fn latest_block(&self) -> Result<Option<BlockRecord>, StoreError>;

    fn block_at_height(&self, height: u64) -> Result<Option<BlockRecord>, StoreError>;

    fn get_block(&self, id: &BlockId) -> Result<Option<BlockRecord>, StoreError>;

    /// Every block in ascending height order.
    fn blocks(&self) -> Result<Vec<BlockRecord>, StoreError>;
}

/// Exclusive read-write scope.
pub trait WriteTxn: ReadTxn {
    /// Allocate the next creation-order sequence number.
    fn next_sequence(&mut self) -> Result<u64, StoreError>;

    fn put_wallet(&mut self, wallet: &WalletRecord) -> Result<(), StoreError>;

    /// Insert a UTXO or update its `spent` flag.
    fn put_utxo(&mut self, utxo: &UtxoRecord) -> Result<(), StoreError>;

    /// Insert or update a transaction, maintaining the nonce, wallet,
    /// pending and block indexes from its current status.
    fn put_transaction(&mut self, tx: &TransactionRecord) -> Result<(), StoreError>;

    /// Append a block. Fails with [`StoreError::Duplicate`] if the height is taken.
    fn put_block(&mut self, block: &BlockRecord) -> Result<(), StoreError>;

    /// Make every write in this scope durable and visible.
    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
