//! Thread-safe in-memory ledger storage for tests.
//!
//! Writers take the store mutex for the lifetime of their [`WriteTxn`] and
//! work on a private copy, so concurrent writers serialize exactly like the
//! LMDB backend and an uncommitted scope leaves no trace.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use tally_store::{
    BlockRecord, LedgerStore, ReadTxn, StoreError, TransactionRecord, UtxoRecord, WalletRecord,
    WriteTxn,
};
use tally_types::{BlockId, TxId, TxStatus, UtxoId, WalletId};

#[derive(Clone, Default)]
struct MemLedger {
    wallets: BTreeMap<WalletId, WalletRecord>,
    utxos: HashMap<UtxoId, UtxoRecord>,
    transactions: HashMap<TxId, TransactionRecord>,
    nonces: HashMap<(WalletId, String), TxId>,
    blocks: BTreeMap<u64, BlockRecord>,
    next_seq: u64,
}

impl MemLedger {
    fn sorted_txs(&self, keep: impl Fn(&TransactionRecord) -> bool) -> Vec<TransactionRecord> {
        let mut txs: Vec<_> = self
            .transactions
            .values()
            .filter(|tx| keep(tx))
            .cloned()
            .collect();
        txs.sort_by_key(|tx| tx.seq);
        txs
    }
}

impl ReadTxn for MemLedger {
    fn get_wallet(&self, id: &WalletId) -> Result<Option<WalletRecord>, StoreError> {
        Ok(self.wallets.get(id).cloned())
    }

    fn wallets(&self) -> Result<Vec<WalletRecord>, StoreError> {
        Ok(self.wallets.values().cloned().collect())
    }

    fn get_utxo(&self, id: &UtxoId) -> Result<Option<UtxoRecord>, StoreError> {
        Ok(self.utxos.get(id).cloned())
    }

    fn wallet_utxos(&self, wallet: &WalletId) -> Result<Vec<UtxoRecord>, StoreError> {
        let mut utxos: Vec<_> = self
            .utxos
            .values()
            .filter(|u| &u.wallet == wallet)
            .cloned()
            .collect();
        utxos.sort_by_key(|u| u.seq);
        Ok(utxos)
    }

    fn get_transaction(&self, id: &TxId) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.transactions.get(id).cloned())
    }

    fn tx_by_nonce(&self, sender: &WalletId, nonce: &str) -> Result<Option<TxId>, StoreError> {
        Ok(self.nonces.get(&(*sender, nonce.to_string())).copied())
    }

    fn pending_transactions(&self, limit: usize) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut txs = self.sorted_txs(|tx| tx.status == TxStatus::Pending);
        if limit > 0 {
            txs.truncate(limit);
        }
        Ok(txs)
    }

    fn wallet_transactions(
        &self,
        wallet: &WalletId,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self.sorted_txs(|tx| &tx.from == wallet || &tx.to == wallet))
    }

    fn block_transactions(&self, block: &BlockId) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self.sorted_txs(|tx| tx.block_id.as_ref() == Some(block)))
    }

    fn latest_block(&self) -> Result<Option<BlockRecord>, StoreError> {
        Ok(self.blocks.values().next_back().cloned())
    }

    fn block_at_height(&self, height: u64) -> Result<Option<BlockRecord>, StoreError> {
        Ok(self.blocks.get(&height).cloned())
    }

    fn get_block(&self, id: &BlockId) -> Result<Option<BlockRecord>, StoreError> {
        Ok(self.blocks.values().find(|b| &b.id == id).cloned())
    }

    fn blocks(&self) -> Result<Vec<BlockRecord>, StoreError> {
        Ok(self.blocks.values().cloned().collect())
    }
}

/// An in-memory [`LedgerStore`] for tests.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullStore {
    state: Mutex<MemLedger>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemLedger>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("null store mutex poisoned".to_string()))
    }

    /// Rewrite a stored block in place, bypassing append-only rules.
    /// Lets tests simulate on-disk tampering.
    pub fn tamper_block(&self, height: u64, f: impl FnOnce(&mut BlockRecord)) -> bool {
        match self.lock() {
            Ok(mut state) => state.blocks.get_mut(&height).map(f).is_some(),
            Err(_) => false,
        }
    }

    /// Rewrite a stored transaction in place.
    pub fn tamper_transaction(&self, id: &TxId, f: impl FnOnce(&mut TransactionRecord)) -> bool {
        match self.lock() {
            Ok(mut state) => state.transactions.get_mut(id).map(f).is_some(),
            Err(_) => false,
        }
    }
}

impl LedgerStore for NullStore {
    fn read_txn(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError> {
        let snapshot = self.lock()?.clone();
        Ok(Box::new(snapshot))
    }

    fn write_txn(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError> {
        let guard = self.lock()?;
        let working = guard.clone();
        Ok(Box::new(NullWriteTxn { guard, working }))
    }
}

struct NullWriteTxn<'a> {
    guard: MutexGuard<'a, MemLedger>,
    working: MemLedger,
}

impl ReadTxn for NullWriteTxn<'_> {
    fn get_wallet(&self, id: &WalletId) -> Result<Option<WalletRecord>, StoreError> {
        self.working.get_wallet(id)
    }

    fn wallets(&self) -> Result<Vec<WalletRecord>, StoreError> {
        self.working.wallets()
    }

    fn get_utxo(&self, id: &UtxoId) -> Result<Option<UtxoRecord>, StoreError> {
        self.working.get_utxo(id)
    }

    fn wallet_utxos(&self, wallet: &WalletId) -> Result<Vec<UtxoRecord>, StoreError> {
        self.working.wallet_utxos(wallet)
    }

    fn get_transaction(&self, id: &TxId) -> Result<Option<TransactionRecord>, StoreError> {
        self.working.get_transaction(id)
    }

    fn tx_by_nonce(&self, sender: &WalletId, nonce: &str) -> Result<Option<TxId>, StoreError> {
        self.working.tx_by_nonce(sender, nonce)
    }

    fn pending_transactions(&self, limit: usize) -> Result<Vec<TransactionRecord>, StoreError> {
        self.working.pending_transactions(limit)
    }

    fn wallet_transactions(
        &self,
        wallet: &WalletId,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        self.working.wallet_transactions(wallet)
    }

    fn block_transactions(&self, block: &BlockId) -> Result<Vec<TransactionRecord>, StoreError> {
        self.working.block_transactions(block)
    }

    fn latest_block(&self) -> Result<Option<BlockRecord>, StoreError> {
        self.working.latest_block()
    }

    fn block_at_height(&self, height: u64) -> Result<Option<BlockRecord>, StoreError> {
        self.working.block_at_height(height)
    }

    fn get_block(&self, id: &BlockId) -> Result<Option<BlockRecord>, StoreError> {
        self.working.get_block(id)
    }

    fn blocks(&self) -> Result<Vec<BlockRecord>, StoreError> {
        self.working.blocks()
    }
}

impl WriteTxn for NullWriteTxn<'_> {
    fn next_sequence(&mut self) -> Result<u64, StoreError> {
        let seq = self.working.next_seq;
        self.working.next_seq += 1;
        Ok(seq)
    }

    fn put_wallet(&mut self, wallet: &WalletRecord) -> Result<(), StoreError> {
        self.working.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    fn put_utxo(&mut self, utxo: &UtxoRecord) -> Result<(), StoreError> {
        self.working.utxos.insert(utxo.id, utxo.clone());
        Ok(())
    }

    fn put_transaction(&mut self, tx: &TransactionRecord) -> Result<(), StoreError> {
        self.working
            .nonces
            .insert((tx.from, tx.nonce.clone()), tx.id);
        self.working.transactions.insert(tx.id, tx.clone());
        Ok(())
    }

    fn put_block(&mut self, block: &BlockRecord) -> Result<(), StoreError> {
        if self.working.blocks.contains_key(&block.height) {
            return Err(StoreError::Duplicate(format!(
                "block at height {}",
                block.height
            )));
        }
        self.working.blocks.insert(block.height, block.clone());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let NullWriteTxn { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{Amount, BlockHash, Timestamp};

    fn utxo(wallet: WalletId, seq: u64, amount: u64) -> UtxoRecord {
        UtxoRecord {
            id: UtxoId::new([seq as u8 + 1; 32]),
            wallet,
            amount: Amount::new(amount),
            spent: false,
            source_tx: None,
            output_index: 0,
            created_at: Timestamp::new(1),
            seq,
        }
    }

    fn block(height: u64) -> BlockRecord {
        BlockRecord {
            id: BlockId::new([height as u8; 32]),
            height,
            prev_hash: BlockHash::ZERO,
            hash: BlockHash::new([0xee; 32]),
            nonce: 0,
            difficulty: 0,
            merkle_root: String::new(),
            timestamp: Timestamp::new(1),
        }
    }

    #[test]
    fn dropped_write_txn_rolls_back() {
        let store = NullStore::new();
        let wallet = WalletId::new([1; 32]);
        {
            let mut txn = store.write_txn().unwrap();
            txn.put_utxo(&utxo(wallet, 0, 10)).unwrap();
        }
        let rtxn = store.read_txn().unwrap();
        assert!(rtxn.wallet_utxos(&wallet).unwrap().is_empty());
    }

    #[test]
    fn committed_writes_are_visible_in_creation_order() {
        let store = NullStore::new();
        let wallet = WalletId::new([1; 32]);
        let mut txn = store.write_txn().unwrap();
        txn.put_utxo(&utxo(wallet, 5, 50)).unwrap();
        txn.put_utxo(&utxo(wallet, 2, 20)).unwrap();
        txn.commit().unwrap();

        let rtxn = store.read_txn().unwrap();
        let amounts: Vec<u64> = rtxn
            .wallet_utxos(&wallet)
            .unwrap()
            .iter()
            .map(|u| u.amount.raw())
            .collect();
        assert_eq!(amounts, vec![20, 50]);
        assert_eq!(rtxn.balance(&wallet).unwrap(), Amount::new(70));
    }

    #[test]
    fn write_txn_reads_its_own_writes() {
        let store = NullStore::new();
        let mut txn = store.write_txn().unwrap();
        assert_eq!(txn.next_sequence().unwrap(), 0);
        assert_eq!(txn.next_sequence().unwrap(), 1);
        txn.put_block(&block(0)).unwrap();
        assert_eq!(txn.latest_block().unwrap().unwrap().height, 0);
    }

    #[test]
    fn duplicate_height_rejected() {
        let store = NullStore::new();
        let mut txn = store.write_txn().unwrap();
        txn.put_block(&block(0)).unwrap();
        assert!(matches!(
            txn.put_block(&block(0)),
            Err(StoreError::Duplicate(_))
        ));
    }

    #[test]
    fn tamper_block_rewrites_in_place() {
        let store = NullStore::new();
        let mut txn = store.write_txn().unwrap();
        txn.put_block(&block(0)).unwrap();
        txn.commit().unwrap();

        assert!(store.tamper_block(0, |b| b.nonce = 99));
        assert!(!store.tamper_block(7, |b| b.nonce = 1));
        let rtxn = store.read_txn().unwrap();
        assert_eq!(rtxn.block_at_height(0).unwrap().unwrap().nonce, 99);
    }
}
