//! LMDB-backed read and write transactions.
//!
//! A [`LmdbWriteTxn`] groups every store operation of one ledger mutation
//! into a single LMDB write transaction. If it is dropped without calling
//! [`WriteTxn::commit`], all operations are rolled back (the underlying LMDB
//! transaction is aborted).

use heed::{RoTxn, RwTxn};

use tally_store::{
    BlockRecord, ReadTxn, StoreError, TransactionRecord, UtxoRecord, WalletRecord, WriteTxn,
};
use tally_types::{BlockId, TxId, TxStatus, UtxoId, WalletId};

use crate::environment::Databases;
use crate::keys::{composite, height_key, nonce_key, seq_key, NEXT_SEQ_KEY};
use crate::read::{all_records, get_record, index_values, resolve};
use crate::LmdbError;

pub struct LmdbReadTxn<'a> {
    pub(crate) txn: RoTxn<'a>,
    pub(crate) dbs: &'a Databases,
}

pub struct LmdbWriteTxn<'a> {
    pub(crate) txn: RwTxn<'a>,
    pub(crate) dbs: &'a Databases,
}

macro_rules! impl_read_txn {
    ($ty:ident) => {
        impl ReadTxn for $ty<'_> {
            fn get_wallet(&self, id: &WalletId) -> Result<Option<WalletRecord>, StoreError> {
                Ok(get_record(&self.dbs.wallets, &self.txn, id.as_bytes())?)
            }

            fn wallets(&self) -> Result<Vec<WalletRecord>, StoreError> {
                Ok(all_records(&self.dbs.wallets, &self.txn)?)
            }

            fn get_utxo(&self, id: &UtxoId) -> Result<Option<UtxoRecord>, StoreError> {
                Ok(get_record(&self.dbs.utxos, &self.txn, id.as_bytes())?)
            }

            fn wallet_utxos(&self, wallet: &WalletId) -> Result<Vec<UtxoRecord>, StoreError> {
                let ids = index_values(&self.dbs.wallet_utxos, &self.txn, wallet.as_bytes(), 0)?;
                Ok(resolve(&self.dbs.utxos, &self.txn, &ids, "utxo")?)
            }

            fn get_transaction(
                &self,
                id: &TxId,
            ) -> Result<Option<TransactionRecord>, StoreError> {
                Ok(get_record(&self.dbs.transactions, &self.txn, id.as_bytes())?)
            }

            fn tx_by_nonce(
                &self,
                sender: &WalletId,
                nonce: &str,
            ) -> Result<Option<TxId>, StoreError> {
                let key = nonce_key(sender.as_bytes(), nonce);
                match self.dbs.tx_nonces.get(&self.txn, &key).map_err(LmdbError::from)? {
                    Some(val) => {
                        let bytes: [u8; 32] = val.try_into().map_err(|_| {
                            LmdbError::Corruption(format!("nonce index value of {} bytes", val.len()))
                        })?;
                        Ok(Some(TxId::new(bytes)))
                    }
                    None => Ok(None),
                }
            }

            fn pending_transactions(
                &self,
                limit: usize,
            ) -> Result<Vec<TransactionRecord>, StoreError> {
                let ids = index_values(&self.dbs.pending_txs, &self.txn, &[], limit)?;
                Ok(resolve(&self.dbs.transactions, &self.txn, &ids, "transaction")?)
            }

            fn wallet_transactions(
                &self,
                wallet: &WalletId,
            ) -> Result<Vec<TransactionRecord>, StoreError> {
                let ids = index_values(&self.dbs.wallet_txs, &self.txn, wallet.as_bytes(), 0)?;
                Ok(resolve(&self.dbs.transactions, &self.txn, &ids, "transaction")?)
            }

            fn block_transactions(
                &self,
                block: &BlockId,
            ) -> Result<Vec<TransactionRecord>, StoreError> {
                let ids = index_values(&self.dbs.block_txs, &self.txn, block.as_bytes(), 0)?;
                Ok(resolve(&self.dbs.transactions, &self.txn, &ids, "transaction")?)
            }

            fn latest_block(&self) -> Result<Option<BlockRecord>, StoreError> {
                match self.dbs.blocks.last(&self.txn).map_err(LmdbError::from)? {
                    Some((_key, val)) => Ok(Some(
                        bincode::deserialize(val).map_err(LmdbError::from)?,
                    )),
                    None => Ok(None),
                }
            }

            fn block_at_height(&self, height: u64) -> Result<Option<BlockRecord>, StoreError> {
                Ok(get_record(&self.dbs.blocks, &self.txn, &height_key(height))?)
            }

            fn get_block(&self, id: &BlockId) -> Result<Option<BlockRecord>, StoreError> {
                let height = self
                    .dbs
                    .block_ids
                    .get(&self.txn, id.as_bytes())
                    .map_err(LmdbError::from)?;
                match height {
                    Some(key) => Ok(get_record(&self.dbs.blocks, &self.txn, key)?),
                    None => Ok(None),
                }
            }

            fn blocks(&self) -> Result<Vec<BlockRecord>, StoreError> {
                Ok(all_records(&self.dbs.blocks, &self.txn)?)
            }
        }
    };
}

impl_read_txn!(LmdbReadTxn);
impl_read_txn!(LmdbWriteTxn);

impl LmdbWriteTxn<'_> {
    fn put_record<T: serde::Serialize>(
        &mut self,
        db: crate::read::Db,
        key: &[u8],
        value: &T,
    ) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(value)?;
        db.put(&mut self.txn, key, &bytes)?;
        Ok(())
    }
}

impl WriteTxn for LmdbWriteTxn<'_> {
    fn next_sequence(&mut self) -> Result<u64, StoreError> {
        let current = match self
            .dbs
            .meta
            .get(&self.txn, NEXT_SEQ_KEY)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    LmdbError::Corruption(format!("sequence counter of {} bytes", bytes.len()))
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        self.dbs
            .meta
            .put(&mut self.txn, NEXT_SEQ_KEY, &seq_key(current + 1))
            .map_err(LmdbError::from)?;
        Ok(current)
    }

    fn put_wallet(&mut self, wallet: &WalletRecord) -> Result<(), StoreError> {
        self.put_record(self.dbs.wallets, wallet.id.as_bytes(), wallet)?;
        Ok(())
    }

    fn put_utxo(&mut self, utxo: &UtxoRecord) -> Result<(), StoreError> {
        self.put_record(self.dbs.utxos, utxo.id.as_bytes(), utxo)?;
        self.dbs
            .wallet_utxos
            .put(
                &mut self.txn,
                &composite(utxo.wallet.as_bytes(), utxo.seq),
                utxo.id.as_bytes(),
            )
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn put_transaction(&mut self, tx: &TransactionRecord) -> Result<(), StoreError> {
        let dbs = self.dbs;
        let id = tx.id.as_bytes();
        self.put_record(dbs.transactions, id, tx)?;

        dbs.tx_nonces
            .put(&mut self.txn, &nonce_key(tx.from.as_bytes(), &tx.nonce), id)
            .map_err(LmdbError::from)?;
        for wallet in [&tx.from, &tx.to] {
            dbs.wallet_txs
                .put(&mut self.txn, &composite(wallet.as_bytes(), tx.seq), id)
                .map_err(LmdbError::from)?;
        }

        match tx.status {
            TxStatus::Pending => {
                dbs.pending_txs
                    .put(&mut self.txn, &seq_key(tx.seq), id)
                    .map_err(LmdbError::from)?;
            }
            TxStatus::Committed => {
                dbs.pending_txs
                    .delete(&mut self.txn, &seq_key(tx.seq))
                    .map_err(LmdbError::from)?;
            }
        }
        if let Some(block) = &tx.block_id {
            dbs.block_txs
                .put(&mut self.txn, &composite(block.as_bytes(), tx.seq), id)
                .map_err(LmdbError::from)?;
        }
        Ok(())
    }

    fn put_block(&mut self, block: &BlockRecord) -> Result<(), StoreError> {
        let key = height_key(block.height);
        let taken = self
            .dbs
            .blocks
            .get(&self.txn, &key)
            .map_err(LmdbError::from)?
            .is_some();
        if taken {
            return Err(StoreError::Duplicate(format!(
                "block at height {}",
                block.height
            )));
        }
        self.put_record(self.dbs.blocks, &key, block)?;
        self.dbs
            .block_ids
            .put(&mut self.txn, block.id.as_bytes(), &key)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
