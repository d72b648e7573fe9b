//! Read-only queries over wallets, transactions and blocks.

use std::sync::Arc;

use tally_store::{LedgerStore, ReadTxn, TransactionRecord};
use tally_types::{Amount, BlockId, TxId, WalletId};

use crate::dto::{
    BlockView, InputView, TransactionView, TransferResponse, UtxoView, WalletBalanceView,
    WalletView,
};
use crate::LedgerError;

/// Default page size of [`Explorer::list_blocks`].
pub const DEFAULT_BLOCK_LIMIT: usize = 100;

pub struct Explorer {
    store: Arc<dyn LedgerStore>,
}

impl Explorer {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Wallets registered by `owner`, oldest first. Unknown owners have none.
    pub fn owner_wallets(&self, owner: &str) -> Result<Vec<WalletView>, LedgerError> {
        let txn = self.store.read_txn()?;
        let mut wallets: Vec<_> = txn
            .wallets()?
            .into_iter()
            .filter(|w| w.owner == owner)
            .collect();
        wallets.sort_by_key(|w| (w.created_at, w.id));
        Ok(wallets.iter().map(WalletView::from).collect())
    }

    pub fn wallet_detail(&self, wallet: &WalletId) -> Result<WalletView, LedgerError> {
        let txn = self.store.read_txn()?;
        let record = txn
            .get_wallet(wallet)?
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {wallet}")))?;
        Ok(WalletView::from(&record))
    }

    pub fn wallet_balance(&self, wallet: &WalletId) -> Result<WalletBalanceView, LedgerError> {
        let txn = self.store.read_txn()?;
        let record = txn
            .get_wallet(wallet)?
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {wallet}")))?;
        let unspent = txn.unspent_utxos(wallet)?;
        Ok(WalletBalanceView {
            wallet: wallet.to_hex(),
            owner: record.owner,
            balance: unspent.iter().map(|u| u.amount).sum::<Amount>().raw(),
            unspent_count: unspent.len(),
        })
    }

    /// The wallet's outputs, oldest first.
    pub fn wallet_utxos(
        &self,
        wallet: &WalletId,
        include_spent: bool,
    ) -> Result<Vec<UtxoView>, LedgerError> {
        let txn = self.store.read_txn()?;
        ensure_wallet(&*txn, wallet)?;
        let utxos = if include_spent {
            txn.wallet_utxos(wallet)?
        } else {
            txn.unspent_utxos(wallet)?
        };
        Ok(utxos.iter().map(UtxoView::from).collect())
    }

    pub fn transaction_detail(&self, id: &TxId) -> Result<TransactionView, LedgerError> {
        let txn = self.store.read_txn()?;
        let tx = txn
            .get_transaction(id)?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
        detail(&*txn, &tx)
    }

    /// Transactions sent or received by the wallet, newest first.
    /// `limit == 0` returns all of them.
    pub fn wallet_transactions(
        &self,
        wallet: &WalletId,
        limit: usize,
    ) -> Result<Vec<TransactionView>, LedgerError> {
        let txn = self.store.read_txn()?;
        ensure_wallet(&*txn, wallet)?;
        let limit = if limit == 0 { usize::MAX } else { limit };
        txn.wallet_transactions(wallet)?
            .iter()
            .rev()
            .take(limit)
            .map(|tx| detail(&*txn, tx))
            .collect()
    }

    /// Pending transactions, oldest first. `limit == 0` returns all of them.
    pub fn pending_transactions(&self, limit: usize) -> Result<Vec<TransferResponse>, LedgerError> {
        let txn = self.store.read_txn()?;
        Ok(txn
            .pending_transactions(limit)?
            .iter()
            .map(TransferResponse::from)
            .collect())
    }

    pub fn latest_block(&self) -> Result<Option<BlockView>, LedgerError> {
        let txn = self.store.read_txn()?;
        match txn.latest_block()? {
            Some(block) => {
                let txs = txn.block_transactions(&block.id)?;
                Ok(Some(BlockView::new(&block, &txs)))
            }
            None => Ok(None),
        }
    }

    pub fn block_detail(&self, id: &BlockId) -> Result<BlockView, LedgerError> {
        let txn = self.store.read_txn()?;
        let block = txn
            .get_block(id)?
            .ok_or_else(|| LedgerError::NotFound(format!("block {id}")))?;
        let txs = txn.block_transactions(&block.id)?;
        Ok(BlockView::new(&block, &txs))
    }

    pub fn block_at_height(&self, height: u64) -> Result<BlockView, LedgerError> {
        let txn = self.store.read_txn()?;
        let block = txn
            .block_at_height(height)?
            .ok_or_else(|| LedgerError::NotFound(format!("block at height {height}")))?;
        let txs = txn.block_transactions(&block.id)?;
        Ok(BlockView::new(&block, &txs))
    }

    /// Most recent blocks first. `limit == 0` means [`DEFAULT_BLOCK_LIMIT`].
    pub fn list_blocks(&self, limit: usize) -> Result<Vec<BlockView>, LedgerError> {
        let limit = if limit == 0 { DEFAULT_BLOCK_LIMIT } else { limit };
        let txn = self.store.read_txn()?;
        let blocks = txn.blocks()?;
        blocks
            .iter()
            .rev()
            .take(limit)
            .map(|block| -> Result<BlockView, LedgerError> {
                let txs = txn.block_transactions(&block.id)?;
                Ok(BlockView::new(block, &txs))
            })
            .collect()
    }
}

fn ensure_wallet<T: ReadTxn + ?Sized>(txn: &T, wallet: &WalletId) -> Result<(), LedgerError> {
    match txn.get_wallet(wallet)? {
        Some(_) => Ok(()),
        None => Err(LedgerError::NotFound(format!("wallet {wallet}"))),
    }
}

fn detail<T: ReadTxn + ?Sized>(
    txn: &T,
    tx: &TransactionRecord,
) -> Result<TransactionView, LedgerError> {
    let mut inputs = Vec::with_capacity(tx.inputs.len());
    for id in &tx.inputs {
        let amount = txn.get_utxo(id)?.map(|u| u.amount.raw()).unwrap_or(0);
        inputs.push(InputView {
            utxo: id.to_hex(),
            amount,
        });
    }
    Ok(TransactionView::new(tx, inputs))
}
