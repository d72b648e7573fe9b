//! LMDB environment setup.

use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RwTxn};

use tally_store::{LedgerStore, ReadTxn, StoreError, WriteTxn};

use crate::txn::{LmdbReadTxn, LmdbWriteTxn};
use crate::LmdbError;

const MAX_DBS: u32 = 16;

/// Handles to every named database in the environment.
pub struct Databases {
    /// wallet id -> `WalletRecord`
    pub(crate) wallets: Database<Bytes, Bytes>,
    /// utxo id -> `UtxoRecord`
    pub(crate) utxos: Database<Bytes, Bytes>,
    /// wallet id ++ seq -> utxo id
    pub(crate) wallet_utxos: Database<Bytes, Bytes>,
    /// tx id -> `TransactionRecord`
    pub(crate) transactions: Database<Bytes, Bytes>,
    /// sender id ++ nonce -> tx id
    pub(crate) tx_nonces: Database<Bytes, Bytes>,
    /// wallet id ++ seq -> tx id (sender and receiver)
    pub(crate) wallet_txs: Database<Bytes, Bytes>,
    /// seq -> tx id, pending only
    pub(crate) pending_txs: Database<Bytes, Bytes>,
    /// block id ++ seq -> tx id
    pub(crate) block_txs: Database<Bytes, Bytes>,
    /// height -> `BlockRecord`
    pub(crate) blocks: Database<Bytes, Bytes>,
    /// block id -> height
    pub(crate) block_ids: Database<Bytes, Bytes>,
    pub(crate) meta: Database<Bytes, Bytes>,
}

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Env,
    dbs: Databases,
    path: PathBuf,
}

fn create(env: &Env, wtxn: &mut RwTxn<'_>, name: &str) -> Result<Database<Bytes, Bytes>, LmdbError> {
    Ok(env.create_database(wtxn, Some(name))?)
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per path by this process and
        // the directory is not shared with other LMDB users.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let dbs = Databases {
            wallets: create(&env, &mut wtxn, "wallets")?,
            utxos: create(&env, &mut wtxn, "utxos")?,
            wallet_utxos: create(&env, &mut wtxn, "wallet_utxos")?,
            transactions: create(&env, &mut wtxn, "transactions")?,
            tx_nonces: create(&env, &mut wtxn, "tx_nonces")?,
            wallet_txs: create(&env, &mut wtxn, "wallet_txs")?,
            pending_txs: create(&env, &mut wtxn, "pending_txs")?,
            block_txs: create(&env, &mut wtxn, "block_txs")?,
            blocks: create(&env, &mut wtxn, "blocks")?,
            block_ids: create(&env, &mut wtxn, "block_ids")?,
            meta: create(&env, &mut wtxn, "meta")?,
        };
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(Self {
            env,
            dbs,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for LmdbEnvironment {
    fn read_txn(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError> {
        let txn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(Box::new(LmdbReadTxn {
            txn,
            dbs: &self.dbs,
        }))
    }

    fn write_txn(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError> {
        let txn = self.env.write_txn().map_err(LmdbError::from)?;
        Ok(Box::new(LmdbWriteTxn {
            txn,
            dbs: &self.dbs,
        }))
    }
}
