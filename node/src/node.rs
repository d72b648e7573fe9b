//! Async facade over the ledger engine.
//!
//! Every ledger call touches the store and some run the nonce search, so all
//! of them run on the blocking pool via [`tokio::task::spawn_blocking`] with
//! the operation's span entered on the worker thread.

use std::sync::Arc;

use tokio::sync::Mutex;

use tally_ledger::dto::{
    BlockCommitResponse, CommitRequest, TransferRequest, TransferResponse, ValidationResponse,
};
use tally_ledger::{
    fund_wallet, mint_levies, register_wallet, BlockMiner, ChainValidator, Explorer, LedgerError,
    LevyEntry, LevyPolicy, SealedBlock, StoreOwnership, TransferBuilder,
};
use tally_store::{LedgerStore, UtxoRecord, WalletRecord};
use tally_store_lmdb::LmdbEnvironment;
use tally_types::{Amount, Clock, SystemClock, TxId, WalletId};
use tally_work::CancelToken;

use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;
use crate::tracing_spans;
use crate::{NodeConfig, NodeError};

pub struct LedgerNode {
    config: NodeConfig,
    store: Arc<dyn LedgerStore>,
    builder: Arc<TransferBuilder>,
    miner: Arc<BlockMiner>,
    validator: Arc<ChainValidator>,
    explorer: Arc<Explorer>,
    clock: Arc<dyn Clock>,
    metrics: Arc<NodeMetrics>,
    shutdown: Arc<ShutdownController>,
    /// Held from batch selection through sealing, so a levy tick and a manual
    /// commit never pick up each other's transactions.
    batch_lock: Mutex<()>,
}

impl LedgerNode {
    /// Open the LMDB environment under `config.data_dir` and build the node.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let env = LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())?;
        tracing::info!(path = %config.data_dir.display(), "ledger store opened");
        Self::with_store(config, Arc::new(env), Arc::new(SystemClock))
    }

    pub fn with_store(
        config: NodeConfig,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let ownership = Arc::new(StoreOwnership::new(store.clone()));
        let miner = BlockMiner::new(store.clone(), config.work_threads)?;
        let metrics = Arc::new(NodeMetrics::new());
        if let Some(tip) = store.read_txn()?.latest_block()? {
            metrics.chain_height.set(tip.height as i64);
        }
        Ok(Self {
            builder: Arc::new(TransferBuilder::new(store.clone(), ownership)),
            miner: Arc::new(miner),
            validator: Arc::new(ChainValidator::new(store.clone())),
            explorer: Arc::new(Explorer::new(store.clone())),
            store,
            clock,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            batch_lock: Mutex::new(()),
            config,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn LedgerStore> {
        self.store.clone()
    }

    pub fn metrics(&self) -> Arc<NodeMetrics> {
        self.metrics.clone()
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        self.shutdown.clone()
    }

    pub async fn register_wallet(
        &self,
        owner: String,
        public_key: Vec<u8>,
        encrypted_private_key: Vec<u8>,
    ) -> Result<WalletRecord, NodeError> {
        let store = self.store.clone();
        let now = self.clock.now();
        blocking(move || {
            register_wallet(store.as_ref(), &owner, &public_key, encrypted_private_key, now)
        })
        .await
    }

    pub async fn wallet(&self, id: WalletId) -> Result<WalletRecord, NodeError> {
        let store = self.store.clone();
        blocking(move || {
            let txn = store.read_txn()?;
            let record = txn.get_wallet(&id)?;
            record.ok_or_else(|| LedgerError::NotFound(format!("wallet {id}")))
        })
        .await
    }

    pub async fn fund_wallet(&self, wallet: WalletId, amount: Amount) -> Result<UtxoRecord, NodeError> {
        let store = self.store.clone();
        let now = self.clock.now();
        blocking(move || fund_wallet(store.as_ref(), &wallet, amount, now)).await
    }

    /// Submit a user-signed transfer on behalf of the authenticated `principal`.
    pub async fn submit_transfer(
        &self,
        principal: String,
        request: TransferRequest,
    ) -> Result<TransferResponse, NodeError> {
        let span = tracing_spans::transfer_span(&principal, &request.nonce);
        let builder = self.builder.clone();
        let now = self.clock.now();
        let result = blocking(move || {
            let _entered = span.enter();
            builder.submit(&principal, &request, now)
        })
        .await;
        match &result {
            Ok(outcome) if outcome.replayed => self.metrics.transfers_replayed.inc(),
            Ok(_) => self.metrics.transfers_accepted.inc(),
            Err(_) => self.metrics.transfers_rejected.inc(),
        }
        result.map(|outcome| TransferResponse::from(&outcome.tx))
    }

    /// Seal pending transactions, oldest first, into one block.
    pub async fn commit_pending(
        &self,
        request: CommitRequest,
    ) -> Result<BlockCommitResponse, NodeError> {
        let difficulty = self.checked_difficulty(request.difficulty)?;
        let _batch = self.batch_lock.lock().await;
        let store = self.store.clone();
        let pending = blocking(move || {
            let txn = store.read_txn()?;
            Ok(txn
                .pending_transactions(request.max_tx)?
                .into_iter()
                .map(|tx| tx.id)
                .collect::<Vec<_>>())
        })
        .await?;
        if pending.is_empty() {
            return Err(LedgerError::Validation("no pending transactions".into()).into());
        }
        let sealed = self.seal(pending, difficulty).await?;
        Ok(BlockCommitResponse::from(&sealed))
    }

    /// Seal exactly `tx_ids` at `difficulty`.
    pub async fn seal(&self, tx_ids: Vec<TxId>, difficulty: u32) -> Result<SealedBlock, NodeError> {
        let root = self.shutdown.mining_token().clone();
        self.seal_under(&root, tx_ids, difficulty).await
    }

    /// Like [`LedgerNode::seal`], with the search also cancelled by `parent`.
    pub async fn seal_under(
        &self,
        parent: &CancelToken,
        tx_ids: Vec<TxId>,
        difficulty: u32,
    ) -> Result<SealedBlock, NodeError> {
        let span = tracing_spans::seal_span(tx_ids.len(), difficulty);
        let token = parent.child(self.config.mining_timeout());

        let miner = self.miner.clone();
        let now = self.clock.now();
        let result = blocking(move || {
            let _entered = span.enter();
            miner.seal(&tx_ids, difficulty, now, &token)
        })
        .await;

        let sealed = result?;
        self.metrics.blocks_sealed.inc();
        self.metrics.chain_height.set(sealed.block.height as i64);
        self.metrics.mining_time_ms.observe(sealed.elapsed_ms as f64);
        Ok(sealed)
    }

    /// Whether a seal is running its nonce search.
    pub fn is_mining(&self) -> bool {
        self.miner.is_sealing()
    }

    /// Abort the nonce search in flight. Returns whether one was running.
    pub fn cancel_mining(&self) -> bool {
        let cancelled = self.miner.cancel_active();
        if cancelled {
            tracing::info!("mining search cancelled by operator");
        }
        cancelled
    }

    pub async fn validate_chain(&self) -> Result<ValidationResponse, NodeError> {
        let validator = self.validator.clone();
        let span = tracing_spans::validate_span();
        let report = blocking(move || {
            let _entered = span.enter();
            validator.validate()
        })
        .await?;
        Ok(ValidationResponse::from(&report))
    }

    /// Mint this instant's levy transactions without sealing them.
    pub async fn mint_levies(&self) -> Result<Vec<LevyEntry>, NodeError> {
        let policy = LevyPolicy {
            rate_per_mille: self.config.levy.rate_per_mille,
            system_wallet: self.config.levy.system_wallet_id()?,
        };
        let store = self.store.clone();
        let builder = self.builder.clone();
        let now = self.clock.now();
        let span = tracing_spans::levy_span(now.as_secs());
        let entries = blocking(move || {
            let _entered = span.enter();
            mint_levies(store.as_ref(), &builder, &policy, now)
        })
        .await?;
        self.metrics.levy_transactions.inc_by(entries.len() as u64);
        Ok(entries)
    }

    /// Mint this instant's levies and seal exactly that batch under `parent`.
    ///
    /// Manual commits wait until the levy block is sealed, so the two never
    /// share transactions.
    pub async fn levy_batch(
        &self,
        parent: &CancelToken,
    ) -> Result<(Vec<LevyEntry>, Option<SealedBlock>), NodeError> {
        let _batch = self.batch_lock.lock().await;
        let levies = self.mint_levies().await?;
        if levies.is_empty() {
            return Ok((levies, None));
        }
        let ids = levies.iter().map(|e| e.tx_id).collect();
        let sealed = self
            .seal_under(parent, ids, self.config.difficulty)
            .await?;
        Ok((levies, Some(sealed)))
    }

    /// Run a read-only explorer query on the blocking pool.
    pub async fn query<T, F>(&self, f: F) -> Result<T, NodeError>
    where
        T: Send + 'static,
        F: FnOnce(&Explorer) -> Result<T, LedgerError> + Send + 'static,
    {
        let explorer = self.explorer.clone();
        blocking(move || f(&explorer)).await
    }

    /// Signal shutdown to every subsystem and abort any running search.
    pub fn stop(&self) {
        tracing::info!("ledger node stopping");
        self.shutdown.shutdown();
    }

    fn checked_difficulty(&self, requested: Option<u32>) -> Result<u32, NodeError> {
        let difficulty = requested.unwrap_or(self.config.difficulty);
        if difficulty > self.config.max_difficulty {
            return Err(LedgerError::Validation(format!(
                "difficulty {difficulty} exceeds configured maximum {}",
                self.config.max_difficulty
            ))
            .into());
        }
        Ok(difficulty)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, NodeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, LedgerError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| NodeError::Task(e.to_string()))?
        .map_err(NodeError::from)
}
