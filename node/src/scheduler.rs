//! Periodic levy scheduler.
//!
//! Each tick mints the levy transactions for the current instant and seals
//! exactly that batch into one block. The task owns a cancellation token that
//! is a child of the node's shutdown token, so stopping the scheduler or the
//! node also aborts a nonce search the tick is running.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use tally_ledger::dto::BlockCommitResponse;
use tally_ledger::LevyEntry;
use tally_work::CancelToken;

use crate::{LedgerNode, NodeError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevyReport {
    pub levies: Vec<LevyEntry>,
    /// The block sealing `levies`; `None` when nothing was levied.
    pub block: Option<BlockCommitResponse>,
}

pub struct LevyScheduler {
    node: Arc<LedgerNode>,
    period: Duration,
    cancel: CancelToken,
}

impl LevyScheduler {
    pub fn new(node: Arc<LedgerNode>) -> Result<Self, NodeError> {
        let levy = &node.config().levy;
        levy.system_wallet_id()?;
        if levy.period_secs == 0 {
            return Err(NodeError::Config("levy period_secs must be positive".into()));
        }
        let period = levy.period();
        let cancel = node.shutdown_controller().mining_token().child(None);
        Ok(Self {
            node,
            period,
            cancel,
        })
    }

    /// Run one levy pass and seal whatever it minted.
    pub async fn tick(&self) -> Result<LevyReport, NodeError> {
        let (levies, sealed) = self.node.levy_batch(&self.cancel).await?;
        if sealed.is_none() {
            tracing::debug!("levy tick minted nothing");
        }
        Ok(LevyReport {
            levies,
            block: sealed.as_ref().map(BlockCommitResponse::from),
        })
    }

    /// Spawn the interval loop. The first tick fires one period after start.
    pub fn start(self) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let mut shutdown_rx = self.node.shutdown_controller().subscribe();
        let cancel = self.cancel.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await; // skip the immediate first tick
            tracing::info!(period_secs = self.period.as_secs(), "levy scheduler started");
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => {
                        tracing::info!("levy scheduler stopping");
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("levy scheduler shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        match self.tick().await {
                            Ok(report) => tracing::info!(
                                levied = report.levies.len(),
                                height = ?report.block.as_ref().map(|b| b.height),
                                "levy tick complete"
                            ),
                            Err(e) => tracing::warn!(error = %e, "levy tick failed"),
                        }
                    }
                }
            }
        });

        SchedulerHandle {
            stop_tx: Some(stop_tx),
            cancel,
            task,
        }
    }
}

pub struct SchedulerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    cancel: CancelToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop, abort a running search and wait for the task to exit.
    pub async fn stop(mut self) -> Result<(), NodeError> {
        self.cancel.cancel();
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.task
            .await
            .map_err(|e| NodeError::Task(e.to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
