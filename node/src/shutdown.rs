//! Graceful shutdown controller for the tally node.
//!
//! Listens for SIGINT/SIGTERM and broadcasts a shutdown signal to all
//! subsystems via a `tokio::sync::broadcast` channel. The same signal trips
//! the root [`CancelToken`], which every nonce search is a child of.

use tokio::signal;
use tokio::sync::broadcast;

use tally_work::CancelToken;

/// Coordinates graceful shutdown across all node subsystems.
///
/// Subsystems call [`ShutdownController::subscribe`] to get a receiver, then
/// `select!` on it alongside their main loop.
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    mining: CancelToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            mining: CancelToken::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Parent of every mining token handed out by the node.
    pub fn mining_token(&self) -> &CancelToken {
        &self.mining
    }

    pub fn is_shutdown(&self) -> bool {
        self.mining.is_cancelled()
    }

    /// Trigger shutdown programmatically.
    pub fn shutdown(&self) {
        self.mining.cancel();
        let _ = self.tx.send(());
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
