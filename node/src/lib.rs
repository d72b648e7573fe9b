//! tally ledger node.
//!
//! Wires the ledger engine to a store, runs the blocking parts (proof-of-work,
//! store transactions) off the async runtime, and owns the levy scheduler's
//! lifecycle.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod scheduler;
pub mod shutdown;
pub mod tracing_spans;

pub use config::{LevyConfig, NodeConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::LedgerNode;
pub use scheduler::{LevyReport, LevyScheduler, SchedulerHandle};
pub use shutdown::ShutdownController;
