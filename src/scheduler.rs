//! Configuration surfaces of the hosting scheduler.
//!
//! The shard scheduler - lease coordination, retrieval loops, and the
//! wire protocol - lives upstream of this crate. These are the config
//! objects it exposes; the per-stream customizer mutates them before the
//! scheduler starts.

use crate::metrics::{ExecutorMonitor, MetricsSink};
use crate::types::{InitialPosition, MetricsLevel};

/// How the scheduler fetches records.
#[derive(Debug, Clone, Default)]
pub struct RetrievalConfig {
    /// Where to start when a shard has no checkpoint.
    pub initial_position: InitialPosition,
    /// Fan-out subscription or polling.
    pub mode: RetrievalMode,
}

/// Concrete retrieval mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Enhanced fan-out over HTTP/2 push.
    #[default]
    Fanout,
    /// GetRecords polling.
    Polling {
        /// HTTP version constraint for the polling client.
        http: HttpMode,
    },
}

/// HTTP version constraint for the retrieval client.
///
/// Polling must not negotiate HTTP/2: the polling path multiplexes badly
/// over a single connection and the service side expects HTTP/1.1 there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpMode {
    /// Let the client negotiate.
    #[default]
    Auto,
    /// Pin the client to HTTP/1.1.
    Http1Only,
}

/// Lease-table and lease-executor settings.
#[derive(Debug, Clone)]
pub struct LeaseManagementConfig {
    /// Initial provisioned read capacity of the lease table.
    pub read_capacity: i64,
    /// Initial provisioned write capacity of the lease table.
    pub write_capacity: i64,
    /// The lease renewal/taker executor.
    pub executor: ExecutorConfig,
}

impl Default for LeaseManagementConfig {
    fn default() -> Self {
        Self {
            read_capacity: 1,
            write_capacity: 1,
            executor: ExecutorConfig::default(),
        }
    }
}

/// Coordinator executor settings.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// The shard-consumer dispatch executor.
    pub executor: ExecutorConfig,
}

/// Metrics settings handed to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct MetricsConfig {
    pub level: MetricsLevel,
    pub sink: MetricsSink,
}

/// Settings for one of the scheduler's internal executors.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Instrumentation the executor reports its state through, if any.
    pub monitor: Option<ExecutorMonitor>,
}
