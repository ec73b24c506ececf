//! Checkpointing: the upstream store interface and the retry policy.

use crate::error::CheckpointError;
use crate::types::{CheckpointStrategy, SequenceNumber};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to the upstream checkpoint store.
///
/// The hosting scheduler passes one per batch and per terminal event. The
/// runtime never constructs these; it only drives them through the retry
/// policy.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Advance the lease to the latest record of the current batch.
    async fn checkpoint(&self) -> Result<(), CheckpointError>;

    /// Advance the lease to a specific sequence number.
    async fn checkpoint_at(&self, sequence_number: &SequenceNumber) -> Result<(), CheckpointError>;
}

/// Checkpointing configuration.
///
/// `max_retries` bounds additional attempts after the first, and applies
/// only to retryable and throttled faults. The delay between attempts is
/// fixed, not exponential: checkpoint faults are coordination-layer
/// hiccups that either clear within a beat or not at all.
#[derive(Clone, Debug)]
pub struct CheckpointConfig {
    pub strategy: CheckpointStrategy,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            strategy: CheckpointStrategy::Batch,
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl CheckpointConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the checkpoint strategy.
    pub fn with_strategy(mut self, strategy: CheckpointStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the number of additional attempts after the first.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the fixed delay between attempts.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Drive a checkpoint operation through the retry policy.
///
/// At most `1 + max_retries` attempts, sleeping `backoff` between them.
/// Fault routing on exhaustion:
/// - retryable: the last fault propagates
/// - throttled: swallowed - the next successful batch advances the lease
/// - non-retryable: propagates on the first attempt, no retry
///
/// The sleep races `shutdown`; cancellation abandons the remaining
/// attempts as if they were exhausted.
pub(crate) async fn checkpoint_with_retries<F, Fut>(
    config: &CheckpointConfig,
    shutdown: &CancellationToken,
    op: F,
) -> Result<(), CheckpointError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(), CheckpointError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let error = match op().await {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };

        if !error.is_retryable() {
            return Err(error);
        }

        if attempt >= config.max_retries {
            return exhaust(error);
        }

        debug!(
            attempt = attempt + 1,
            max_retries = config.max_retries,
            backoff_ms = config.backoff.as_millis() as u64,
            %error,
            "checkpoint attempt failed, backing off"
        );

        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("shutdown observed during checkpoint backoff, abandoning retries");
                return exhaust(error);
            }
            _ = tokio::time::sleep(config.backoff) => {}
        }

        attempt += 1;
    }
}

fn exhaust(error: CheckpointError) -> Result<(), CheckpointError> {
    if error.is_throttled() {
        warn!(%error, "checkpoint retries exhausted on throttling, dropping this checkpoint opportunity");
        Ok(())
    } else {
        Err(error)
    }
}
