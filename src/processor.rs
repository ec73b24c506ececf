//! The per-shard record processor: decode, dispatch, checkpoint.

use crate::checkpoint::{checkpoint_with_retries, CheckpointConfig, Checkpointer};
use crate::codec::RecordCodec;
use crate::error::ProcessorError;
use crate::events::{EventBus, LifecycleEvent};
use crate::handler::RecordHandler;
use crate::types::{CheckpointStrategy, MetricsLevel, RawRecord, RecordContext};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drives one shard's records through a handler.
///
/// The hosting scheduler creates one processor per shard assignment and
/// discards it on shard end or lease loss. All callbacks arrive on the
/// shard's worker thread, so the processor treats its state as
/// single-threaded; nothing is shared between shards except the handler
/// and the event bus.
///
/// ## Batch semantics
///
/// | Situation | `Batch` strategy | `Record` strategy |
/// |-----------|------------------|-------------------|
/// | Every record handled | one `checkpoint()` | one `checkpoint_at` per record |
/// | Handler fails on record i | propagate, no checkpoint | records before i already checkpointed, propagate |
/// | Record fails to decode | skipped, batch continues | skipped, batch continues |
///
/// A poisoned payload must not wedge the shard, so decode failures route
/// to the handler's error callback and the batch moves on. A handler
/// failure is real work the operator has to reason about, so it aborts
/// the batch and the scheduler redelivers from the last checkpoint.
pub struct ShardProcessor<H: RecordHandler> {
    handler: Arc<H>,
    codec: RecordCodec<H::Data, H::Meta>,
    config: CheckpointConfig,
    events: EventBus,
    metrics_level: MetricsLevel,
    stream_name: String,
    shard_id: Option<String>,
    shutdown: CancellationToken,
}

impl<H: RecordHandler> ShardProcessor<H> {
    /// Create a processor for one shard of the handler's stream.
    pub fn new(handler: Arc<H>, config: CheckpointConfig, events: EventBus) -> Self {
        let stream_name = handler.stream().to_string();
        Self {
            handler,
            codec: RecordCodec::new(),
            config,
            events,
            metrics_level: MetricsLevel::default(),
            stream_name,
            shard_id: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Set the metrics granularity.
    pub fn with_metrics_level(mut self, level: MetricsLevel) -> Self {
        self.metrics_level = level;
        self
    }

    /// Wire a shutdown signal into the checkpoint retry loop.
    ///
    /// Cancellation observed mid-backoff abandons the remaining attempts,
    /// bounding shutdown latency by a single checkpoint attempt.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// The stream this processor consumes.
    pub fn stream(&self) -> &str {
        &self.stream_name
    }

    /// The shard this processor was assigned, once initialized.
    pub fn shard(&self) -> Option<&str> {
        self.shard_id.as_deref()
    }

    /// Bind the processor to its shard. No checkpoint is issued.
    pub fn initialize(&mut self, shard_id: impl Into<String>) {
        let shard_id = shard_id.into();
        info!(stream = %self.stream_name, shard = %shard_id, "initializing shard processor");
        self.events.publish(&LifecycleEvent::WorkerInitialized {
            stream: self.stream_name.clone(),
            shard: shard_id.clone(),
        });
        self.shard_id = Some(shard_id);
    }

    /// Process one delivered batch in order, then advance the checkpoint.
    pub async fn process_records(
        &mut self,
        batch: &[RawRecord],
        checkpointer: &dyn Checkpointer,
    ) -> Result<(), ProcessorError> {
        for raw in batch {
            let cx = self.context(raw);

            let record = match self.codec.decode(&raw.payload) {
                Ok(record) => record,
                Err(error) => {
                    self.count("kinesis_consumer_decode_failures_total");
                    self.handler
                        .on_decode_error(&raw.payload, &error, &cx)
                        .await
                        .map_err(|source| ProcessorError::DecodeCallback {
                            sequence_number: raw.sequence_number.clone(),
                            source,
                        })?;
                    continue;
                }
            };

            let started = Instant::now();
            if let Err(source) = self.handler.on_record(record, &cx).await {
                self.count("kinesis_consumer_handler_failures_total");
                warn!(
                    stream = %self.stream_name,
                    shard = %cx.shard_id,
                    sequence = %raw.sequence_number,
                    error = %source,
                    "handler failed, aborting batch"
                );
                return Err(ProcessorError::Handler {
                    sequence_number: raw.sequence_number.clone(),
                    source,
                });
            }
            self.count("kinesis_consumer_records_handled_total");
            if self.metrics_level == MetricsLevel::Detailed {
                metrics::histogram!(
                    "kinesis_consumer_handler_duration_seconds",
                    "stream" => self.stream_name.clone()
                )
                .record(started.elapsed().as_secs_f64());
            }

            if self.config.strategy == CheckpointStrategy::Record {
                checkpoint_with_retries(&self.config, &self.shutdown, || {
                    checkpointer.checkpoint_at(&raw.sequence_number)
                })
                .await?;
                self.count("kinesis_consumer_checkpoints_total");
            }
        }

        // An empty batch has no latest record to advance to.
        if self.config.strategy == CheckpointStrategy::Batch && !batch.is_empty() {
            checkpoint_with_retries(&self.config, &self.shutdown, || checkpointer.checkpoint())
                .await?;
            self.count("kinesis_consumer_checkpoints_total");
        }

        Ok(())
    }

    /// Graceful stop: checkpoint what was handled so far.
    pub async fn shutdown_requested(
        &mut self,
        checkpointer: &dyn Checkpointer,
    ) -> Result<(), ProcessorError> {
        info!(stream = %self.stream_name, shard = %self.shard_or_default(), "shutdown requested, checkpointing");
        let result =
            checkpoint_with_retries(&self.config, &self.shutdown, || checkpointer.checkpoint())
                .await;
        self.events.publish(&LifecycleEvent::ShutdownRequested {
            stream: self.stream_name.clone(),
            shard: self.shard_or_default(),
        });
        result.map_err(ProcessorError::Checkpoint)
    }

    /// The shard was closed and fully read. The upstream contract requires
    /// a final checkpoint to move the lease past the closed shard.
    pub async fn shard_ended(
        &mut self,
        checkpointer: &dyn Checkpointer,
    ) -> Result<(), ProcessorError> {
        info!(stream = %self.stream_name, shard = %self.shard_or_default(), "shard ended, issuing final checkpoint");
        let result =
            checkpoint_with_retries(&self.config, &self.shutdown, || checkpointer.checkpoint())
                .await;
        self.events.publish(&LifecycleEvent::ShardEnded {
            stream: self.stream_name.clone(),
            shard: self.shard_or_default(),
        });
        result.map_err(ProcessorError::Checkpoint)
    }

    /// The lease moved to another worker. Checkpointing here would clobber
    /// the new owner, so none is attempted.
    pub fn lease_lost(&mut self) {
        info!(stream = %self.stream_name, shard = %self.shard_or_default(), "lease lost, releasing without checkpoint");
        self.events.publish(&LifecycleEvent::LeaseLost {
            stream: self.stream_name.clone(),
            shard: self.shard_or_default(),
        });
    }

    fn context(&self, raw: &RawRecord) -> RecordContext {
        RecordContext {
            stream_name: self.stream_name.clone(),
            shard_id: self.shard_or_default(),
            sequence_number: raw.sequence_number.clone(),
            partition_key: raw.partition_key.clone(),
            approximate_arrival: raw.approximate_arrival,
        }
    }

    fn shard_or_default(&self) -> String {
        self.shard_id.clone().unwrap_or_default()
    }

    fn count(&self, name: &'static str) {
        if self.metrics_level == MetricsLevel::None {
            return;
        }
        metrics::counter!(name, "stream" => self.stream_name.clone()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Record;
    use crate::error::{CheckpointError, CodecError, HandlerError};
    use crate::types::SequenceNumber;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Payload {
        value: String,
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Meta {
        hash: String,
    }

    #[derive(Default)]
    struct RecordingHandler {
        handled: Mutex<Vec<String>>,
        decode_errors: Mutex<Vec<Vec<u8>>>,
        fail_on_value: Option<String>,
        fail_decode_callback: bool,
    }

    impl RecordingHandler {
        fn failing_on(value: &str) -> Self {
            Self {
                fail_on_value: Some(value.to_string()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RecordHandler for RecordingHandler {
        type Data = Payload;
        type Meta = Meta;

        fn stream(&self) -> &str {
            "greetings"
        }

        async fn on_record(
            &self,
            record: Record<Payload, Meta>,
            _cx: &RecordContext,
        ) -> Result<(), HandlerError> {
            self.handled.lock().push(record.data.value.clone());
            if self.fail_on_value.as_deref() == Some(record.data.value.as_str()) {
                return Err(HandlerError::msg("handler refused the record"));
            }
            Ok(())
        }

        async fn on_decode_error(
            &self,
            raw: &[u8],
            _error: &CodecError,
            _cx: &RecordContext,
        ) -> Result<(), HandlerError> {
            self.decode_errors.lock().push(raw.to_vec());
            if self.fail_decode_callback {
                return Err(HandlerError::msg("dead-letter store unavailable"));
            }
            Ok(())
        }
    }

    #[derive(Clone, Copy)]
    enum FaultKind {
        Retryable,
        Throttled,
        NonRetryable,
    }

    impl FaultKind {
        fn to_error(self) -> CheckpointError {
            match self {
                FaultKind::Retryable => CheckpointError::retryable("lease table busy"),
                FaultKind::Throttled => CheckpointError::throttled("rate exceeded"),
                FaultKind::NonRetryable => CheckpointError::non_retryable("lease gone"),
            }
        }
    }

    /// Records every attempt; `None` entries are batch checkpoints.
    struct ScriptedCheckpointer {
        calls: Mutex<Vec<Option<SequenceNumber>>>,
        remaining_failures: Mutex<u32>,
        kind: FaultKind,
    }

    impl ScriptedCheckpointer {
        fn ok() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                remaining_failures: Mutex::new(0),
                kind: FaultKind::Retryable,
            }
        }

        fn failing(kind: FaultKind, failures: u32) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                remaining_failures: Mutex::new(failures),
                kind,
            }
        }

        fn always_failing(kind: FaultKind) -> Self {
            Self::failing(kind, u32::MAX)
        }

        fn attempts(&self) -> Vec<Option<SequenceNumber>> {
            self.calls.lock().clone()
        }

        fn next_outcome(&self) -> Result<(), CheckpointError> {
            let mut remaining = self.remaining_failures.lock();
            if *remaining == 0 {
                return Ok(());
            }
            if *remaining != u32::MAX {
                *remaining -= 1;
            }
            Err(self.kind.to_error())
        }
    }

    #[async_trait]
    impl Checkpointer for ScriptedCheckpointer {
        async fn checkpoint(&self) -> Result<(), CheckpointError> {
            self.calls.lock().push(None);
            self.next_outcome()
        }

        async fn checkpoint_at(
            &self,
            sequence_number: &SequenceNumber,
        ) -> Result<(), CheckpointError> {
            self.calls.lock().push(Some(sequence_number.clone()));
            self.next_outcome()
        }
    }

    fn valid_record(seq: &str, value: &str, hash: &str) -> RawRecord {
        RawRecord::new(
            seq,
            value,
            format!(r#"{{"data":{{"value":"{value}"}},"metadata":{{"hash":"{hash}"}}}}"#),
        )
    }

    fn two_record_batch() -> Vec<RawRecord> {
        vec![
            valid_record("101", "first", "8b04"),
            valid_record("102", "second", "a9f0"),
        ]
    }

    fn processor(handler: RecordingHandler, config: CheckpointConfig) -> ShardProcessor<RecordingHandler> {
        let mut processor = ShardProcessor::new(Arc::new(handler), config, EventBus::new());
        processor.initialize("shardId-000");
        processor
    }

    fn fast(strategy: CheckpointStrategy) -> CheckpointConfig {
        CheckpointConfig::new()
            .with_strategy(strategy)
            .with_max_retries(2)
            .with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_batch_happy_path_checkpoints_once() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Batch));
        let checkpointer = ScriptedCheckpointer::ok();

        processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap();

        assert_eq!(
            *processor.handler.handled.lock(),
            vec!["first".to_string(), "second".to_string()]
        );
        assert_eq!(checkpointer.attempts(), vec![None]);
    }

    #[tokio::test]
    async fn test_batch_handler_failure_skips_checkpoint() {
        let mut processor = processor(
            RecordingHandler::failing_on("second"),
            fast(CheckpointStrategy::Batch),
        );
        let checkpointer = ScriptedCheckpointer::ok();

        let error = processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap_err();

        assert_eq!(processor.handler.handled.lock().len(), 2);
        assert!(checkpointer.attempts().is_empty());
        assert!(
            matches!(error, ProcessorError::Handler { ref sequence_number, .. } if sequence_number.as_str() == "102")
        );
    }

    #[tokio::test]
    async fn test_record_strategy_checkpoints_in_order() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Record));
        let checkpointer = ScriptedCheckpointer::ok();

        processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap();

        assert_eq!(
            checkpointer.attempts(),
            vec![Some("101".into()), Some("102".into())]
        );
    }

    #[tokio::test]
    async fn test_record_strategy_partial_checkpoint_on_failure() {
        let mut processor = processor(
            RecordingHandler::failing_on("second"),
            fast(CheckpointStrategy::Record),
        );
        let checkpointer = ScriptedCheckpointer::ok();

        let error = processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap_err();

        assert_eq!(processor.handler.handled.lock().len(), 2);
        assert_eq!(checkpointer.attempts(), vec![Some("101".into())]);
        assert!(matches!(error, ProcessorError::Handler { .. }));
    }

    #[tokio::test]
    async fn test_poisoned_record_is_skipped_not_fatal() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Batch));
        let checkpointer = ScriptedCheckpointer::ok();
        let batch = vec![
            valid_record("101", "first", "8b04"),
            RawRecord::new("102", "poison", "{foobar}"),
            valid_record("103", "third", "c2d1"),
        ];

        processor.process_records(&batch, &checkpointer).await.unwrap();

        assert_eq!(
            *processor.handler.handled.lock(),
            vec!["first".to_string(), "third".to_string()]
        );
        assert_eq!(processor.handler.decode_errors.lock().len(), 1);
        assert_eq!(checkpointer.attempts(), vec![None]);
    }

    #[tokio::test]
    async fn test_decode_callback_failure_aborts_batch() {
        let handler = RecordingHandler {
            fail_decode_callback: true,
            ..RecordingHandler::default()
        };
        let mut processor = processor(handler, fast(CheckpointStrategy::Batch));
        let checkpointer = ScriptedCheckpointer::ok();
        let batch = vec![RawRecord::new("101", "poison", "{foobar}")];

        let error = processor
            .process_records(&batch, &checkpointer)
            .await
            .unwrap_err();

        assert!(matches!(error, ProcessorError::DecodeCallback { .. }));
        assert!(checkpointer.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_no_op() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Batch));
        let checkpointer = ScriptedCheckpointer::ok();

        processor.process_records(&[], &checkpointer).await.unwrap();

        assert!(checkpointer.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_checkpoint_fault_recovers() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Batch));
        let checkpointer = ScriptedCheckpointer::failing(FaultKind::Retryable, 1);

        processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap();

        assert_eq!(checkpointer.attempts(), vec![None, None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_fault_attempts_are_bounded() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Batch));
        let checkpointer = ScriptedCheckpointer::always_failing(FaultKind::Retryable);

        let error = processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap_err();

        // 1 + max_retries attempts
        assert_eq!(checkpointer.attempts().len(), 3);
        assert!(matches!(
            error,
            ProcessorError::Checkpoint(CheckpointError::Retryable { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_throttling_returns_normally() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Batch));
        let checkpointer = ScriptedCheckpointer::always_failing(FaultKind::Throttled);

        processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap();

        assert_eq!(checkpointer.attempts().len(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fault_attempted_once() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Batch));
        let checkpointer = ScriptedCheckpointer::always_failing(FaultKind::NonRetryable);

        let error = processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap_err();

        assert_eq!(checkpointer.attempts().len(), 1);
        assert!(matches!(
            error,
            ProcessorError::Checkpoint(CheckpointError::NonRetryable { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_strategy_retryable_exhaustion_aborts_batch() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Record));
        let checkpointer = ScriptedCheckpointer::always_failing(FaultKind::Retryable);

        let error = processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap_err();

        // The first record's checkpoint exhausts its retries and the batch
        // aborts before the second record is handled.
        assert_eq!(processor.handler.handled.lock().len(), 1);
        assert_eq!(checkpointer.attempts().len(), 3);
        assert!(matches!(error, ProcessorError::Checkpoint(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_strategy_throttling_exhaustion_continues() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Record));
        let checkpointer = ScriptedCheckpointer::always_failing(FaultKind::Throttled);

        processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap();

        assert_eq!(processor.handler.handled.lock().len(), 2);
        // Each record's checkpoint runs the full 1 + max_retries attempts.
        assert_eq!(checkpointer.attempts().len(), 6);
    }

    #[tokio::test]
    async fn test_terminal_transitions_checkpoint_exactly_once() {
        let mut processor = processor(RecordingHandler::default(), fast(CheckpointStrategy::Batch));

        let checkpointer = ScriptedCheckpointer::ok();
        processor.shutdown_requested(&checkpointer).await.unwrap();
        assert_eq!(checkpointer.attempts(), vec![None]);

        let checkpointer = ScriptedCheckpointer::ok();
        processor.shard_ended(&checkpointer).await.unwrap();
        assert_eq!(checkpointer.attempts(), vec![None]);

        let checkpointer = ScriptedCheckpointer::ok();
        processor.lease_lost();
        assert!(checkpointer.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_publishes_exactly_one_event() {
        let events = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        events.subscribe(move |event: &LifecycleEvent| sink.lock().push(event.clone()));

        let mut processor = ShardProcessor::new(
            Arc::new(RecordingHandler::default()),
            fast(CheckpointStrategy::Batch),
            events,
        );
        processor.initialize("shardId-007");

        assert_eq!(processor.stream(), "greetings");
        assert_eq!(processor.shard(), Some("shardId-007"));
        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![LifecycleEvent::WorkerInitialized {
                stream: "greetings".to_string(),
                shard: "shardId-007".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_shutdown_token_bounds_checkpoint_retries() {
        let token = CancellationToken::new();
        token.cancel();

        let slow = CheckpointConfig::new()
            .with_max_retries(10)
            .with_backoff(Duration::from_secs(60));
        let mut processor = ShardProcessor::new(
            Arc::new(RecordingHandler::default()),
            slow,
            EventBus::new(),
        )
        .with_shutdown(token);
        processor.initialize("shardId-000");

        let checkpointer = ScriptedCheckpointer::always_failing(FaultKind::Retryable);
        let error = processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap_err();

        assert_eq!(checkpointer.attempts().len(), 1);
        assert!(matches!(error, ProcessorError::Checkpoint(_)));
    }

    #[tokio::test]
    async fn test_metrics_disabled_processing_still_succeeds() {
        let mut processor = ShardProcessor::new(
            Arc::new(RecordingHandler::default()),
            fast(CheckpointStrategy::Batch),
            EventBus::new(),
        )
        .with_metrics_level(MetricsLevel::None);
        processor.initialize("shardId-000");

        let checkpointer = ScriptedCheckpointer::ok();
        processor
            .process_records(&two_record_batch(), &checkpointer)
            .await
            .unwrap();
        assert_eq!(checkpointer.attempts(), vec![None]);
    }

    #[tokio::test]
    async fn test_lease_lost_publishes_event_without_checkpoint() {
        let events = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        events.subscribe(move |event: &LifecycleEvent| sink.lock().push(event.clone()));

        let mut processor = ShardProcessor::new(
            Arc::new(RecordingHandler::default()),
            fast(CheckpointStrategy::Batch),
            events,
        );
        processor.initialize("shardId-003");
        processor.lease_lost();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[1], LifecycleEvent::LeaseLost { .. }));
    }
}
