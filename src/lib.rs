//! Kinesis Consumer Runtime
//!
//! A stream-consumer runtime for Amazon Kinesis Data Streams: typed
//! record processing with per-shard ordering, batch or per-record
//! checkpointing with bounded retries, per-stream client configuration,
//! and a typed publish path sharing the same wire envelope.
//!
//! Records travel as JSON objects with two top-level keys, `data` and
//! `metadata`. A [`RecordHandler`] declares the types under each key and
//! receives decoded records in shard order; a [`ShardProcessor`] drives
//! one shard's batches through the handler and advances the checkpoint.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use kinesis_consumer::{
//!     CheckpointConfig, EventBus, HandlerError, Record, RecordContext, RecordHandler,
//!     ShardProcessor,
//! };
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Deserialize)]
//! struct Greeting {
//!     message: String,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct EventMeta {
//!     hash: String,
//! }
//!
//! struct GreetingHandler;
//!
//! #[async_trait]
//! impl RecordHandler for GreetingHandler {
//!     type Data = Greeting;
//!     type Meta = EventMeta;
//!
//!     fn stream(&self) -> &str {
//!         "greetings"
//!     }
//!
//!     async fn on_record(
//!         &self,
//!         record: Record<Greeting, EventMeta>,
//!         _cx: &RecordContext,
//!     ) -> Result<(), HandlerError> {
//!         println!("{} ({})", record.data.message, record.metadata.hash);
//!         Ok(())
//!     }
//! }
//!
//! // One processor per shard assignment; the hosting scheduler calls
//! // initialize, process_records, and the terminal transitions.
//! let mut processor = ShardProcessor::new(
//!     Arc::new(GreetingHandler),
//!     CheckpointConfig::default(),
//!     EventBus::new(),
//! );
//! processor.initialize("shardId-000000000000");
//! ```

mod checkpoint;
mod codec;
mod config;
mod customizer;
mod error;
mod events;
mod gateway;
mod handler;
mod metrics;
mod processor;
mod scheduler;
mod types;

pub use checkpoint::{CheckpointConfig, Checkpointer};
pub use codec::{encode_envelope, Record, RecordCodec};
pub use config::{
    disable_cbor_encoding, CheckpointSettings, ConsumerSettings, DynamoDbSettings, StreamSettings,
};
pub use customizer::{ClientCustomizerFactory, StreamClientCustomizer};
pub use error::{
    BoxError, CheckpointError, CodecError, ConfigError, HandlerError, ProcessorError, PublishError,
};
pub use events::{EventBus, LifecycleEvent, Subscriber};
pub use gateway::{partition_key_for, OutboundGateway, PublishReceipt};
pub use handler::RecordHandler;
pub use metrics::{ExecutorMonitor, MetricsSink};
pub use processor::ShardProcessor;
pub use scheduler::{
    CoordinatorConfig, ExecutorConfig, HttpMode, LeaseManagementConfig, MetricsConfig,
    RetrievalConfig, RetrievalMode,
};
pub use types::{
    CheckpointStrategy, InitialPosition, MetricsDriver, MetricsLevel, RawRecord, RecordContext,
    RetrievalStrategy, SequenceNumber,
};
