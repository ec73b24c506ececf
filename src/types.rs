//! Core types for the Kinesis consumer runtime.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Sequence number of a record within a shard.
///
/// Sequence numbers are:
/// - Opaque: Do not parse or interpret their structure
/// - Ordered: Within one shard, later records carry later sequence numbers
/// - Unique: Each record in a shard has exactly one sequence number
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SequenceNumber(String);

impl SequenceNumber {
    /// Create a sequence number from its wire representation.
    pub fn new(s: impl Into<String>) -> Self {
        SequenceNumber(s.into())
    }

    /// Get the wire representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SequenceNumber {
    fn from(s: String) -> Self {
        SequenceNumber(s)
    }
}

impl From<&str> for SequenceNumber {
    fn from(s: &str) -> Self {
        SequenceNumber(s.to_string())
    }
}

/// A raw record as delivered by the retrieval layer, before decoding.
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// Position of the record within its shard.
    pub sequence_number: SequenceNumber,
    /// Partition key the producer supplied.
    pub partition_key: String,
    /// The undecoded payload bytes.
    pub payload: Bytes,
    /// Server-side arrival timestamp, approximate.
    pub approximate_arrival: SystemTime,
}

impl RawRecord {
    /// Create a raw record arriving now.
    pub fn new(
        sequence_number: impl Into<SequenceNumber>,
        partition_key: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            sequence_number: sequence_number.into(),
            partition_key: partition_key.into(),
            payload: payload.into(),
            approximate_arrival: SystemTime::now(),
        }
    }
}

/// Per-record side channel passed to handler callbacks.
///
/// Carries the identity of the record being processed so handlers can
/// correlate and log without holding a reference to the processor.
#[derive(Debug, Clone)]
pub struct RecordContext {
    /// The stream this record was read from.
    pub stream_name: String,
    /// The shard this record was read from.
    pub shard_id: String,
    /// Sequence number of the record within the shard.
    pub sequence_number: SequenceNumber,
    /// Partition key of the record.
    pub partition_key: String,
    /// Server-side arrival timestamp, approximate.
    pub approximate_arrival: SystemTime,
}

/// When to issue checkpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointStrategy {
    /// One checkpoint per successfully handled batch.
    #[default]
    Batch,
    /// One checkpoint per successfully handled record.
    Record,
}

/// How records are pulled from the stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RetrievalStrategy {
    /// Push-based enhanced fan-out subscription.
    #[default]
    Fanout,
    /// Periodic GetRecords polling.
    Polling,
}

/// Where to start reading when no checkpoint exists for a shard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InitialPosition {
    /// Start at the current tail - only future records.
    #[default]
    Latest,
    /// Start at the oldest retained record.
    TrimHorizon,
    /// Start at the first record at or after the given timestamp.
    AtTimestamp(SystemTime),
}

/// Granularity of metrics emitted for processing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricsLevel {
    /// No metrics at all.
    None,
    /// Aggregated per-batch metrics.
    #[default]
    Summary,
    /// Per-record metrics including handler latency.
    Detailed,
}

/// Which metrics backend the customizer wires up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricsDriver {
    /// Leave the upstream default untouched.
    #[default]
    Default,
    /// Discard all metrics.
    None,
    /// Emit metrics as structured log lines.
    Logging,
    /// Bind to an installed Prometheus recorder.
    Prometheus,
}
