//! Error types for the Kinesis consumer runtime.

use crate::types::SequenceNumber;
use thiserror::Error;

/// Boxed error type used to carry arbitrary user-level causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error produced when a record payload cannot be decoded.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing top-level field `{0}`")]
    MissingField(&'static str),

    #[error("unknown top-level field `{0}`")]
    UnknownField(String),

    #[error("field `data` does not match the handler's data type: {0}")]
    Data(#[source] serde_json::Error),

    #[error("field `metadata` does not match the handler's metadata type: {0}")]
    Metadata(#[source] serde_json::Error),

    #[error("failed to serialize record envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Error returned by a handler callback.
///
/// Wraps the handler's own cause so it surfaces unchanged to the caller.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct HandlerError(#[from] BoxError);

impl HandlerError {
    /// Wrap an arbitrary cause.
    pub fn new(cause: impl Into<BoxError>) -> Self {
        HandlerError(cause.into())
    }

    /// Create an error from a message alone.
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError(message.into().into())
    }
}

/// Fault raised by the upstream checkpoint store.
///
/// The variant decides the retry policy: `Retryable` and `Throttled` loop
/// up to the configured bound, `NonRetryable` surfaces immediately.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("transient checkpoint fault: {source}")]
    Retryable {
        #[source]
        source: BoxError,
    },

    #[error("checkpoint throttled by upstream: {source}")]
    Throttled {
        #[source]
        source: BoxError,
    },

    #[error("permanent checkpoint fault: {source}")]
    NonRetryable {
        #[source]
        source: BoxError,
    },
}

impl CheckpointError {
    /// A transient coordination-layer fault worth retrying.
    pub fn retryable(source: impl Into<BoxError>) -> Self {
        CheckpointError::Retryable {
            source: source.into(),
        }
    }

    /// An upstream rate limit.
    pub fn throttled(source: impl Into<BoxError>) -> Self {
        CheckpointError::Throttled {
            source: source.into(),
        }
    }

    /// A permanent fault, e.g. the lease is gone or the worker is shut down.
    pub fn non_retryable(source: impl Into<BoxError>) -> Self {
        CheckpointError::NonRetryable {
            source: source.into(),
        }
    }

    /// Whether the retry loop may attempt this fault again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckpointError::Retryable { .. } | CheckpointError::Throttled { .. }
        )
    }

    /// Whether exhausted retries should be swallowed rather than propagated.
    pub fn is_throttled(&self) -> bool {
        matches!(self, CheckpointError::Throttled { .. })
    }
}

/// Error surfaced by the record processor to the hosting scheduler.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The handler failed on a decoded record. The batch is redelivered.
    #[error("handler failed on record {sequence_number}: {source}")]
    Handler {
        sequence_number: SequenceNumber,
        #[source]
        source: HandlerError,
    },

    /// The decode-error callback itself failed. The batch is redelivered.
    #[error("decode-error callback failed on record {sequence_number}: {source}")]
    DecodeCallback {
        sequence_number: SequenceNumber,
        #[source]
        source: HandlerError,
    },

    /// A checkpoint fault that the retry policy did not absorb.
    #[error("checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Error raised when the consumer settings are unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),

    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}

/// Error raised on the outbound publish path.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode record for publishing: {0}")]
    Encode(#[from] CodecError),

    #[error("kinesis rejected the publish: {0}")]
    Kinesis(#[source] BoxError),
}
