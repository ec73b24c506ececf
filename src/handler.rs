//! The contract a stream handler implements.

use crate::codec::Record;
use crate::error::{CodecError, HandlerError};
use crate::types::RecordContext;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;

/// A typed handler for one stream.
///
/// Implement this trait to receive the decoded records of a stream. The
/// associated types bind the decoder at compile time; one processor per
/// shard drives the callbacks, so implementations only need interior
/// mutability when they share state across shards.
///
/// # Example
///
/// ```rust,ignore
/// struct GreetingHandler;
///
/// #[async_trait]
/// impl RecordHandler for GreetingHandler {
///     type Data = Greeting;
///     type Meta = EventMetadata;
///
///     fn stream(&self) -> &str {
///         "greetings"
///     }
///
///     async fn on_record(
///         &self,
///         record: Record<Greeting, EventMetadata>,
///         cx: &RecordContext,
///     ) -> Result<(), HandlerError> {
///         store.save(record.data).await.map_err(HandlerError::new)
///     }
/// }
/// ```
#[async_trait]
pub trait RecordHandler: Send + Sync + 'static {
    /// The payload type under the envelope's `data` key.
    type Data: DeserializeOwned + Send;
    /// The metadata type under the envelope's `metadata` key.
    type Meta: DeserializeOwned + Send;

    /// Name of the stream this handler binds to.
    fn stream(&self) -> &str;

    /// Called once for every successfully decoded record, in shard order.
    ///
    /// Returning an error aborts the current batch; the hosting scheduler
    /// redelivers it from the last checkpoint.
    async fn on_record(
        &self,
        record: Record<Self::Data, Self::Meta>,
        cx: &RecordContext,
    ) -> Result<(), HandlerError>;

    /// Called when a record's payload cannot be decoded.
    ///
    /// The record is skipped either way; it is never redelivered and never
    /// blocks the batch checkpoint. The default logs and moves on -
    /// override to dead-letter the raw bytes. Returning an error aborts
    /// the batch.
    async fn on_decode_error(
        &self,
        raw: &[u8],
        error: &CodecError,
        cx: &RecordContext,
    ) -> Result<(), HandlerError> {
        warn!(
            stream = %cx.stream_name,
            shard = %cx.shard_id,
            sequence = %cx.sequence_number,
            bytes = raw.len(),
            %error,
            "skipping record that failed to decode"
        );
        Ok(())
    }
}
