//! Outbound publish path.
//!
//! Emits `(data, metadata)` pairs into a named stream using the same
//! envelope the inbound decoder reads, so anything this gateway writes
//! round-trips through a handler on the other side.

use crate::codec::encode_envelope;
use crate::error::PublishError;
use crate::types::SequenceNumber;
use aws_sdk_kinesis::primitives::Blob;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Acknowledgement for one published record.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    /// The shard the record landed on.
    pub shard_id: String,
    /// The sequence number the record was assigned.
    pub sequence_number: SequenceNumber,
}

/// Typed publisher into Kinesis streams.
///
/// Cheap to clone; clones share the underlying client and its connection
/// pool.
#[derive(Clone, Debug)]
pub struct OutboundGateway {
    client: aws_sdk_kinesis::Client,
}

impl OutboundGateway {
    /// Create a gateway over a configured client.
    pub fn new(client: aws_sdk_kinesis::Client) -> Self {
        Self { client }
    }

    /// Publish a record with the default, metadata-derived partition key.
    ///
    /// Records carrying identical metadata land on the same shard, which
    /// preserves their relative order.
    pub async fn send<D: Serialize, M: Serialize>(
        &self,
        stream: &str,
        data: &D,
        metadata: &M,
    ) -> Result<PublishReceipt, PublishError> {
        let key = partition_key_for(metadata)?;
        self.send_with_partition_key(stream, &key, data, metadata)
            .await
    }

    /// Publish a record under a caller-supplied partition key.
    pub async fn send_with_partition_key<D: Serialize, M: Serialize>(
        &self,
        stream: &str,
        partition_key: &str,
        data: &D,
        metadata: &M,
    ) -> Result<PublishReceipt, PublishError> {
        let payload = encode_envelope(data, metadata)?;

        let output = self
            .client
            .put_record()
            .stream_name(stream)
            .partition_key(partition_key)
            .data(Blob::new(payload))
            .send()
            .await
            .map_err(|error| PublishError::Kinesis(Box::new(error)))?;

        let receipt = PublishReceipt {
            shard_id: output.shard_id().to_string(),
            sequence_number: output.sequence_number().into(),
        };
        debug!(
            stream,
            partition_key,
            shard = %receipt.shard_id,
            sequence = %receipt.sequence_number,
            "published record"
        );
        Ok(receipt)
    }
}

/// Derive the default partition key from a metadata document.
///
/// SHA-256 over the serialized metadata, hex-encoded and truncated.
/// Deterministic by construction: the same metadata always keys to the
/// same shard.
pub fn partition_key_for<M: Serialize>(metadata: &M) -> Result<String, PublishError> {
    let bytes = serde_json::to_vec(metadata)
        .map_err(|error| PublishError::Encode(crate::error::CodecError::Encode(error)))?;
    let digest = Sha256::digest(&bytes);
    Ok(digest
        .iter()
        .take(16)
        .map(|byte| format!("{byte:02x}"))
        .collect())
}
