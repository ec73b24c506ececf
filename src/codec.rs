//! Record (de)serialization for the two-field JSON envelope.
//!
//! Every record on the wire is a UTF-8 JSON object with exactly two
//! top-level keys, `data` and `metadata`. The inbound decoder and the
//! outbound encoder share this contract.

use crate::error::CodecError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;

/// A decoded record: the user payload plus its metadata document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record<D, M> {
    /// The business payload.
    pub data: D,
    /// The metadata document carried alongside it.
    pub metadata: M,
}

/// Decoder bound to one handler's data and metadata types.
///
/// The binding happens at construction, so a processor decodes every
/// record of its shard without re-resolving types.
#[derive(Debug)]
pub struct RecordCodec<D, M> {
    _marker: PhantomData<fn() -> (D, M)>,
}

impl<D, M> Default for RecordCodec<D, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, M> Clone for RecordCodec<D, M> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<D, M> RecordCodec<D, M> {
    /// Create a codec for the given type pair.
    pub fn new() -> Self {
        RecordCodec {
            _marker: PhantomData,
        }
    }
}

impl<D: DeserializeOwned, M: DeserializeOwned> RecordCodec<D, M> {
    /// Decode raw payload bytes into a typed record.
    ///
    /// The decode is strictly structural: the bytes must form a JSON
    /// object whose only keys are `data` and `metadata`, and each subtree
    /// must match the bound type. No defaulting, no schema evolution.
    pub fn decode(&self, raw: &[u8]) -> Result<Record<D, M>, CodecError> {
        let value: Value = serde_json::from_slice(raw).map_err(CodecError::Json)?;
        let Value::Object(mut fields) = value else {
            return Err(CodecError::NotAnObject);
        };

        if let Some(unknown) = fields.keys().find(|key| *key != "data" && *key != "metadata") {
            return Err(CodecError::UnknownField(unknown.clone()));
        }

        let data = fields
            .remove("data")
            .ok_or(CodecError::MissingField("data"))?;
        let metadata = fields
            .remove("metadata")
            .ok_or(CodecError::MissingField("metadata"))?;

        Ok(Record {
            data: serde_json::from_value(data).map_err(CodecError::Data)?,
            metadata: serde_json::from_value(metadata).map_err(CodecError::Metadata)?,
        })
    }
}

/// Serialize a `(data, metadata)` pair into the wire envelope.
pub fn encode_envelope<D: Serialize, M: Serialize>(
    data: &D,
    metadata: &M,
) -> Result<Vec<u8>, CodecError> {
    #[derive(Serialize)]
    struct Envelope<'a, D, M> {
        data: &'a D,
        metadata: &'a M,
    }

    serde_json::to_vec(&Envelope { data, metadata }).map_err(CodecError::Encode)
}
