//! Payload codec.
//!
//! Every schema in this crate crosses the RPC channel as JSON bytes. The
//! envelope framing (lengths, request ids, auth) belongs to the transport;
//! this module only turns typed payloads into body bytes and back.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure to encode or decode a payload body.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("payload decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Serialize a payload into body bytes.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(CodecError::Encode)
}

/// Deserialize body bytes into a payload.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}
