//! Message body helpers.
//!
//! The server treats message payloads as opaque bytes; by convention Tern
//! clients put a small JSON document there with a numeric `type` field.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};

/// Payload kind of a plain text message.
pub const PAYLOAD_KIND_TEXT: u32 = 1;

/// A typed message body that can cross the channel as payload bytes.
pub trait Payload: Serialize + DeserializeOwned {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }
}

/// The standard text message body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: u32,
}

impl TextPayload {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: PAYLOAD_KIND_TEXT,
        }
    }
}

impl Payload for TextPayload {}

/// The deterministic channel id of the direct conversation between two users.
///
/// Both peers (and the server) derive the same id regardless of which side
/// computes it: the two uids joined lowest-first with `@`.
pub fn person_channel_id(a_uid: &str, b_uid: &str) -> String {
    if a_uid <= b_uid {
        format!("{a_uid}@{b_uid}")
    } else {
        format!("{b_uid}@{a_uid}")
    }
}
