//! Message-path schemas: the packets the server hands to plugins and the
//! send request plugins hand back.

use serde::{Deserialize, Serialize};

/// Direct person-to-person channel.
pub const CHANNEL_TYPE_PERSON: u8 = 1;
/// Group channel.
pub const CHANNEL_TYPE_GROUP: u8 = 2;

/// Per-message delivery flags, mirrored from the client protocol framer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Message is not written to the message store.
    #[serde(default)]
    pub no_persist: bool,
    /// Message increments the receiver's unread badge.
    #[serde(default)]
    pub red_dot: bool,
    /// Message is delivered to exactly one device of the receiver.
    #[serde(default)]
    pub sync_once: bool,
}

/// An outbound packet intercepted before persistence and delivery.
///
/// This is the one schema a plugin may mutate: the server re-reads the whole
/// packet after the plugin's send hook returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendPacket {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub client_msg_no: String,
    #[serde(default)]
    pub from_uid: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
    #[serde(default)]
    pub payload: Vec<u8>,
}

/// An inbound packet the server selected for automated reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecvPacket {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub message_seq: u64,
    #[serde(default)]
    pub client_msg_no: String,
    #[serde(default)]
    pub from_uid: String,
    #[serde(default)]
    pub to_uid: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
    #[serde(default)]
    pub payload: Vec<u8>,
}

/// A message that has already been written to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub message_seq: u64,
    #[serde(default)]
    pub client_msg_no: String,
    #[serde(default)]
    pub timestamp: u32,
    #[serde(default)]
    pub from_uid: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
    #[serde(default)]
    pub payload: Vec<u8>,
}

/// An ordered batch of persisted messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch {
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// A plugin-originated send, submitted to the server for normal delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendReq {
    #[serde(default)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_msg_no: String,
    #[serde(default)]
    pub from_uid: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
    #[serde(default)]
    pub payload: Vec<u8>,
}

/// Server acknowledgement of a plugin-originated send.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendResp {
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub client_msg_no: String,
}
