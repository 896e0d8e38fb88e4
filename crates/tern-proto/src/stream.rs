//! Streaming sub-protocol schemas: open, write, close.

use serde::{Deserialize, Serialize};

use crate::message::Header;

/// Parameters for opening a server-tracked message stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Identity the streamed message is attributed to.
    #[serde(default)]
    pub from_uid: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
    #[serde(default)]
    pub header: Header,
    /// Optional first chunk, delivered together with the open.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u8>,
}

/// Server acknowledgement of `/stream/open`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamOpenResp {
    /// Server-assigned stream identity, carried by every subsequent write.
    #[serde(default)]
    pub stream_no: String,
}

/// One incremental chunk appended to an open stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamWriteReq {
    pub stream_no: String,
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub from_uid: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
    #[serde(default)]
    pub payload: Vec<u8>,
}

/// Finalizes a stream; the server settles the assembled message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamCloseReq {
    pub stream_no: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
}
