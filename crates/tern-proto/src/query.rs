//! Host query schemas: read-side lookups a plugin can issue against the
//! server, plus cross-node HTTP forwarding.

use serde::{Deserialize, Serialize};

use crate::http::HttpRequest;
use crate::message::Message;

/// A channel reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
}

/// One range query against a channel's message log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessageReq {
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
    /// First sequence to return, inclusive. Zero means from the start.
    #[serde(default)]
    pub start_message_seq: u64,
    /// Last sequence to return, exclusive. Zero means no upper bound.
    #[serde(default)]
    pub end_message_seq: u64,
    #[serde(default)]
    pub limit: u32,
}

/// Several range queries resolved in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessageBatchReq {
    #[serde(default)]
    pub requests: Vec<ChannelMessageReq>,
}

/// Messages answering one [`ChannelMessageReq`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessageResp {
    pub channel_id: String,
    #[serde(default)]
    pub channel_type: u8,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessageBatchResp {
    #[serde(default)]
    pub responses: Vec<ChannelMessageResp>,
}

/// Asks for the channels in one user's recent-conversation list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationChannelReq {
    pub uid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationChannelResp {
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// Asks which cluster node owns each of the given channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterChannelBelongNodeReq {
    #[serde(default)]
    pub channels: Vec<Channel>,
}

/// Channels grouped under the node that owns them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterChannelBelongNodeResp {
    pub node_id: u64,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterChannelBelongNodeBatchResp {
    #[serde(default)]
    pub nodes: Vec<ClusterChannelBelongNodeResp>,
}

/// Forwards an HTTP request to the plugin instance on another cluster node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForwardHttpReq {
    /// Plugin identity to address; the runtime fills in its own when empty.
    #[serde(default)]
    pub plugin_no: String,
    pub to_node_id: u64,
    #[serde(default)]
    pub request: HttpRequest,
}
