//! Tern plugin wire protocol.
//!
//! Payload schemas exchanged between the Tern server and an out-of-process
//! plugin over the local RPC channel, plus the codec that frames them.
//! Both sides of the channel depend on this crate and nothing else in it.

pub mod codec;
pub mod http;
pub mod message;
pub mod payload;
pub mod plugin;
pub mod query;
pub mod stream;

pub use codec::{CodecError, decode, encode};
pub use http::{HttpRequest, HttpResponse};
pub use message::{
    CHANNEL_TYPE_GROUP, CHANNEL_TYPE_PERSON, Header, Message, MessageBatch, RecvPacket, SendPacket,
    SendReq, SendResp,
};
pub use payload::{PAYLOAD_KIND_TEXT, Payload, TextPayload, person_channel_id};
pub use plugin::{ConfigTemplate, PluginInfo, StartupResp, TemplateField};
pub use query::{
    Channel, ChannelMessageBatchReq, ChannelMessageBatchResp, ChannelMessageReq,
    ChannelMessageResp, ClusterChannelBelongNodeBatchResp, ClusterChannelBelongNodeReq,
    ClusterChannelBelongNodeResp, ConversationChannelReq, ConversationChannelResp, ForwardHttpReq,
};
pub use stream::{StreamCloseReq, StreamInfo, StreamOpenResp, StreamWriteReq};
