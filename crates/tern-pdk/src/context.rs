//! Per-invocation contexts handed to hooks.
//!
//! Each server-initiated operation gets exactly one of these, built fresh by
//! the dispatcher: hooks never see the transport, only the context and the
//! [`Host`] handle bound into it.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use tern_proto::{
    CHANNEL_TYPE_PERSON, Header, HttpRequest, HttpResponse, Message, RecvPacket, SendPacket,
    SendReq, SendResp, StreamInfo,
};

use crate::error::Result;
use crate::runtime::Host;
use crate::stream::Stream;

/// Context of one intercepted outbound packet.
///
/// The packet is the plugin's to rewrite; the server re-reads the whole
/// thing after the send hook returns.
pub struct SendContext {
    packet: SendPacket,
    host: Host,
}

impl SendContext {
    pub(crate) fn new(packet: SendPacket, host: Host) -> Self {
        Self { packet, host }
    }

    pub fn packet(&self) -> &SendPacket {
        &self.packet
    }

    pub fn packet_mut(&mut self) -> &mut SendPacket {
        &mut self.packet
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub(crate) fn into_packet(self) -> SendPacket {
        self.packet
    }
}

/// Read-only context over a batch of already-persisted messages.
pub struct BatchContext {
    messages: Vec<Message>,
    host: Host,
}

impl BatchContext {
    pub(crate) fn new(messages: Vec<Message>, host: Host) -> Self {
        Self { messages, host }
    }

    /// The persisted messages, in store order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn host(&self) -> &Host {
        &self.host
    }
}

/// Pre-set header and first chunk for [`ReceiveContext::open_stream`].
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// Delivery overrides for [`ReceiveContext::reply`].
#[derive(Debug, Clone, Default)]
pub struct ReplyOptions {
    pub header: Option<Header>,
    pub client_msg_no: Option<String>,
}

/// Context of one inbound packet selected for automated reply.
///
/// Replies and streams speak as the packet's original recipient, back into
/// the conversation the packet came from.
pub struct ReceiveContext {
    packet: RecvPacket,
    host: Host,
}

impl ReceiveContext {
    pub(crate) fn new(packet: RecvPacket, host: Host) -> Self {
        Self { packet, host }
    }

    pub fn packet(&self) -> &RecvPacket {
        &self.packet
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Channel a reply lands in: the counter-party uid for person channels,
    /// the channel itself for everything else.
    pub fn reply_channel(&self) -> (String, u8) {
        if self.packet.channel_type == CHANNEL_TYPE_PERSON {
            (self.packet.from_uid.clone(), CHANNEL_TYPE_PERSON)
        } else {
            (self.packet.channel_id.clone(), self.packet.channel_type)
        }
    }

    /// Open a server-tracked stream into the packet's conversation.
    pub async fn open_stream(&self, opts: StreamOptions) -> Result<Stream> {
        let (channel_id, channel_type) = self.reply_channel();
        let info = StreamInfo {
            from_uid: self.packet.to_uid.clone(),
            channel_id,
            channel_type,
            header: opts.header,
            payload: opts.payload,
        };
        self.host.open_stream(info).await
    }

    /// Send a single complete reply into the packet's conversation.
    pub async fn reply(&self, payload: Vec<u8>, opts: ReplyOptions) -> Result<SendResp> {
        let (channel_id, channel_type) = self.reply_channel();
        let req = SendReq {
            header: opts.header.unwrap_or_default(),
            client_msg_no: opts.client_msg_no.unwrap_or_default(),
            from_uid: self.packet.to_uid.clone(),
            channel_id,
            channel_type,
            payload,
        };
        self.host.send_message(req).await
    }
}

/// Context of one forwarded HTTP request.
pub struct HttpContext {
    request: HttpRequest,
    response: HttpResponse,
    host: Host,
}

impl HttpContext {
    pub(crate) fn new(request: HttpRequest, host: Host) -> Self {
        Self {
            request,
            response: HttpResponse::default(),
            host,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Query-string parameter, if present.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.request.query.get(key).map(String::as_str)
    }

    /// Request header, if present.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.request.headers.get(key).map(String::as_str)
    }

    /// Decode the request body as JSON.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(tern_proto::decode(&self.request.body)?)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response.headers.insert(name.into(), value.into());
    }

    /// Answer with raw bytes.
    pub fn write(&mut self, status: u16, body: Vec<u8>) {
        self.response.status = status;
        self.response.body = body;
    }

    /// Answer with a JSON document.
    pub fn json<T: Serialize>(&mut self, status: u16, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.set_header("content-type", "application/json");
                self.write(status, body);
            }
            Err(err) => {
                warn!(error = %err, "http response body failed to serialize");
                self.write(500, Vec::new());
            }
        }
    }

    /// Answer with the standard upstream-failure shape.
    pub fn error(&mut self, err: impl fmt::Display) {
        self.json(502, &serde_json::json!({ "msg": err.to_string() }));
    }

    pub(crate) fn not_found(&mut self) {
        self.write(404, b"404 page not found".to_vec());
    }

    pub(crate) fn into_response(self) -> HttpResponse {
        self.response
    }
}
