//! The transport seam.
//!
//! The runtime never opens sockets itself. A transport crate (or the
//! in-process [`testkit`](crate::testkit) host) implements [`RpcChannel`];
//! the runtime consumes it through one outgoing call plus two subscriptions:
//! the inbound envelope stream and the link-status watch.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::Result;

/// Status codes carried in the RPC envelope, distinct from forwarded HTTP.
pub mod status {
    pub const OK: u32 = 200;
    pub const NOT_FOUND: u32 = 404;
    pub const ERROR: u32 = 500;
}

/// The fixed route universe on both sides of the channel.
pub mod paths {
    /// Registration, plugin to server.
    pub const PLUGIN_START: &str = "/plugin/start";

    // Server to plugin.
    pub const PLUGIN_SEND: &str = "/plugin/send";
    pub const PLUGIN_PERSIST_AFTER: &str = "/plugin/persist_after";
    pub const PLUGIN_ROUTE: &str = "/plugin/route";
    pub const PLUGIN_REPLY: &str = "/plugin/reply";
    pub const PLUGIN_CONFIG_UPDATE: &str = "/plugin/config_update";
    pub const STOP: &str = "/stop";

    // Plugin to server.
    pub const STREAM_OPEN: &str = "/stream/open";
    pub const STREAM_WRITE: &str = "/stream/write";
    pub const STREAM_CLOSE: &str = "/stream/close";
    pub const MESSAGE_SEND: &str = "/message/send";
    pub const CHANNEL_MESSAGES: &str = "/channel/messages";
    pub const CONVERSATION_CHANNELS: &str = "/conversation/channels";
    pub const CLUSTER_CHANNEL_BELONG_NODE: &str = "/cluster/channels/belongNode";
    pub const PLUGIN_HTTP_FORWARD: &str = "/plugin/httpForward";
}

/// Envelope-level reply to a single RPC request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcResponse {
    pub status: u32,
    pub body: Vec<u8>,
}

impl RpcResponse {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: status::OK,
            body,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: status::ERROR,
            body: message.into().into_bytes(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: status::NOT_FOUND,
            body: message.into().into_bytes(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == status::OK
    }
}

/// One envelope delivered by the transport.
///
/// Requests expect exactly one reply through the enclosed sender; pushes are
/// fire-and-forget notifications keyed by an integer message-type tag.
#[derive(Debug)]
pub enum Inbound {
    Request {
        path: String,
        body: Vec<u8>,
        reply: oneshot::Sender<RpcResponse>,
    },
    Push {
        tag: u32,
        body: Vec<u8>,
    },
}

/// Link status as the transport sees it.
///
/// The runtime registers the plugin on every transition into
/// `Authenticated`; everything below that is the transport's business
/// (dialing, backoff, the auth handshake).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connected,
    Authenticated,
}

/// The subscriptions handed over when a channel is opened.
pub struct ChannelStreams {
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
    pub link_state: watch::Receiver<LinkState>,
}

/// A duplex RPC channel to the Tern server.
#[async_trait]
pub trait RpcChannel: Send + Sync + 'static {
    /// Hand over the inbound stream and the link-status watch.
    ///
    /// Called exactly once, at serve time, before any traffic flows.
    async fn open(&self) -> Result<ChannelStreams>;

    /// Send one request and await the server's envelope reply.
    ///
    /// Implementations do not time out; the runtime bounds every call site.
    async fn request(&self, path: &str, body: Vec<u8>) -> Result<RpcResponse>;
}
