//! In-process test host.
//!
//! [`MockHost`] implements [`RpcChannel`] entirely in memory: tests (and the
//! demo binaries) authenticate it, inject server-side requests and pushes,
//! and inspect every request the plugin made. Responses are canned
//! per-path, with sensible defaults for the routes the runtime itself uses.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::time::Instant;

use tern_proto::{PluginInfo, SendResp, StartupResp, StreamOpenResp};

use crate::error::{PdkError, Result};
use crate::hooks::Hooks;
use crate::plugin::Plugin;
use crate::rpc::{ChannelStreams, Inbound, LinkState, RpcChannel, RpcResponse, paths};
use crate::runtime::{Host, RuntimeInner};

/// One plugin-initiated request, as the host saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub body: Vec<u8>,
}

type Responder = Box<dyn Fn(&[u8]) -> RpcResponse + Send + Sync>;

pub struct MockHost {
    inbound: mpsc::UnboundedSender<Inbound>,
    streams: Mutex<Option<ChannelStreams>>,
    link_state: watch::Sender<LinkState>,
    calls: Mutex<Vec<RecordedCall>>,
    responders: Mutex<HashMap<String, Responder>>,
    stalled: Mutex<HashSet<String>>,
    counter: AtomicU64,
}

impl MockHost {
    pub fn new() -> Arc<Self> {
        let (inbound, inbound_rx) = mpsc::unbounded_channel();
        let (link_state, link_state_rx) = watch::channel(LinkState::Disconnected);
        Arc::new(Self {
            inbound,
            streams: Mutex::new(Some(ChannelStreams {
                inbound: inbound_rx,
                link_state: link_state_rx,
            })),
            link_state,
            calls: Mutex::new(Vec::new()),
            responders: Mutex::new(HashMap::new()),
            stalled: Mutex::new(HashSet::new()),
            counter: AtomicU64::new(0),
        })
    }

    /// Report the link as authenticated; the runtime registers in response.
    pub fn authenticate(&self) {
        self.link_state.send_replace(LinkState::Authenticated);
    }

    /// Report the link as lost.
    pub fn drop_link(&self) {
        self.link_state.send_replace(LinkState::Disconnected);
    }

    /// Inject a server-initiated request and await the plugin's answer.
    pub async fn request_plugin(&self, path: impl Into<String>, body: Vec<u8>) -> RpcResponse {
        let (reply, reply_rx) = oneshot::channel();
        let envelope = Inbound::Request {
            path: path.into(),
            body,
            reply,
        };
        if self.inbound.send(envelope).is_err() {
            return RpcResponse::error("plugin inbound channel closed");
        }
        match reply_rx.await {
            Ok(response) => response,
            Err(_) => RpcResponse::error("plugin dropped the request"),
        }
    }

    /// Inject a fire-and-forget push.
    pub fn push(&self, tag: u32, body: Vec<u8>) {
        let _ = self.inbound.send(Inbound::Push { tag, body });
    }

    /// Script the response for a path, replacing the built-in default.
    pub async fn respond_with<F>(&self, path: &str, responder: F)
    where
        F: Fn(&[u8]) -> RpcResponse + Send + Sync + 'static,
    {
        self.responders
            .lock()
            .await
            .insert(path.to_string(), Box::new(responder));
    }

    /// Never answer requests against `path`; the caller's timeout decides.
    pub async fn stall(&self, path: &str) {
        self.stalled.lock().await.insert(path.to_string());
    }

    /// Every plugin-initiated request so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    /// Bodies of the plugin-initiated requests against one path.
    pub async fn calls_to(&self, path: &str) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.path == path)
            .map(|call| call.body.clone())
            .collect()
    }

    /// Wait until at least `count` requests hit `path`; false on timeout.
    pub async fn wait_for_calls(&self, path: &str, count: usize, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        loop {
            if self.calls_to(path).await.len() >= count {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn default_response(&self, path: &str) -> RpcResponse {
        match path {
            paths::PLUGIN_START => encoded_ok(&StartupResp {
                success: true,
                sandbox_dir: "/tmp/tern-sandbox".to_string(),
                node_id: 1001,
                ..Default::default()
            }),
            paths::STREAM_OPEN => encoded_ok(&StreamOpenResp {
                stream_no: format!("stream-{}", self.next_id()),
            }),
            paths::MESSAGE_SEND => encoded_ok(&SendResp {
                message_id: self.next_id() as i64,
                client_msg_no: String::new(),
            }),
            _ => RpcResponse::ok(b"{}".to_vec()),
        }
    }
}

#[async_trait]
impl RpcChannel for MockHost {
    async fn open(&self) -> Result<ChannelStreams> {
        self.streams
            .lock()
            .await
            .take()
            .ok_or(PdkError::ChannelClosed)
    }

    async fn request(&self, path: &str, body: Vec<u8>) -> Result<RpcResponse> {
        self.calls.lock().await.push(RecordedCall {
            path: path.to_string(),
            body: body.clone(),
        });
        if self.stalled.lock().await.contains(path) {
            futures::future::pending::<()>().await;
        }
        let responders = self.responders.lock().await;
        let response = match responders.get(path) {
            Some(responder) => responder(&body),
            None => self.default_response(path),
        };
        Ok(response)
    }
}

fn encoded_ok<T: Serialize>(value: &T) -> RpcResponse {
    match tern_proto::encode(value) {
        Ok(body) => RpcResponse::ok(body),
        Err(err) => RpcResponse::error(err.to_string()),
    }
}

/// A [`Host`] wired to a fresh mock, for exercising contexts directly
/// without a running lifecycle.
pub fn standalone_host() -> (Host, Arc<MockHost>) {
    let mock = MockHost::new();
    let plugin = Plugin {
        descriptor: PluginInfo {
            no: "tern.test.standalone".to_string(),
            ..Default::default()
        },
        hooks: Hooks::default(),
        config: None,
        rpc_timeout: Duration::from_secs(5),
        sandbox_override: None,
    };
    let host = Host::new(RuntimeInner::new(plugin, mock.clone()));
    (host, mock)
}
