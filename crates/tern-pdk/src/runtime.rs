//! The plugin runtime.
//!
//! Owns the RPC channel, drives the connection lifecycle (authenticate,
//! register, setup-once, steady state, stop) and hands out the [`Host`]
//! client handle that contexts are bound to.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use tern_proto::{
    ChannelMessageBatchReq, ChannelMessageBatchResp, ClusterChannelBelongNodeBatchResp,
    ClusterChannelBelongNodeReq, ConversationChannelReq, ConversationChannelResp, ForwardHttpReq,
    HttpResponse, PluginInfo, SendReq, SendResp, StartupResp, StreamCloseReq, StreamInfo,
    StreamOpenResp, StreamWriteReq,
};

use crate::config::ConfigSlot;
use crate::dispatch;
use crate::error::{PdkError, Result};
use crate::hooks::Hooks;
use crate::plugin::Plugin;
use crate::rpc::{ChannelStreams, LinkState, RpcChannel, paths};
use crate::stream::Stream;

/// Plugin-side connection lifecycle.
///
/// `Unauthenticated` covers everything below an authenticated link; the
/// transport owns dialing and the handshake. Setup fires on the first
/// entry into `Registered` only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnState {
    #[default]
    Unauthenticated,
    Authenticated,
    Registered,
    Ready,
    Stopping,
    Stopped,
}

#[derive(Debug, Default)]
struct Registration {
    sandbox_dir: String,
    node_id: u64,
}

pub(crate) struct RuntimeInner {
    pub(crate) descriptor: PluginInfo,
    pub(crate) hooks: Hooks,
    pub(crate) config: Option<Box<dyn ConfigSlot>>,
    link: Arc<dyn RpcChannel>,
    rpc_timeout: Duration,
    sandbox_override: Option<PathBuf>,
    registration: RwLock<Registration>,
    conn_state: watch::Sender<ConnState>,
    setup_done: Mutex<bool>,
    stop: Notify,
}

impl RuntimeInner {
    pub(crate) fn new(plugin: Plugin, link: Arc<dyn RpcChannel>) -> Arc<Self> {
        let (conn_state, _) = watch::channel(ConnState::default());
        Arc::new(Self {
            descriptor: plugin.descriptor,
            hooks: plugin.hooks,
            config: plugin.config,
            link,
            rpc_timeout: plugin.rpc_timeout,
            sandbox_override: plugin.sandbox_override,
            registration: RwLock::new(Registration::default()),
            conn_state,
            setup_done: Mutex::new(false),
            stop: Notify::new(),
        })
    }

    pub(crate) fn plugin_no(&self) -> &str {
        &self.descriptor.no
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<ConnState> {
        self.conn_state.subscribe()
    }

    /// Move the lifecycle forward. Once stopping, only `Stopped` may follow.
    pub(crate) fn set_state(&self, next: ConnState) {
        let current = *self.conn_state.borrow();
        if matches!(current, ConnState::Stopping | ConnState::Stopped)
            && next != ConnState::Stopped
        {
            return;
        }
        if current != next {
            debug!(?current, ?next, "connection state change");
            self.conn_state.send_replace(next);
        }
    }

    /// One bounded request to the server, unwrapped to its body on success.
    pub(crate) async fn request(&self, path: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let response = timeout(self.rpc_timeout, self.link.request(path, body))
            .await
            .map_err(|_| PdkError::Timeout {
                path: path.to_string(),
                timeout_ms: self.rpc_timeout.as_millis() as u64,
            })??;
        if !response.is_ok() {
            return Err(PdkError::Rpc {
                path: path.to_string(),
                status: response.status,
                message: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(response.body)
    }

    /// Send the descriptor and absorb the server's startup data.
    async fn register(&self) -> Result<()> {
        let body = tern_proto::encode(&self.descriptor)?;
        let resp_body = self.request(paths::PLUGIN_START, body).await?;
        let resp: StartupResp = tern_proto::decode(&resp_body)?;
        if !resp.success {
            return Err(PdkError::Registration(resp.err_msg));
        }
        {
            let mut reg = self.registration.write().await;
            reg.sandbox_dir = resp.sandbox_dir;
            reg.node_id = resp.node_id;
        }
        if let Some(config) = resp.config.as_ref().filter(|config| !config.is_empty()) {
            if let Err(err) = self.apply_config_update(config).await {
                warn!(error = %err, "initial config rejected, keeping current values");
            }
        }
        Ok(())
    }

    /// Apply a config map, then notify the hook. The hook only runs when the
    /// whole update applied.
    pub(crate) async fn apply_config_update(
        &self,
        updates: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        if let Some(slot) = &self.config {
            slot.apply(updates).await?;
        }
        if let Some(hook) = &self.hooks.config_update {
            hook.config_update().await;
        }
        Ok(())
    }

    /// Run the setup hook if no registration has completed before.
    async fn run_setup_once(&self) {
        let mut done = self.setup_done.lock().await;
        if *done {
            return;
        }
        if let Some(hook) = &self.hooks.setup {
            hook.setup().await;
        }
        *done = true;
    }

    pub(crate) fn begin_stop(&self) {
        self.set_state(ConnState::Stopping);
        self.stop.notify_one();
    }

    pub(crate) async fn stop_requested(&self) {
        self.stop.notified().await;
    }

    async fn on_authenticated(&self) {
        self.set_state(ConnState::Authenticated);
        info!(plugin = %self.descriptor.no, "link authenticated, registering");
        match self.register().await {
            Ok(()) => {
                self.set_state(ConnState::Registered);
                self.run_setup_once().await;
                self.set_state(ConnState::Ready);
                info!(plugin = %self.descriptor.no, "plugin ready");
            }
            Err(err) => {
                warn!(
                    plugin = %self.descriptor.no,
                    error = %err,
                    "registration failed, waiting for the next authentication"
                );
            }
        }
    }

    fn on_link_down(&self) {
        self.set_state(ConnState::Unauthenticated);
    }
}

/// Cloneable client handle to the Tern server.
///
/// Every context carries one; hook code talks to the server through it and
/// never through any process-wide state.
#[derive(Clone)]
pub struct Host {
    inner: Arc<RuntimeInner>,
}

impl Host {
    pub(crate) fn new(inner: Arc<RuntimeInner>) -> Self {
        Self { inner }
    }

    /// Identity this plugin registers as.
    pub fn plugin_no(&self) -> &str {
        self.inner.plugin_no()
    }

    /// Raw request against any server route.
    pub async fn request(&self, path: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        self.inner.request(path, body).await
    }

    /// Submit a message for normal delivery.
    pub async fn send_message(&self, req: SendReq) -> Result<SendResp> {
        let body = self
            .request(paths::MESSAGE_SEND, tern_proto::encode(&req)?)
            .await?;
        Ok(tern_proto::decode(&body)?)
    }

    /// Page through channel message logs, several ranges per round trip.
    pub async fn channel_messages(
        &self,
        req: ChannelMessageBatchReq,
    ) -> Result<ChannelMessageBatchResp> {
        let body = self
            .request(paths::CHANNEL_MESSAGES, tern_proto::encode(&req)?)
            .await?;
        Ok(tern_proto::decode(&body)?)
    }

    /// Channels in a user's recent-conversation list.
    pub async fn conversation_channels(
        &self,
        uid: impl Into<String>,
    ) -> Result<ConversationChannelResp> {
        let req = ConversationChannelReq { uid: uid.into() };
        let body = self
            .request(paths::CONVERSATION_CHANNELS, tern_proto::encode(&req)?)
            .await?;
        Ok(tern_proto::decode(&body)?)
    }

    /// Which cluster nodes own the given channels.
    pub async fn channel_belong_nodes(
        &self,
        req: ClusterChannelBelongNodeReq,
    ) -> Result<ClusterChannelBelongNodeBatchResp> {
        let body = self
            .request(paths::CLUSTER_CHANNEL_BELONG_NODE, tern_proto::encode(&req)?)
            .await?;
        Ok(tern_proto::decode(&body)?)
    }

    /// Forward an HTTP request to this plugin's instance on another node.
    /// An empty `plugin_no` is filled in with this plugin's identity.
    pub async fn forward_http(&self, mut req: ForwardHttpReq) -> Result<HttpResponse> {
        if req.plugin_no.is_empty() {
            req.plugin_no = self.inner.plugin_no().to_string();
        }
        let body = self
            .request(paths::PLUGIN_HTTP_FORWARD, tern_proto::encode(&req)?)
            .await?;
        Ok(tern_proto::decode(&body)?)
    }

    pub(crate) async fn open_stream(&self, info: StreamInfo) -> Result<Stream> {
        let body = self
            .request(paths::STREAM_OPEN, tern_proto::encode(&info)?)
            .await?;
        let resp: StreamOpenResp = tern_proto::decode(&body)?;
        Ok(Stream::new(info, resp.stream_no, self.clone()))
    }

    pub(crate) async fn stream_write(&self, req: StreamWriteReq) -> Result<()> {
        self.request(paths::STREAM_WRITE, tern_proto::encode(&req)?)
            .await?;
        Ok(())
    }

    pub(crate) async fn stream_close(&self, req: StreamCloseReq) -> Result<()> {
        self.request(paths::STREAM_CLOSE, tern_proto::encode(&req)?)
            .await?;
        Ok(())
    }

    /// Cluster node this plugin is attached to. Zero before registration.
    pub async fn node_id(&self) -> u64 {
        self.inner.registration.read().await.node_id
    }

    /// Scratch directory for this plugin: the command-line override when
    /// given, otherwise whatever the server assigned at registration.
    pub async fn sandbox_dir(&self) -> PathBuf {
        if let Some(dir) = &self.inner.sandbox_override {
            return dir.clone();
        }
        PathBuf::from(&self.inner.registration.read().await.sandbox_dir)
    }
}

/// A running plugin: dispatch and lifecycle tasks over one RPC channel.
pub struct PluginRuntime {
    inner: Arc<RuntimeInner>,
}

impl PluginRuntime {
    /// Open the channel and start the inbound-dispatch and lifecycle tasks.
    pub async fn start(plugin: Plugin, link: Arc<dyn RpcChannel>) -> Result<Self> {
        let ChannelStreams {
            mut inbound,
            mut link_state,
        } = link.open().await?;
        let inner = RuntimeInner::new(plugin, link);

        let dispatch_inner = inner.clone();
        tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                let inner = dispatch_inner.clone();
                tokio::spawn(async move {
                    dispatch::dispatch(inner, envelope).await;
                });
            }
            debug!("inbound stream closed");
        });

        let lifecycle_inner = inner.clone();
        tokio::spawn(async move {
            loop {
                let authenticated = *link_state.borrow_and_update() == LinkState::Authenticated;
                if authenticated {
                    lifecycle_inner.on_authenticated().await;
                } else {
                    lifecycle_inner.on_link_down();
                }
                if link_state.changed().await.is_err() {
                    debug!("link state watch closed");
                    break;
                }
            }
        });

        Ok(Self { inner })
    }

    /// Client handle bound to this runtime.
    pub fn host(&self) -> Host {
        Host::new(self.inner.clone())
    }

    /// Watch the connection lifecycle.
    pub fn state(&self) -> watch::Receiver<ConnState> {
        self.inner.subscribe_state()
    }

    /// Resolves once the server asked the plugin to stop.
    pub async fn stop_requested(&self) {
        self.inner.stop_requested().await;
    }

    /// Run the stop hook and finish the lifecycle.
    pub async fn shutdown(self) {
        self.inner.set_state(ConnState::Stopping);
        if let Some(hook) = &self.inner.hooks.stop {
            hook.stop().await;
        }
        self.inner.set_state(ConnState::Stopped);
        info!(plugin = %self.inner.descriptor.no, "plugin stopped");
    }
}
