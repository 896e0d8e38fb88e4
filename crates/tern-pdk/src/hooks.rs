//! Lifecycle hook traits.
//!
//! A plugin implements any subset of these and declares each one on the
//! [`PluginBuilder`](crate::plugin::PluginBuilder); the declaration is where
//! the capability set is fixed, checked against these traits at compile
//! time. The server only ever invokes what was declared.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{BatchContext, ReceiveContext, SendContext};
use crate::router::Router;

/// Message-type tag of a pushed persisted-message batch.
pub const PUSH_TAG_PERSIST_AFTER: u32 = 2;
/// Message-type tag of a pushed reply candidate.
pub const PUSH_TAG_RECEIVE: u32 = 3;

/// The fixed universe of hooks a plugin can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Send,
    PersistAfter,
    Receive,
    Route,
    Stop,
    Setup,
    ConfigUpdate,
}

impl HookKind {
    /// Every hook, in descriptor order.
    pub const ALL: [HookKind; 7] = [
        HookKind::Send,
        HookKind::PersistAfter,
        HookKind::Receive,
        HookKind::Route,
        HookKind::Stop,
        HookKind::Setup,
        HookKind::ConfigUpdate,
    ];

    /// Hook name as advertised in the plugin descriptor.
    pub fn name(&self) -> &'static str {
        match self {
            HookKind::Send => "send",
            HookKind::PersistAfter => "persist_after",
            HookKind::Receive => "receive",
            HookKind::Route => "route",
            HookKind::Stop => "stop",
            HookKind::Setup => "setup",
            HookKind::ConfigUpdate => "config_update",
        }
    }
}

/// Intercepts every outbound packet before persistence and delivery.
///
/// The packet may be mutated in place; the server re-reads it when the hook
/// returns. Runs on the hot send path, so keep it quick.
#[async_trait]
pub trait SendHook: Send + Sync + 'static {
    async fn send(&self, ctx: &mut SendContext);
}

/// Observes batches of messages after they were written to the store.
#[async_trait]
pub trait PersistAfterHook: Send + Sync + 'static {
    async fn persist_after(&self, ctx: &BatchContext);
}

/// Receives inbound packets the server selected for automated reply.
#[async_trait]
pub trait ReceiveHook: Send + Sync + 'static {
    async fn receive(&self, ctx: &ReceiveContext);
}

/// Populates the plugin's HTTP route table.
///
/// Called exactly once, at build time; the table is immutable afterwards.
pub trait RouteHook: Send + Sync + 'static {
    fn route(&self, router: &mut Router);
}

/// Runs during graceful shutdown, after the serve loop is released.
#[async_trait]
pub trait StopHook: Send + Sync + 'static {
    async fn stop(&self);
}

/// Runs once per process lifetime, after the first successful registration.
/// Reconnects do not run it again.
#[async_trait]
pub trait SetupHook: Send + Sync + 'static {
    async fn setup(&self);
}

/// Notified after a configuration update was applied successfully.
#[async_trait]
pub trait ConfigUpdateHook: Send + Sync + 'static {
    async fn config_update(&self);
}

/// The dispatch table assembled by the builder.
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) send: Option<Arc<dyn SendHook>>,
    pub(crate) persist_after: Option<Arc<dyn PersistAfterHook>>,
    pub(crate) receive: Option<Arc<dyn ReceiveHook>>,
    pub(crate) route_table: Option<Router>,
    pub(crate) stop: Option<Arc<dyn StopHook>>,
    pub(crate) setup: Option<Arc<dyn SetupHook>>,
    pub(crate) config_update: Option<Arc<dyn ConfigUpdateHook>>,
}

impl Hooks {
    /// Declared hooks, in descriptor order.
    pub(crate) fn kinds(&self) -> Vec<HookKind> {
        HookKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                HookKind::Send => self.send.is_some(),
                HookKind::PersistAfter => self.persist_after.is_some(),
                HookKind::Receive => self.receive.is_some(),
                HookKind::Route => self.route_table.is_some(),
                HookKind::Stop => self.stop.is_some(),
                HookKind::Setup => self.setup.is_some(),
                HookKind::ConfigUpdate => self.config_update.is_some(),
            })
            .collect()
    }
}
