//! Plugin assembly.
//!
//! [`PluginBuilder`] binds one plugin instance to the hooks it implements.
//! Each `with_*` declaration is bounded on the matching hook trait, so a
//! plugin can only ever advertise capabilities the compiler has checked it
//! for. `build` freezes the descriptor; nothing about the capability set
//! can change afterwards.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tern_proto::PluginInfo;

use crate::config::{ConfigSlot, ConfigStore, PluginConfig, TypedSlot};
use crate::error::{PdkError, Result};
use crate::hooks::{
    ConfigUpdateHook, Hooks, PersistAfterHook, ReceiveHook, RouteHook, SendHook, SetupHook,
    StopHook,
};
use crate::router::Router;

const DEFAULT_VERSION: &str = "0.0.0";
const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// A fully assembled plugin, ready for
/// [`serve`](crate::server::serve) or
/// [`PluginRuntime::start`](crate::runtime::PluginRuntime::start).
pub struct Plugin {
    pub(crate) descriptor: PluginInfo,
    pub(crate) hooks: Hooks,
    pub(crate) config: Option<Box<dyn ConfigSlot>>,
    pub(crate) rpc_timeout: Duration,
    pub(crate) sandbox_override: Option<PathBuf>,
}

impl Plugin {
    /// The descriptor announced at registration.
    pub fn descriptor(&self) -> &PluginInfo {
        &self.descriptor
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("descriptor", &self.descriptor)
            .field("rpc_timeout", &self.rpc_timeout)
            .field("sandbox_override", &self.sandbox_override)
            .finish_non_exhaustive()
    }
}

pub struct PluginBuilder<P> {
    instance: Arc<P>,
    no: String,
    version: String,
    priority: i32,
    persist_after_sync: bool,
    reply_sync: bool,
    rpc_timeout: Duration,
    sandbox_override: Option<PathBuf>,
    hooks: Hooks,
    config: Option<Box<dyn ConfigSlot>>,
}

impl<P: Send + Sync + 'static> PluginBuilder<P> {
    /// Start a builder for `instance`, registered under the identity `no`
    /// (conventionally reverse-dns, e.g. `"tern.ai.answer"`).
    pub fn new(no: impl Into<String>, instance: P) -> Self {
        Self {
            instance: Arc::new(instance),
            no: no.into(),
            version: DEFAULT_VERSION.to_string(),
            priority: 0,
            persist_after_sync: false,
            reply_sync: false,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            sandbox_override: None,
            hooks: Hooks::default(),
            config: None,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Ordering relative to other plugins hooked on the same operation.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Ask the server to deliver persisted-message batches as requests it
    /// waits on, instead of fire-and-forget pushes.
    pub fn persist_after_sync(mut self, sync: bool) -> Self {
        self.persist_after_sync = sync;
        self
    }

    /// Ask the server to deliver reply candidates as requests it waits on.
    pub fn reply_sync(mut self, sync: bool) -> Self {
        self.reply_sync = sync;
        self
    }

    /// Bound for every plugin-initiated RPC. Defaults to five seconds.
    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Use this sandbox directory instead of the server-assigned one.
    pub fn sandbox_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sandbox_override = Some(dir.into());
        self
    }

    /// Declare the configuration schema. The template is derived from `C`
    /// and updates land in `store`.
    pub fn config<C: PluginConfig>(mut self, store: ConfigStore<C>) -> Self {
        self.config = Some(Box::new(TypedSlot { store }));
        self
    }

    /// Declare the send hook.
    pub fn with_send(mut self) -> Self
    where
        P: SendHook,
    {
        let hook: Arc<dyn SendHook> = self.instance.clone();
        self.hooks.send = Some(hook);
        self
    }

    /// Declare the persist-after hook.
    pub fn with_persist_after(mut self) -> Self
    where
        P: PersistAfterHook,
    {
        let hook: Arc<dyn PersistAfterHook> = self.instance.clone();
        self.hooks.persist_after = Some(hook);
        self
    }

    /// Declare the receive hook.
    pub fn with_receive(mut self) -> Self
    where
        P: ReceiveHook,
    {
        let hook: Arc<dyn ReceiveHook> = self.instance.clone();
        self.hooks.receive = Some(hook);
        self
    }

    /// Declare the route hook. The instance populates its route table here,
    /// once; the table never changes again.
    pub fn with_route(mut self) -> Self
    where
        P: RouteHook,
    {
        let mut router = Router::default();
        self.instance.route(&mut router);
        self.hooks.route_table = Some(router);
        self
    }

    /// Declare the stop hook.
    pub fn with_stop(mut self) -> Self
    where
        P: StopHook,
    {
        let hook: Arc<dyn StopHook> = self.instance.clone();
        self.hooks.stop = Some(hook);
        self
    }

    /// Declare the setup hook.
    pub fn with_setup(mut self) -> Self
    where
        P: SetupHook,
    {
        let hook: Arc<dyn SetupHook> = self.instance.clone();
        self.hooks.setup = Some(hook);
        self
    }

    /// Declare the config-update hook.
    pub fn with_config_update(mut self) -> Self
    where
        P: ConfigUpdateHook,
    {
        let hook: Arc<dyn ConfigUpdateHook> = self.instance.clone();
        self.hooks.config_update = Some(hook);
        self
    }

    /// Freeze the descriptor and produce the runnable plugin.
    pub fn build(self) -> Result<Plugin> {
        if self.no.is_empty() {
            return Err(PdkError::MissingPluginNo);
        }
        let methods = self
            .hooks
            .kinds()
            .iter()
            .map(|kind| kind.name().to_string())
            .collect();
        let config_template = self
            .config
            .as_ref()
            .map(|slot| slot.template())
            .unwrap_or_default();
        let descriptor = PluginInfo {
            no: self.no,
            name: binary_name()?,
            version: self.version,
            priority: self.priority,
            persist_after_sync: self.persist_after_sync,
            reply_sync: self.reply_sync,
            methods,
            config_template,
        };
        Ok(Plugin {
            descriptor,
            hooks: self.hooks,
            config: self.config,
            rpc_timeout: self.rpc_timeout,
            sandbox_override: self.sandbox_override,
        })
    }
}

fn binary_name() -> Result<String> {
    let exe = std::env::current_exe()?;
    Ok(exe
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldKind, FieldSpec};
    use crate::context::{ReceiveContext, SendContext};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    struct Echo;

    #[async_trait]
    impl SendHook for Echo {
        async fn send(&self, _ctx: &mut SendContext) {}
    }

    #[async_trait]
    impl ReceiveHook for Echo {
        async fn receive(&self, _ctx: &ReceiveContext) {}
    }

    #[async_trait]
    impl SetupHook for Echo {
        async fn setup(&self) {}
    }

    impl RouteHook for Echo {
        fn route(&self, router: &mut Router) {
            router.get("/ping", |mut ctx| {
                Box::pin(async move {
                    ctx.write(200, b"pong".to_vec());
                    ctx
                })
            });
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct EchoConfig {
        #[serde(default)]
        greeting: String,
    }

    impl PluginConfig for EchoConfig {
        fn fields() -> &'static [FieldSpec] {
            const FIELDS: &[FieldSpec] =
                &[FieldSpec::new("greeting", "Greeting", FieldKind::String)];
            FIELDS
        }
    }

    #[test]
    fn descriptor_lists_declared_hooks_in_fixed_order() {
        let plugin = PluginBuilder::new("tern.test.echo", Echo)
            .with_setup()
            .with_receive()
            .with_send()
            .build()
            .unwrap();
        assert_eq!(plugin.descriptor().methods, ["send", "receive", "setup"]);
    }

    #[test]
    fn undeclared_hooks_stay_out_of_the_descriptor() {
        let plugin = PluginBuilder::new("tern.test.echo", Echo)
            .with_send()
            .build()
            .unwrap();
        assert_eq!(plugin.descriptor().methods, ["send"]);
        assert!(plugin.hooks.receive.is_none());
        assert!(plugin.hooks.route_table.is_none());
    }

    #[test]
    fn route_declaration_captures_the_table_at_build_time() {
        let plugin = PluginBuilder::new("tern.test.echo", Echo)
            .with_route()
            .build()
            .unwrap();
        assert_eq!(plugin.descriptor().methods, ["route"]);
        assert!(plugin.hooks.route_table.is_some());
    }

    #[test]
    fn config_declaration_fills_the_template() {
        let plugin = PluginBuilder::new("tern.test.echo", Echo)
            .config(ConfigStore::new(EchoConfig::default()))
            .build()
            .unwrap();
        let template = &plugin.descriptor().config_template;
        assert_eq!(template.fields.len(), 1);
        assert_eq!(template.fields[0].name, "greeting");
        assert_eq!(template.fields[0].kind, "string");
    }

    #[test]
    fn empty_identity_is_rejected() {
        let err = PluginBuilder::new("", Echo).build().unwrap_err();
        assert!(matches!(err, PdkError::MissingPluginNo));
    }

    #[test]
    fn descriptor_defaults() {
        let plugin = PluginBuilder::new("tern.test.echo", Echo).build().unwrap();
        let descriptor = plugin.descriptor();
        assert_eq!(descriptor.version, "0.0.0");
        assert_eq!(descriptor.priority, 0);
        assert!(!descriptor.persist_after_sync);
        assert!(!descriptor.reply_sync);
        assert!(!descriptor.name.is_empty());
    }
}
