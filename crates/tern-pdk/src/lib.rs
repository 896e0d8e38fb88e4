//! Tern plugin development kit.
//!
//! Everything an out-of-process plugin needs to take part in the Tern
//! server's message lifecycle: declare hooks on a [`PluginBuilder`], build,
//! and [`serve`] over an [`RpcChannel`](rpc::RpcChannel). The server invokes
//! exactly the hooks the plugin declared; the plugin talks back through the
//! [`Host`] handle carried by every context.
//!
//! ```no_run
//! use async_trait::async_trait;
//! use tern_pdk::{PluginBuilder, SendContext, SendHook, serve, testkit::MockHost};
//!
//! struct Shout;
//!
//! #[async_trait]
//! impl SendHook for Shout {
//!     async fn send(&self, ctx: &mut SendContext) {
//!         ctx.packet_mut().payload.make_ascii_uppercase();
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let plugin = PluginBuilder::new("tern.demo.shout", Shout)
//!         .with_send()
//!         .build()?;
//!     let link = MockHost::new();
//!     link.authenticate();
//!     serve(plugin, link).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
mod dispatch;
pub mod error;
pub mod hooks;
pub mod plugin;
pub mod router;
pub mod rpc;
pub mod runtime;
pub mod server;
pub mod stream;
pub mod testkit;

pub use config::{ConfigStore, FieldKind, FieldSpec, PluginConfig};
pub use context::{BatchContext, HttpContext, ReceiveContext, ReplyOptions, SendContext, StreamOptions};
pub use error::{PdkError, Result};
pub use hooks::{
    ConfigUpdateHook, HookKind, PersistAfterHook, ReceiveHook, RouteHook, SendHook, SetupHook,
    StopHook,
};
pub use plugin::{Plugin, PluginBuilder};
pub use router::Router;
pub use runtime::{ConnState, Host, PluginRuntime};
pub use server::{CliArgs, default_socket_path, init_logging, serve};
pub use stream::Stream;
