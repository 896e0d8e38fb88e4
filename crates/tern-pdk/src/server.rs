//! Process plumbing: standard CLI options, logging, the serve loop.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::Result;
use crate::plugin::Plugin;
use crate::rpc::RpcChannel;
use crate::runtime::PluginRuntime;

/// Standard command-line options of a Tern plugin binary.
#[derive(Debug, Parser)]
pub struct CliArgs {
    /// Unix socket the Tern server listens on for plugins.
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Override the server-assigned sandbox directory.
    #[arg(long)]
    pub sandbox: Option<PathBuf>,
}

impl CliArgs {
    /// The socket to dial, falling back to the per-user runtime path.
    pub fn socket_path(&self) -> PathBuf {
        self.socket.clone().unwrap_or_else(default_socket_path)
    }
}

/// `~/.tern/run/tern.sock`, where the server listens for plugins by default.
pub fn default_socket_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tern")
        .join("run")
        .join("tern.sock")
}

/// Install the standard tracing subscriber. `RUST_LOG` wins over `default`.
pub fn init_logging(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Run a plugin over the given channel until the server stops it or the
/// process is interrupted, then run its shutdown hooks.
pub async fn serve(plugin: Plugin, link: Arc<dyn RpcChannel>) -> Result<()> {
    let runtime = PluginRuntime::start(plugin, link).await?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
        _ = runtime.stop_requested() => {
            info!("stop requested by server");
        }
    }
    runtime.shutdown().await;
    Ok(())
}
