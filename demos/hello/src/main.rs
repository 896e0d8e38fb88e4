//! Minimal Tern plugin: one HTTP route, a send interceptor, and the
//! lifecycle hooks around them.
//!
//! No transport crate ships with the PDK yet, so the demo drives the plugin
//! against the in-process [`MockHost`]: it authenticates, pokes the route
//! and the send hook the way the server would, then asks the plugin to
//! stop. Swap the mock for a real [`RpcChannel`](tern_pdk::rpc::RpcChannel)
//! implementation and the plugin code stays as it is.
//!
//! ```text
//! cargo run -p tern-demo-hello
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tracing::{error, info, warn};

use tern_pdk::hooks::PUSH_TAG_PERSIST_AFTER;
use tern_pdk::rpc::paths;
use tern_pdk::testkit::MockHost;
use tern_pdk::{
    BatchContext, CliArgs, PersistAfterHook, PluginBuilder, RouteHook, Router, SendContext,
    SendHook, SetupHook, StopHook, init_logging, serve,
};
use tern_proto::{
    HttpRequest, HttpResponse, Message, MessageBatch, Payload, SendPacket, TextPayload,
};

struct Hello;

impl RouteHook for Hello {
    fn route(&self, router: &mut Router) {
        // Reachable through the server at /plugins/tern.demo.hello/hello.
        router.get("/hello", |mut ctx| {
            Box::pin(async move {
                let name = ctx.query("name").unwrap_or("world").to_string();
                ctx.json(200, &serde_json::json!({ "say": format!("hello {name}") }));
                ctx
            })
        });
    }
}

#[async_trait]
impl SendHook for Hello {
    async fn send(&self, ctx: &mut SendContext) {
        // Rewrites every outbound body, the way a content filter would.
        if let Ok(payload) = TextPayload::new("hello").encode() {
            ctx.packet_mut().payload = payload;
        }
    }
}

#[async_trait]
impl PersistAfterHook for Hello {
    async fn persist_after(&self, ctx: &BatchContext) {
        info!(messages = ctx.messages().len(), "batch persisted");
    }
}

#[async_trait]
impl StopHook for Hello {
    async fn stop(&self) {
        info!("plugin stopping");
    }
}

#[async_trait]
impl SetupHook for Hello {
    async fn setup(&self) {
        info!("plugin setup");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging("info");
    if args.socket.is_some() {
        warn!("no transport bundled yet; ignoring --socket and running in process");
    }

    let mut builder = PluginBuilder::new("tern.demo.hello", Hello)
        .version("0.0.1")
        .priority(1)
        .with_send()
        .with_persist_after()
        .with_route()
        .with_stop()
        .with_setup();
    if let Some(dir) = args.sandbox {
        builder = builder.sandbox_dir(dir);
    }
    let plugin = builder.build()?;

    let host = MockHost::new();
    let driver = host.clone();
    tokio::spawn(async move {
        if let Err(err) = drive(driver).await {
            error!(error = %err, "demo session failed");
        }
    });

    serve(plugin, host).await?;
    Ok(())
}

/// Plays the server's half of a short session.
async fn drive(host: Arc<MockHost>) -> anyhow::Result<()> {
    host.authenticate();
    if !host
        .wait_for_calls(paths::PLUGIN_START, 1, Duration::from_secs(2))
        .await
    {
        anyhow::bail!("plugin never registered");
    }

    // A batch lands as a fire-and-forget push.
    let batch = MessageBatch {
        messages: vec![Message {
            client_msg_no: "m1".into(),
            from_uid: "u1".into(),
            channel_id: "room".into(),
            channel_type: tern_proto::CHANNEL_TYPE_GROUP,
            ..Default::default()
        }],
    };
    host.push(PUSH_TAG_PERSIST_AFTER, tern_proto::encode(&batch)?);

    // Forward an HTTP request to the plugin's /hello route.
    let request = HttpRequest {
        method: "GET".into(),
        path: "/hello".into(),
        query: [("name".to_string(), "tern".to_string())]
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let response = host
        .request_plugin(paths::PLUGIN_ROUTE, tern_proto::encode(&request)?)
        .await;
    let http: HttpResponse = tern_proto::decode(&response.body)?;
    info!(
        status = http.status,
        body = %String::from_utf8_lossy(&http.body),
        "route answered"
    );

    // Intercept an outbound packet.
    let packet = SendPacket {
        from_uid: "u1".into(),
        channel_id: "room".into(),
        channel_type: tern_proto::CHANNEL_TYPE_GROUP,
        payload: TextPayload::new("anything at all").encode()?,
        ..Default::default()
    };
    let response = host
        .request_plugin(paths::PLUGIN_SEND, tern_proto::encode(&packet)?)
        .await;
    let rewritten: SendPacket = tern_proto::decode(&response.body)?;
    let body = TextPayload::decode(&rewritten.payload)?;
    info!(content = %body.content, "send hook rewrote the packet");

    host.request_plugin(paths::STOP, Vec::new()).await;
    Ok(())
}
