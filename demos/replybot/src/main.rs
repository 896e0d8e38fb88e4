//! Streaming auto-reply bot.
//!
//! Answers every reply candidate over a server-tracked stream: open with a
//! placeholder, write the reply chunk by chunk, close. A canned token source
//! stands in for a model client, so the demo runs offline against the
//! in-process [`MockHost`]. The driver registers the plugin, retunes its
//! persona over the config channel, pushes an inbound message, and reads the
//! streamed answer back.
//!
//! ```text
//! cargo run -p tern-demo-replybot
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use tern_pdk::hooks::PUSH_TAG_RECEIVE;
use tern_pdk::rpc::paths;
use tern_pdk::testkit::MockHost;
use tern_pdk::{
    CliArgs, ConfigStore, ConfigUpdateHook, FieldKind, FieldSpec, PluginBuilder, PluginConfig,
    ReceiveContext, ReceiveHook, SetupHook, StreamOptions, init_logging, serve,
};
use tern_proto::{CHANNEL_TYPE_PERSON, Payload, RecvPacket, StreamWriteReq, TextPayload};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BotConfig {
    #[serde(default)]
    persona: String,
    #[serde(default)]
    api_key: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            persona: "a seabird enthusiast".into(),
            api_key: String::new(),
        }
    }
}

impl PluginConfig for BotConfig {
    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            FieldSpec::new("persona", "Persona", FieldKind::String),
            FieldSpec::new("api_key", "API key", FieldKind::Secret),
        ];
        FIELDS
    }
}

struct ReplyBot {
    config: ConfigStore<BotConfig>,
}

#[async_trait]
impl ReceiveHook for ReplyBot {
    async fn receive(&self, ctx: &ReceiveContext) {
        let question = match TextPayload::decode(&ctx.packet().payload) {
            Ok(body) => body.content,
            Err(err) => {
                warn!(error = %err, "ignoring non-text payload");
                return;
            }
        };

        let opts = StreamOptions {
            payload: TextPayload::new("thinking...").encode().unwrap_or_default(),
            ..Default::default()
        };
        let stream = match ctx.open_stream(opts).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "open stream failed");
                return;
            }
        };

        let persona = self.config.get().await.persona;
        for token in draft_reply(&question, &persona) {
            let chunk = match TextPayload::new(token).encode() {
                Ok(bytes) => bytes,
                Err(_) => break,
            };
            if let Err(err) = stream.write(chunk).await {
                warn!(error = %err, "stream write failed");
                break;
            }
        }
        if let Err(err) = stream.close().await {
            warn!(error = %err, "stream close failed");
        }
    }
}

#[async_trait]
impl ConfigUpdateHook for ReplyBot {
    async fn config_update(&self) {
        let config = self.config.get().await;
        info!(persona = %config.persona, "configuration reloaded");
    }
}

#[async_trait]
impl SetupHook for ReplyBot {
    async fn setup(&self) {
        info!("replybot ready");
    }
}

/// Canned token source standing in for a model client. One token per word,
/// trailing spaces kept so the chunks concatenate back into the sentence.
fn draft_reply(question: &str, persona: &str) -> Vec<String> {
    let sentence =
        format!("Speaking as {persona}: you asked \"{question}\" and that is a fine question.");
    sentence.split_inclusive(' ').map(str::to_string).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_logging("info");
    if args.socket.is_some() {
        warn!("no transport bundled yet; ignoring --socket and running in process");
    }

    let store = ConfigStore::new(BotConfig::default());
    let bot = ReplyBot {
        config: store.clone(),
    };
    let mut builder = PluginBuilder::new("tern.demo.replybot", bot)
        .version("0.0.1")
        .priority(1)
        .config(store)
        .with_receive()
        .with_setup()
        .with_config_update();
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

/// Plays the server's half: register, retune the persona, push one inbound
/// message, then read the streamed answer back.
async fn drive(host: Arc<MockHost>) -> anyhow::Result<()> {
    host.authenticate();
    if !host
        .wait_for_calls(paths::PLUGIN_START, 1, Duration::from_secs(2))
        .await
    {
        anyhow::bail!("plugin never registered");
    }

    let update = serde_json::json!({ "persona": "a tern in a hurry" });
    host.request_plugin(paths::PLUGIN_CONFIG_UPDATE, update.to_string().into_bytes())
        .await;

    let packet = RecvPacket {
        from_uid: "u1".into(),
        to_uid: "bot".into(),
        channel_id: "bot@u1".into(),
        channel_type: CHANNEL_TYPE_PERSON,
        payload: TextPayload::new("do terns migrate?").encode()?,
        ..Default::default()
    };
    host.push(PUSH_TAG_RECEIVE, tern_proto::encode(&packet)?);

    if !host
        .wait_for_calls(paths::STREAM_CLOSE, 1, Duration::from_secs(2))
        .await
    {
        anyhow::bail!("stream never closed");
    }

    let mut answer = String::new();
    for body in host.calls_to(paths::STREAM_WRITE).await {
        let write: StreamWriteReq = tern_proto::decode(&body)?;
        let chunk = TextPayload::decode(&write.payload)?;
        answer.push_str(&chunk.content);
    }
    info!(answer = %answer.trim_end(), "streamed reply assembled");

    host.request_plugin(paths::STOP, Vec::new()).await;
    Ok(())
}
