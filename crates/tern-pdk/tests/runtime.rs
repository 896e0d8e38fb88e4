//! End-to-end runtime tests over the in-process mock host.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::timeout;

use tern_pdk::config::{FieldKind, FieldSpec};
use tern_pdk::hooks::{PUSH_TAG_PERSIST_AFTER, PUSH_TAG_RECEIVE};
use tern_pdk::rpc::{RpcResponse, paths, status};
use tern_pdk::testkit::MockHost;
use tern_pdk::{
    BatchContext, ConfigStore, ConfigUpdateHook, ConnState, PdkError, PersistAfterHook, Plugin,
    PluginBuilder, PluginConfig, PluginRuntime, ReceiveContext, ReceiveHook, RouteHook, Router,
    SendContext, SendHook, SetupHook, StopHook, StreamOptions, serve,
};
use tern_proto::{
    CHANNEL_TYPE_PERSON, ForwardHttpReq, Header, HttpRequest, HttpResponse, Message, MessageBatch,
    Payload, PluginInfo, RecvPacket, SendPacket, StartupResp, StreamCloseReq, StreamInfo,
    StreamOpenResp, StreamWriteReq, TextPayload,
};

const WAIT: Duration = Duration::from_secs(2);

async fn start(plugin: Plugin) -> (PluginRuntime, Arc<MockHost>) {
    let mock = MockHost::new();
    let runtime = PluginRuntime::start(plugin, mock.clone())
        .await
        .expect("runtime failed to start");
    (runtime, mock)
}

async fn wait_ready(runtime: &PluginRuntime) {
    let mut state = runtime.state();
    timeout(WAIT, state.wait_for(|s| *s == ConnState::Ready))
        .await
        .expect("timed out waiting for ready")
        .expect("state watch closed");
}

fn encoded<T: Serialize>(value: &T) -> RpcResponse {
    RpcResponse::ok(tern_proto::encode(value).unwrap())
}

/// A plugin with no hooks at all.
struct Nop;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GreetConfig {
    #[serde(default)]
    message: String,
    #[serde(default)]
    limit: u32,
}

impl PluginConfig for GreetConfig {
    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            FieldSpec::new("message", "Message", FieldKind::String),
            FieldSpec::new("limit", "", FieldKind::Number),
        ];
        FIELDS
    }
}

// ---- registration & lifecycle ----------------------------------------------

struct Kitchen;

#[async_trait]
impl SendHook for Kitchen {
    async fn send(&self, _ctx: &mut SendContext) {}
}

#[async_trait]
impl ReceiveHook for Kitchen {
    async fn receive(&self, _ctx: &ReceiveContext) {}
}

#[async_trait]
impl SetupHook for Kitchen {
    async fn setup(&self) {}
}

impl RouteHook for Kitchen {
    fn route(&self, router: &mut Router) {
        router.get("/ping", |mut ctx| {
            Box::pin(async move {
                ctx.write(200, b"pong".to_vec());
                ctx
            })
        });
    }
}

#[tokio::test]
async fn registers_with_the_full_descriptor() {
    let plugin = PluginBuilder::new("tern.test.kitchen", Kitchen)
        .version("1.2.3")
        .priority(7)
        .reply_sync(true)
        .with_send()
        .with_receive()
        .with_route()
        .with_setup()
        .config(ConfigStore::new(GreetConfig::default()))
        .build()
        .unwrap();
    let (runtime, mock) = start(plugin).await;

    mock.authenticate();
    wait_ready(&runtime).await;

    let starts = mock.calls_to(paths::PLUGIN_START).await;
    assert_eq!(starts.len(), 1);
    let info: PluginInfo = tern_proto::decode(&starts[0]).unwrap();
    assert_eq!(info.no, "tern.test.kitchen");
    assert_eq!(info.version, "1.2.3");
    assert_eq!(info.priority, 7);
    assert!(info.reply_sync);
    assert!(!info.persist_after_sync);
    assert_eq!(info.methods, ["send", "receive", "route", "setup"]);
    let fields: Vec<_> = info
        .config_template
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.kind.as_str()))
        .collect();
    assert_eq!(fields, [("message", "string"), ("limit", "number")]);
}

struct Counting {
    setups: Arc<AtomicUsize>,
}

#[async_trait]
impl SetupHook for Counting {
    async fn setup(&self) {
        self.setups.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn setup_runs_once_across_reconnects() {
    let setups = Arc::new(AtomicUsize::new(0));
    let plugin = PluginBuilder::new(
        "tern.test.counting",
        Counting {
            setups: setups.clone(),
        },
    )
    .with_setup()
    .build()
    .unwrap();
    let (runtime, mock) = start(plugin).await;

    for round in 1..=3 {
        mock.authenticate();
        assert!(mock.wait_for_calls(paths::PLUGIN_START, round, WAIT).await);
        wait_ready(&runtime).await;

        mock.drop_link();
        let mut state = runtime.state();
        timeout(WAIT, state.wait_for(|s| *s == ConnState::Unauthenticated))
            .await
            .unwrap()
            .unwrap();
    }

    assert_eq!(mock.calls_to(paths::PLUGIN_START).await.len(), 3);
    assert_eq!(setups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_registration_retries_on_next_authentication() {
    let plugin = PluginBuilder::new("tern.test.retry", Nop).build().unwrap();
    let (runtime, mock) = start(plugin).await;

    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    mock.respond_with(paths::PLUGIN_START, move |_body| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            encoded(&StartupResp {
                success: false,
                err_msg: "not yet".into(),
                ..Default::default()
            })
        } else {
            encoded(&StartupResp {
                success: true,
                sandbox_dir: "/tmp/s".into(),
                node_id: 7,
                ..Default::default()
            })
        }
    })
    .await;

    mock.authenticate();
    assert!(mock.wait_for_calls(paths::PLUGIN_START, 1, WAIT).await);
    let mut state = runtime.state();
    timeout(WAIT, state.wait_for(|s| *s == ConnState::Authenticated))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(*runtime.state().borrow(), ConnState::Ready);

    mock.drop_link();
    mock.authenticate();
    wait_ready(&runtime).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn node_identity_and_sandbox_come_from_registration() {
    let plugin = PluginBuilder::new("tern.test.node", Nop).build().unwrap();
    let (runtime, mock) = start(plugin).await;
    let host = runtime.host();
    assert_eq!(host.node_id().await, 0);

    mock.authenticate();
    wait_ready(&runtime).await;
    assert_eq!(host.node_id().await, 1001);
    assert_eq!(host.sandbox_dir().await, PathBuf::from("/tmp/tern-sandbox"));
}

#[tokio::test]
async fn sandbox_override_wins_over_the_assigned_directory() {
    let plugin = PluginBuilder::new("tern.test.sandbox", Nop)
        .sandbox_dir("/custom/work")
        .build()
        .unwrap();
    let (runtime, mock) = start(plugin).await;
    mock.authenticate();
    wait_ready(&runtime).await;
    assert_eq!(
        runtime.host().sandbox_dir().await,
        PathBuf::from("/custom/work")
    );
}

// ---- send path -------------------------------------------------------------

struct Prefixer;

#[async_trait]
impl SendHook for Prefixer {
    async fn send(&self, ctx: &mut SendContext) {
        let mut body = TextPayload::decode(&ctx.packet().payload).unwrap_or_default();
        body.content = format!("[tern] {}", body.content);
        if let Ok(bytes) = body.encode() {
            ctx.packet_mut().payload = bytes;
        }
        ctx.packet_mut().header.red_dot = true;
    }
}

#[tokio::test]
async fn send_hook_rewrites_the_packet() {
    let plugin = PluginBuilder::new("tern.test.prefix", Prefixer)
        .with_send()
        .build()
        .unwrap();
    let (_runtime, mock) = start(plugin).await;

    let packet = SendPacket {
        from_uid: "u1".into(),
        channel_id: "room".into(),
        channel_type: 2,
        payload: TextPayload::new("hi").encode().unwrap(),
        ..Default::default()
    };
    let response = mock
        .request_plugin(paths::PLUGIN_SEND, tern_proto::encode(&packet).unwrap())
        .await;
    assert!(response.is_ok());

    let out: SendPacket = tern_proto::decode(&response.body).unwrap();
    let body = TextPayload::decode(&out.payload).unwrap();
    assert_eq!(body.content, "[tern] hi");
    assert!(out.header.red_dot);
    assert_eq!(out.from_uid, "u1");
}

#[tokio::test]
async fn send_without_hook_echoes_the_packet() {
    let plugin = PluginBuilder::new("tern.test.echo", Nop).build().unwrap();
    let (_runtime, mock) = start(plugin).await;

    let packet = SendPacket {
        from_uid: "u9".into(),
        payload: b"untouched".to_vec(),
        ..Default::default()
    };
    let response = mock
        .request_plugin(paths::PLUGIN_SEND, tern_proto::encode(&packet).unwrap())
        .await;
    assert!(response.is_ok());
    let out: SendPacket = tern_proto::decode(&response.body).unwrap();
    assert_eq!(out, packet);
}

// ---- persist-after path ----------------------------------------------------

struct BatchSink {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PersistAfterHook for BatchSink {
    async fn persist_after(&self, ctx: &BatchContext) {
        let mut seen = self.seen.lock().await;
        for message in ctx.messages() {
            seen.push(message.client_msg_no.clone());
        }
    }
}

#[tokio::test]
async fn persist_after_arrives_as_push_and_request() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let plugin = PluginBuilder::new("tern.test.batch", BatchSink { seen: seen.clone() })
        .with_persist_after()
        .persist_after_sync(true)
        .build()
        .unwrap();
    let (_runtime, mock) = start(plugin).await;

    let pushed = MessageBatch {
        messages: vec![
            Message {
                client_msg_no: "m1".into(),
                ..Default::default()
            },
            Message {
                client_msg_no: "m2".into(),
                ..Default::default()
            },
        ],
    };
    mock.push(PUSH_TAG_PERSIST_AFTER, tern_proto::encode(&pushed).unwrap());

    let requested = MessageBatch {
        messages: vec![Message {
            client_msg_no: "m3".into(),
            ..Default::default()
        }],
    };
    let response = mock
        .request_plugin(
            paths::PLUGIN_PERSIST_AFTER,
            tern_proto::encode(&requested).unwrap(),
        )
        .await;
    assert!(response.is_ok());

    timeout(WAIT, async {
        loop {
            if seen.lock().await.len() >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("hook never saw all messages");

    let seen = seen.lock().await;
    for expected in ["m1", "m2", "m3"] {
        assert!(seen.contains(&expected.to_string()), "missing {expected}");
    }
}

// ---- receive path & streaming ----------------------------------------------

struct Streamer;

#[async_trait]
impl ReceiveHook for Streamer {
    async fn receive(&self, ctx: &ReceiveContext) {
        let opts = StreamOptions {
            header: Header {
                red_dot: true,
                ..Default::default()
            },
            payload: Vec::new(),
        };
        let stream = match ctx.open_stream(opts).await {
            Ok(stream) => stream,
            Err(_) => return,
        };
        let _ = stream.write(b"chunk-1".to_vec()).await;
        let _ = stream.write(b"chunk-2".to_vec()).await;
        let _ = stream.close().await;
    }
}

#[tokio::test]
async fn receive_hook_streams_into_the_source_conversation() {
    let plugin = PluginBuilder::new("tern.test.stream", Streamer)
        .with_receive()
        .reply_sync(true)
        .build()
        .unwrap();
    let (_runtime, mock) = start(plugin).await;

    let packet = RecvPacket {
        from_uid: "u1".into(),
        to_uid: "u2".into(),
        channel_id: "u1@u2".into(),
        channel_type: CHANNEL_TYPE_PERSON,
        payload: TextPayload::new("question").encode().unwrap(),
        ..Default::default()
    };
    let response = mock
        .request_plugin(paths::PLUGIN_REPLY, tern_proto::encode(&packet).unwrap())
        .await;
    assert!(response.is_ok());

    let opens = mock.calls_to(paths::STREAM_OPEN).await;
    assert_eq!(opens.len(), 1);
    let info: StreamInfo = tern_proto::decode(&opens[0]).unwrap();
    assert_eq!(info.channel_id, "u1");
    assert_eq!(info.from_uid, "u2");
    assert_eq!(info.channel_type, CHANNEL_TYPE_PERSON);

    let writes = mock.calls_to(paths::STREAM_WRITE).await;
    assert_eq!(writes.len(), 2);
    for (i, body) in writes.iter().enumerate() {
        let write: StreamWriteReq = tern_proto::decode(body).unwrap();
        assert_eq!(write.stream_no, "stream-1");
        assert!(!write.header.red_dot, "streamed chunks must not set red dot");
        assert_eq!(write.payload, format!("chunk-{}", i + 1).into_bytes());
        assert_eq!(write.channel_id, "u1");
        assert_eq!(write.from_uid, "u2");
    }

    let closes = mock.calls_to(paths::STREAM_CLOSE).await;
    assert_eq!(closes.len(), 1);
    let close: StreamCloseReq = tern_proto::decode(&closes[0]).unwrap();
    assert_eq!(close.stream_no, "stream-1");
    assert_eq!(close.channel_id, "u1");
}

// Reply candidates also arrive as fire-and-forget pushes; same hook, same
// context.
#[tokio::test]
async fn reply_push_reaches_the_receive_hook() {
    let plugin = PluginBuilder::new("tern.test.replypush", Streamer)
        .with_receive()
        .build()
        .unwrap();
    let (_runtime, mock) = start(plugin).await;

    mock.push(
        PUSH_TAG_RECEIVE,
        tern_proto::encode(&receive_packet()).unwrap(),
    );

    assert!(mock.wait_for_calls(paths::STREAM_CLOSE, 1, WAIT).await);
    let opens = mock.calls_to(paths::STREAM_OPEN).await;
    assert_eq!(opens.len(), 1);
    let info: StreamInfo = tern_proto::decode(&opens[0]).unwrap();
    assert_eq!(info.channel_id, "u1");
    assert_eq!(info.from_uid, "bot");
}

struct GuardProbe {
    outcomes: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl ReceiveHook for GuardProbe {
    async fn receive(&self, ctx: &ReceiveContext) {
        let mut outcomes = self.outcomes.lock().await;
        match ctx.open_stream(StreamOptions::default()).await {
            Ok(stream) if stream.stream_no().is_empty() => {
                outcomes.push(match stream.write(b"x".to_vec()).await {
                    Err(PdkError::StreamNotOpen) => "unassigned-write-rejected",
                    _ => "unassigned-write-accepted",
                });
            }
            Ok(stream) => {
                let _ = stream.write(b"one".to_vec()).await;
                let _ = stream.close().await;
                outcomes.push(match stream.write(b"late".to_vec()).await {
                    Err(PdkError::StreamClosed(_)) => "write-after-close-rejected",
                    _ => "write-after-close-accepted",
                });
                outcomes.push(match stream.close().await {
                    Ok(()) => "second-close-ok",
                    Err(_) => "second-close-err",
                });
            }
            Err(_) => outcomes.push("open-failed"),
        }
    }
}

fn receive_packet() -> RecvPacket {
    RecvPacket {
        from_uid: "u1".into(),
        to_uid: "bot".into(),
        channel_id: "u1@bot".into(),
        channel_type: CHANNEL_TYPE_PERSON,
        ..Default::default()
    }
}

#[tokio::test]
async fn unassigned_stream_write_never_reaches_the_transport() {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let plugin = PluginBuilder::new(
        "tern.test.guard",
        GuardProbe {
            outcomes: outcomes.clone(),
        },
    )
    .with_receive()
    .build()
    .unwrap();
    let (_runtime, mock) = start(plugin).await;
    mock.respond_with(paths::STREAM_OPEN, |_body| {
        encoded(&StreamOpenResp {
            stream_no: String::new(),
        })
    })
    .await;

    let response = mock
        .request_plugin(
            paths::PLUGIN_REPLY,
            tern_proto::encode(&receive_packet()).unwrap(),
        )
        .await;
    assert!(response.is_ok());

    assert_eq!(*outcomes.lock().await, ["unassigned-write-rejected"]);
    assert!(mock.calls_to(paths::STREAM_WRITE).await.is_empty());
}

#[tokio::test]
async fn write_after_close_is_rejected_locally() {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let plugin = PluginBuilder::new(
        "tern.test.guard2",
        GuardProbe {
            outcomes: outcomes.clone(),
        },
    )
    .with_receive()
    .build()
    .unwrap();
    let (_runtime, mock) = start(plugin).await;

    let response = mock
        .request_plugin(
            paths::PLUGIN_REPLY,
            tern_proto::encode(&receive_packet()).unwrap(),
        )
        .await;
    assert!(response.is_ok());

    assert_eq!(
        *outcomes.lock().await,
        ["write-after-close-rejected", "second-close-ok"]
    );
    assert_eq!(mock.calls_to(paths::STREAM_WRITE).await.len(), 1);
    assert_eq!(mock.calls_to(paths::STREAM_CLOSE).await.len(), 1);
}

// ---- http routes -----------------------------------------------------------

struct Greeter;

impl RouteHook for Greeter {
    fn route(&self, router: &mut Router) {
        router.get("/hello", |mut ctx| {
            Box::pin(async move {
                let name = ctx.query("name").unwrap_or("world").to_string();
                ctx.json(200, &serde_json::json!({ "say": format!("hello {name}") }));
                ctx
            })
        });
        router.post("/echo", |mut ctx| {
            Box::pin(async move {
                let body = ctx.request().body.clone();
                ctx.write(200, body);
                ctx
            })
        });
    }
}

async fn route_roundtrip(mock: &MockHost, request: &HttpRequest) -> HttpResponse {
    let response = mock
        .request_plugin(paths::PLUGIN_ROUTE, tern_proto::encode(request).unwrap())
        .await;
    assert!(response.is_ok());
    tern_proto::decode(&response.body).unwrap()
}

#[tokio::test]
async fn routes_dispatch_by_method_and_path() {
    let plugin = PluginBuilder::new("tern.test.routes", Greeter)
        .with_route()
        .build()
        .unwrap();
    let (_runtime, mock) = start(plugin).await;

    let hello = HttpRequest {
        method: "GET".into(),
        path: "/hello".into(),
        query: [("name".to_string(), "tern".to_string())].into_iter().collect(),
        ..Default::default()
    };
    let http = route_roundtrip(&mock, &hello).await;
    assert_eq!(http.status, 200);
    assert_eq!(http.body, br#"{"say":"hello tern"}"#);
    assert_eq!(
        http.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );

    let echo = HttpRequest {
        method: "POST".into(),
        path: "/echo".into(),
        body: b"payload".to_vec(),
        ..Default::default()
    };
    let http = route_roundtrip(&mock, &echo).await;
    assert_eq!(http.body, b"payload");

    let missing = HttpRequest {
        method: "GET".into(),
        path: "/nope".into(),
        ..Default::default()
    };
    let http = route_roundtrip(&mock, &missing).await;
    assert_eq!(http.status, 404);
    assert_eq!(http.body, b"404 page not found");

    let wrong_method = HttpRequest {
        method: "POST".into(),
        path: "/hello".into(),
        ..Default::default()
    };
    let http = route_roundtrip(&mock, &wrong_method).await;
    assert_eq!(http.status, 404);
}

#[tokio::test]
async fn http_without_a_route_table_gets_404() {
    let plugin = PluginBuilder::new("tern.test.noroutes", Nop).build().unwrap();
    let (_runtime, mock) = start(plugin).await;

    let request = HttpRequest {
        method: "GET".into(),
        path: "/hello".into(),
        ..Default::default()
    };
    let http = route_roundtrip(&mock, &request).await;
    assert_eq!(http.status, 404);
}

// ---- configuration ---------------------------------------------------------

struct Reloader {
    reloads: Arc<AtomicUsize>,
}

#[async_trait]
impl ConfigUpdateHook for Reloader {
    async fn config_update(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn config_update_applies_and_notifies() {
    let store = ConfigStore::new(GreetConfig::default());
    let reloads = Arc::new(AtomicUsize::new(0));
    let plugin = PluginBuilder::new(
        "tern.test.config",
        Reloader {
            reloads: reloads.clone(),
        },
    )
    .config(store.clone())
    .with_config_update()
    .build()
    .unwrap();
    let (_runtime, mock) = start(plugin).await;

    let update = serde_json::json!({ "message": "hi", "limit": 3 });
    let response = mock
        .request_plugin(paths::PLUGIN_CONFIG_UPDATE, update.to_string().into_bytes())
        .await;
    assert!(response.is_ok());

    let config = store.get().await;
    assert_eq!(config.message, "hi");
    assert_eq!(config.limit, 3);
    assert_eq!(reloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn config_kind_mismatch_abandons_the_whole_update() {
    let store = ConfigStore::new(GreetConfig {
        message: "orig".into(),
        limit: 9,
    });
    let reloads = Arc::new(AtomicUsize::new(0));
    let plugin = PluginBuilder::new(
        "tern.test.badconfig",
        Reloader {
            reloads: reloads.clone(),
        },
    )
    .config(store.clone())
    .with_config_update()
    .build()
    .unwrap();
    let (_runtime, mock) = start(plugin).await;

    let update = serde_json::json!({ "limit": 1, "message": 42 });
    let response = mock
        .request_plugin(paths::PLUGIN_CONFIG_UPDATE, update.to_string().into_bytes())
        .await;
    assert_eq!(response.status, status::ERROR);

    let config = store.get().await;
    assert_eq!(config.message, "orig");
    assert_eq!(config.limit, 9);
    assert_eq!(reloads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn initial_config_flows_through_the_update_path() {
    let store = ConfigStore::new(GreetConfig::default());
    let reloads = Arc::new(AtomicUsize::new(0));
    let plugin = PluginBuilder::new(
        "tern.test.initconfig",
        Reloader {
            reloads: reloads.clone(),
        },
    )
    .config(store.clone())
    .with_config_update()
    .build()
    .unwrap();
    let (runtime, mock) = start(plugin).await;

    mock.respond_with(paths::PLUGIN_START, |_body| {
        let mut config = serde_json::Map::new();
        config.insert("message".to_string(), "from server".into());
        encoded(&StartupResp {
            success: true,
            sandbox_dir: "/tmp/s".into(),
            node_id: 3,
            config: Some(config),
            ..Default::default()
        })
    })
    .await;

    mock.authenticate();
    wait_ready(&runtime).await;

    assert_eq!(store.get().await.message, "from server");
    assert_eq!(reloads.load(Ordering::SeqCst), 1);
}

// ---- stop & dispatch edges -------------------------------------------------

struct Finisher {
    stops: Arc<AtomicUsize>,
}

#[async_trait]
impl StopHook for Finisher {
    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn stop_acks_then_releases_serve() {
    let stops = Arc::new(AtomicUsize::new(0));
    let plugin = PluginBuilder::new(
        "tern.test.stop",
        Finisher {
            stops: stops.clone(),
        },
    )
    .with_stop()
    .build()
    .unwrap();

    let mock = MockHost::new();
    let link = mock.clone();
    let serving = tokio::spawn(async move { serve(plugin, link).await });

    mock.authenticate();
    assert!(mock.wait_for_calls(paths::PLUGIN_START, 1, WAIT).await);

    let response = mock.request_plugin(paths::STOP, Vec::new()).await;
    assert!(response.is_ok());

    timeout(WAIT, serving)
        .await
        .expect("serve did not finish")
        .expect("serve task panicked")
        .expect("serve returned an error");
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_paths_and_bad_payloads_are_answered() {
    let plugin = PluginBuilder::new("tern.test.edges", Nop).build().unwrap();
    let (_runtime, mock) = start(plugin).await;

    let response = mock.request_plugin("/plugin/unknown", Vec::new()).await;
    assert_eq!(response.status, status::NOT_FOUND);

    let response = mock
        .request_plugin(paths::PLUGIN_SEND, b"not json".to_vec())
        .await;
    assert_eq!(response.status, status::ERROR);
}

#[tokio::test]
async fn bad_pushes_are_dropped_quietly() {
    let plugin = PluginBuilder::new("tern.test.pushes", Nop).build().unwrap();
    let (_runtime, mock) = start(plugin).await;

    mock.push(99, b"junk".to_vec());
    mock.push(PUSH_TAG_RECEIVE, b"junk".to_vec());

    // the runtime is still alive and dispatching
    let response = mock
        .request_plugin(
            paths::PLUGIN_SEND,
            tern_proto::encode(&SendPacket::default()).unwrap(),
        )
        .await;
    assert!(response.is_ok());
}

// ---- host client -----------------------------------------------------------

#[tokio::test]
async fn host_requests_are_bounded_by_the_timeout() {
    let plugin = PluginBuilder::new("tern.test.timeout", Nop)
        .rpc_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let (runtime, mock) = start(plugin).await;
    mock.stall(paths::CONVERSATION_CHANNELS).await;

    let err = runtime
        .host()
        .conversation_channels("u1")
        .await
        .unwrap_err();
    assert!(matches!(err, PdkError::Timeout { .. }));
}

#[tokio::test]
async fn forward_http_fills_the_plugin_identity() {
    let plugin = PluginBuilder::new("tern.test.forward", Nop).build().unwrap();
    let (runtime, mock) = start(plugin).await;
    mock.respond_with(paths::PLUGIN_HTTP_FORWARD, |_body| {
        encoded(&HttpResponse {
            status: 204,
            ..Default::default()
        })
    })
    .await;

    let response = runtime
        .host()
        .forward_http(ForwardHttpReq {
            to_node_id: 2,
            request: HttpRequest {
                method: "GET".into(),
                path: "/x".into(),
                ..Default::default()
            },
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.status, 204);

    let bodies = mock.calls_to(paths::PLUGIN_HTTP_FORWARD).await;
    assert_eq!(bodies.len(), 1);
    let req: ForwardHttpReq = tern_proto::decode(&bodies[0]).unwrap();
    assert_eq!(req.plugin_no, "tern.test.forward");
    assert_eq!(req.to_node_id, 2);
}
