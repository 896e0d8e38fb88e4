//! Inbound envelope dispatch.
//!
//! Each envelope is decoded into one [`HostCall`] and routed by a single
//! match. Requests always get an answer, even for unknown paths and
//! undecodable payloads; pushes are best-effort and dropped on error.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use tern_proto::{HttpRequest, HttpResponse, MessageBatch, RecvPacket, SendPacket};

use crate::context::{BatchContext, HttpContext, ReceiveContext, SendContext};
use crate::hooks::{PUSH_TAG_PERSIST_AFTER, PUSH_TAG_RECEIVE};
use crate::rpc::{Inbound, RpcResponse, paths};
use crate::runtime::{Host, RuntimeInner};

/// A decoded server-initiated operation.
enum HostCall {
    Send(SendPacket),
    PersistAfter(MessageBatch),
    Receive(RecvPacket),
    Route(HttpRequest),
    ConfigUpdate(Map<String, Value>),
    Stop,
}

enum DecodeFailure {
    UnknownPath,
    Payload(tern_proto::CodecError),
}

fn decode_request(path: &str, body: &[u8]) -> Result<HostCall, DecodeFailure> {
    let call = match path {
        paths::PLUGIN_SEND => {
            HostCall::Send(tern_proto::decode(body).map_err(DecodeFailure::Payload)?)
        }
        paths::PLUGIN_PERSIST_AFTER => {
            HostCall::PersistAfter(tern_proto::decode(body).map_err(DecodeFailure::Payload)?)
        }
        paths::PLUGIN_REPLY => {
            HostCall::Receive(tern_proto::decode(body).map_err(DecodeFailure::Payload)?)
        }
        paths::PLUGIN_ROUTE => {
            HostCall::Route(tern_proto::decode(body).map_err(DecodeFailure::Payload)?)
        }
        paths::PLUGIN_CONFIG_UPDATE => {
            HostCall::ConfigUpdate(tern_proto::decode(body).map_err(DecodeFailure::Payload)?)
        }
        paths::STOP => HostCall::Stop,
        _ => return Err(DecodeFailure::UnknownPath),
    };
    Ok(call)
}

/// Entry point for one inbound envelope; runs on its own task.
pub(crate) async fn dispatch(inner: Arc<RuntimeInner>, envelope: Inbound) {
    match envelope {
        Inbound::Request { path, body, reply } => {
            handle_request(&inner, &path, &body, reply).await;
        }
        Inbound::Push { tag, body } => handle_push(&inner, tag, &body).await,
    }
}

async fn handle_request(
    inner: &Arc<RuntimeInner>,
    path: &str,
    body: &[u8],
    reply: oneshot::Sender<RpcResponse>,
) {
    let call = match decode_request(path, body) {
        Ok(call) => call,
        Err(DecodeFailure::UnknownPath) => {
            debug!(path, "request for unknown path");
            let _ = reply.send(RpcResponse::not_found(format!("unknown path {path}")));
            return;
        }
        Err(DecodeFailure::Payload(err)) => {
            warn!(path, error = %err, "undecodable request payload");
            let _ = reply.send(RpcResponse::error(err.to_string()));
            return;
        }
    };

    match call {
        // Ack first so the server never waits on our teardown.
        HostCall::Stop => {
            let _ = reply.send(RpcResponse::ok(Vec::new()));
            debug!("server requested stop");
            inner.begin_stop();
        }
        HostCall::Send(packet) => {
            let packet = run_send(inner, packet).await;
            let response = match tern_proto::encode(&packet) {
                Ok(body) => RpcResponse::ok(body),
                Err(err) => RpcResponse::error(err.to_string()),
            };
            let _ = reply.send(response);
        }
        HostCall::PersistAfter(batch) => {
            run_persist_after(inner, batch).await;
            let _ = reply.send(RpcResponse::ok(Vec::new()));
        }
        HostCall::Receive(packet) => {
            run_receive(inner, packet).await;
            let _ = reply.send(RpcResponse::ok(Vec::new()));
        }
        HostCall::Route(request) => {
            let response = run_route(inner, request).await;
            let response = match tern_proto::encode(&response) {
                Ok(body) => RpcResponse::ok(body),
                Err(err) => RpcResponse::error(err.to_string()),
            };
            let _ = reply.send(response);
        }
        HostCall::ConfigUpdate(updates) => {
            let response = match inner.apply_config_update(&updates).await {
                Ok(()) => RpcResponse::ok(Vec::new()),
                Err(err) => {
                    warn!(error = %err, "config update abandoned");
                    RpcResponse::error(err.to_string())
                }
            };
            let _ = reply.send(response);
        }
    }
}

async fn handle_push(inner: &Arc<RuntimeInner>, tag: u32, body: &[u8]) {
    match tag {
        PUSH_TAG_PERSIST_AFTER => match tern_proto::decode(body) {
            Ok(batch) => run_persist_after(inner, batch).await,
            Err(err) => warn!(tag, error = %err, "dropping undecodable push"),
        },
        PUSH_TAG_RECEIVE => match tern_proto::decode(body) {
            Ok(packet) => run_receive(inner, packet).await,
            Err(err) => warn!(tag, error = %err, "dropping undecodable push"),
        },
        other => debug!(tag = other, "dropping push with unknown tag"),
    }
}

/// Run the send hook; without one the packet passes through untouched.
async fn run_send(inner: &Arc<RuntimeInner>, packet: SendPacket) -> SendPacket {
    match &inner.hooks.send {
        Some(hook) => {
            let mut ctx = SendContext::new(packet, Host::new(inner.clone()));
            hook.send(&mut ctx).await;
            ctx.into_packet()
        }
        None => packet,
    }
}

async fn run_persist_after(inner: &Arc<RuntimeInner>, batch: MessageBatch) {
    if let Some(hook) = &inner.hooks.persist_after {
        let ctx = BatchContext::new(batch.messages, Host::new(inner.clone()));
        hook.persist_after(&ctx).await;
    }
}

async fn run_receive(inner: &Arc<RuntimeInner>, packet: RecvPacket) {
    if let Some(hook) = &inner.hooks.receive {
        let ctx = ReceiveContext::new(packet, Host::new(inner.clone()));
        hook.receive(&ctx).await;
    }
}

async fn run_route(inner: &Arc<RuntimeInner>, request: HttpRequest) -> HttpResponse {
    let ctx = HttpContext::new(request, Host::new(inner.clone()));
    match &inner.hooks.route_table {
        Some(router) => router.dispatch(ctx).await.into_response(),
        None => {
            warn!("http request but no routes are registered");
            let mut ctx = ctx;
            ctx.not_found();
            ctx.into_response()
        }
    }
}
