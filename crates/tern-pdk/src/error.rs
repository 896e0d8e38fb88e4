use thiserror::Error;

use crate::config::FieldKind;

#[derive(Debug, Error)]
pub enum PdkError {
    #[error("codec error: {0}")]
    Codec(#[from] tern_proto::CodecError),

    #[error("rpc to {path} failed with status {status}: {message}")]
    Rpc {
        path: String,
        status: u32,
        message: String,
    },

    #[error("rpc to {path} timed out after {timeout_ms}ms")]
    Timeout { path: String, timeout_ms: u64 },

    #[error("rpc channel closed")]
    ChannelClosed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("registration rejected by server: {0}")]
    Registration(String),

    #[error("config field '{field}' expects {expected}, got {found}")]
    ConfigConversion {
        field: String,
        expected: FieldKind,
        found: &'static str,
    },

    #[error("config update is not valid for the declared config type: {0}")]
    ConfigInvalid(#[source] serde_json::Error),

    #[error("stream is not open")]
    StreamNotOpen,

    #[error("stream {0} is already closed")]
    StreamClosed(String),

    #[error("plugin identity must not be empty")]
    MissingPluginNo,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PdkError>;
