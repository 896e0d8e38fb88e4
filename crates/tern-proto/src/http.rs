//! HTTP frames forwarded over the RPC channel.
//!
//! The server exposes `/plugins/{no}/**` on its public listener and forwards
//! matching requests to the owning plugin as a `HttpRequest`; the plugin
//! answers with a `HttpResponse` over the same RPC round trip.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A forwarded HTTP request, decoded from the server's public listener.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Upper-case method name, e.g. `GET`.
    #[serde(default)]
    pub method: String,
    /// Path below the plugin's mount point, e.g. `/hello`.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Vec<u8>,
}

/// The plugin's answer to a forwarded HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }
}
