//! Registration schemas: the descriptor a plugin announces itself with and
//! the server's startup acknowledgement.

use serde::{Deserialize, Serialize};

/// The plugin descriptor, sent with every registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Stable plugin identity, e.g. `"tern.ai.answer"`.
    pub no: String,
    /// Executable basename, informational.
    #[serde(default)]
    pub name: String,
    /// Plugin version string.
    #[serde(default)]
    pub version: String,
    /// Relative ordering when several plugins hook the same operation.
    #[serde(default)]
    pub priority: i32,
    /// Deliver persisted-message batches as requests instead of pushes.
    #[serde(default)]
    pub persist_after_sync: bool,
    /// Deliver reply candidates as requests instead of pushes.
    #[serde(default)]
    pub reply_sync: bool,
    /// Ordered names of the hooks this plugin implements.
    #[serde(default)]
    pub methods: Vec<String>,
    /// User-facing schema of the plugin's configurable fields.
    #[serde(default)]
    pub config_template: ConfigTemplate,
}

/// Schema of a plugin's configurable fields, rendered by the server's admin UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigTemplate {
    #[serde(default)]
    pub fields: Vec<TemplateField>,
}

/// One configurable field in a [`ConfigTemplate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    pub name: String,
    #[serde(default)]
    pub label: String,
    /// One of `string`, `number`, `bool`, `secret`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Server acknowledgement of `/plugin/start`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartupResp {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err_msg: String,
    /// Scratch directory reserved for this plugin on the server node.
    #[serde(default)]
    pub sandbox_dir: String,
    /// Identity of the cluster node the plugin is attached to.
    #[serde(default)]
    pub node_id: u64,
    /// Last saved configuration, applied before any live update arrives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Map<String, serde_json::Value>>,
}
