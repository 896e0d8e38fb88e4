//! Declarative plugin configuration.
//!
//! A plugin declares its configurable surface as a serde struct plus an
//! ordered field list. The runtime derives the admin-UI template from the
//! declaration and applies live updates against it; the plugin reads
//! snapshots through a shared [`ConfigStore`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use tern_proto::{ConfigTemplate, TemplateField};

use crate::error::{PdkError, Result};

/// Field kinds the server's admin UI can render.
///
/// `Secret` serializes like a string; the flag only controls masking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Secret,
}

impl FieldKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
            FieldKind::Secret => "secret",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::String | FieldKind::Secret => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One declared configurable field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Serde name of the struct field this spec describes.
    pub name: &'static str,
    /// Display label; falls back to the name when empty.
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { name, label, kind }
    }
}

/// A plugin's configuration schema.
///
/// Struct fields without a [`FieldSpec`] are invisible to the server: they
/// do not appear in the template and incoming updates cannot touch them.
pub trait PluginConfig:
    Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Declared fields, in template order.
    fn fields() -> &'static [FieldSpec];
}

/// Derive the user-facing template from a config schema.
pub(crate) fn derive_template<C: PluginConfig>() -> ConfigTemplate {
    let fields = C::fields()
        .iter()
        .map(|spec| TemplateField {
            name: spec.name.to_string(),
            label: if spec.label.is_empty() {
                spec.name.to_string()
            } else {
                spec.label.to_string()
            },
            kind: spec.kind.wire_name().to_string(),
        })
        .collect();
    ConfigTemplate { fields }
}

/// Apply a dynamic update map on top of the current value.
///
/// Fields absent from the map keep their prior values. The whole update is
/// abandoned on the first value that fails its declared kind, and on a
/// merged document the config type cannot deserialize.
pub(crate) fn apply_update<C: PluginConfig>(
    current: &C,
    updates: &Map<String, Value>,
) -> Result<C> {
    let mut doc = match serde_json::to_value(current).map_err(PdkError::ConfigInvalid)? {
        Value::Object(doc) => doc,
        _ => Map::new(),
    };
    for spec in C::fields() {
        let Some(value) = updates.get(spec.name) else {
            continue;
        };
        if !spec.kind.accepts(value) {
            return Err(PdkError::ConfigConversion {
                field: spec.name.to_string(),
                expected: spec.kind,
                found: json_type_name(value),
            });
        }
        doc.insert(spec.name.to_string(), value.clone());
    }
    serde_json::from_value(Value::Object(doc)).map_err(PdkError::ConfigInvalid)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Shared handle to the live configuration value.
///
/// The runtime replaces the value wholesale on each successful update; hook
/// code takes cheap snapshots whenever it needs one.
#[derive(Debug, Clone)]
pub struct ConfigStore<C> {
    value: Arc<RwLock<C>>,
}

impl<C: PluginConfig> ConfigStore<C> {
    pub fn new(initial: C) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial)),
        }
    }

    /// Snapshot of the current value.
    pub async fn get(&self) -> C {
        self.value.read().await.clone()
    }

    pub(crate) async fn set(&self, next: C) {
        *self.value.write().await = next;
    }
}

impl<C: PluginConfig> Default for ConfigStore<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

/// Type-erased slot the runtime drives template derivation and updates
/// through, so it never needs the concrete config type.
#[async_trait]
pub(crate) trait ConfigSlot: Send + Sync {
    fn template(&self) -> ConfigTemplate;
    async fn apply(&self, updates: &Map<String, Value>) -> Result<()>;
}

pub(crate) struct TypedSlot<C: PluginConfig> {
    pub(crate) store: ConfigStore<C>,
}

#[async_trait]
impl<C: PluginConfig> ConfigSlot for TypedSlot<C> {
    fn template(&self) -> ConfigTemplate {
        derive_template::<C>()
    }

    async fn apply(&self, updates: &Map<String, Value>) -> Result<()> {
        let current = self.store.get().await;
        let next = apply_update(&current, updates)?;
        self.store.set(next).await;
        Ok(())
    }
}
