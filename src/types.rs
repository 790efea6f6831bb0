//! Core types for formstate-sync.
//!
//! These types flow between the node collaborator and the engine:
//! messages, node kinds, visibility modes and the dirty behavior switch.
//! Field values are plain `serde_json::Value`s so deep equality is just `==`.

use serde::{Deserialize, Serialize};

pub use serde_json::Value;

// =============================================================================
// Node Kind
// =============================================================================

/// Structural kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Leaf field holding a scalar or opaque value.
    #[default]
    Input,
    /// Object-valued parent (forms, fieldsets).
    Group,
    /// Array-valued parent.
    List,
}

// =============================================================================
// Messages
// =============================================================================

/// Category of a store message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Produced by validation rules. Hidden until validation is visible.
    Validation,
    /// Errors set from outside (server responses, form-level errors).
    Error,
    /// Hidden flags such as `blurred`, `dirty`, `submitted`, `failing`.
    #[default]
    State,
    /// Presentational messages (loading text, hints).
    Ui,
}

/// Free-form metadata attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Purge this message on the next commit of an input node.
    #[serde(default)]
    pub auto_clear: bool,
    /// Show a `ui` message in the regular message list instead of `ui`.
    #[serde(default)]
    pub show_as_message: bool,
}

/// A single entry in a node's message store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub key: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub value: Value,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default)]
    pub meta: MessageMeta,
}

fn default_visible() -> bool {
    true
}

impl Message {
    /// Create a visible, non-blocking message with a null value.
    pub fn new(key: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            key: key.into(),
            message_type,
            value: Value::Null,
            visible: true,
            blocking: false,
            meta: MessageMeta::default(),
        }
    }

    /// Create a hidden boolean state message (`blurred`, `dirty`, ...).
    pub fn state(key: impl Into<String>, value: bool) -> Self {
        Self {
            visible: false,
            value: Value::Bool(value),
            ..Self::new(key, MessageType::State)
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn with_meta(mut self, meta: MessageMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Mark the message for removal on the next user commit.
    pub fn auto_clear(mut self) -> Self {
        self.meta.auto_clear = true;
        self
    }

    /// Loose truthiness of the message value, used for state flags.
    pub fn is_truthy(&self) -> bool {
        truthy(&self.value)
    }
}

// =============================================================================
// Validation Visibility
// =============================================================================

/// When validation messages become visible to the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationVisibility {
    /// Always visible.
    Live,
    /// Visible once the field has been blurred.
    Blur,
    /// Visible once the field has been changed.
    Dirty,
    /// Unrecognized mode. Never visible (until submit).
    #[serde(other)]
    Unknown,
}

impl ValidationVisibility {
    /// Parse a mode name. Unrecognized names map to `Unknown`.
    pub fn parse(mode: &str) -> Self {
        match mode {
            "live" => Self::Live,
            "blur" => Self::Blur,
            "dirty" => Self::Dirty,
            _ => Self::Unknown,
        }
    }

    /// Parse a prop payload. Only strings name a mode.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(Self::parse)
    }

    /// Default mode for an input type: checkboxes wait for a change,
    /// everything else waits for blur.
    pub fn default_for(input_type: &str) -> Self {
        if input_type == "checkbox" {
            Self::Dirty
        } else {
            Self::Blur
        }
    }
}

// =============================================================================
// Dirty Behavior
// =============================================================================

/// How the `dirty` flag reacts to later commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirtyBehavior {
    /// Once dirty, always dirty.
    #[default]
    Touched,
    /// Dirty exactly while the value differs from the baseline.
    Compare,
}

impl DirtyBehavior {
    pub fn from_value(value: &Value) -> Self {
        match value.as_str() {
            Some("compare") => Self::Compare,
            _ => Self::Touched,
        }
    }
}

// =============================================================================
// Value helpers
// =============================================================================

/// Loose truthiness of a value, the way boolean-ish state is read from props
/// and messages: `null`, `false`, `0`, and `""` are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Read a boolean attribute-style prop: absent, `false` and `"false"` are off,
/// everything else (including an empty string) is on.
pub fn flag_prop(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s != "false",
        Some(_) => true,
    }
}

// =============================================================================
// Tests
// =============================================================================
