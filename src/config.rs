//! Configuration - Engine options, type definitions and the config registry.
//!
//! [`EngineConfig`] is plain serde data and can be loaded from JSON:
//!
//! ```ignore
//! let config = EngineConfig::from_json(r#"{
//!     "validationVisibility": "live",
//!     "classes": { "outer": "field", "label": { "field-label": true } },
//!     "types": { "rating": { "kind": "input", "family": "number", "props": ["max"] } }
//! }"#)?;
//! ```
//!
//! [`ConfigRegistry`] is the explicit, shared owner of the active
//! configuration. Every view context registers its node on attach and
//! unregisters on destroy, so engine-wide changes (root classes, global class
//! map) reach exactly the live nodes.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::classes::RootClassFn;
use crate::error::Result;
use crate::node::{Node, WeakNode};
use crate::types::{DirtyBehavior, NodeKind, ValidationVisibility, Value};

// =============================================================================
// Type Definition
// =============================================================================

/// What the engine needs to know about an input type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeDefinition {
    pub kind: NodeKind,
    pub family: Option<String>,
    /// Extra props mirrored into the view context.
    pub props: Vec<String>,
}

impl TypeDefinition {
    pub fn input(family: Option<&str>, props: &[&str]) -> Self {
        Self {
            kind: NodeKind::Input,
            family: family.map(String::from),
            props: props.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Built-in type library.
fn default_types() -> IndexMap<String, TypeDefinition> {
    let mut types = IndexMap::new();
    for name in [
        "text", "email", "password", "search", "tel", "url", "number", "date",
        "datetime-local", "month", "time", "week", "color", "range", "textarea",
    ] {
        types.insert(name.to_string(), TypeDefinition::input(Some("text"), &[]));
    }
    types.insert("hidden".into(), TypeDefinition::input(None, &[]));
    types.insert("select".into(), TypeDefinition::input(Some("dropdown"), &["options", "placeholder"]));
    types.insert("checkbox".into(), TypeDefinition::input(Some("box"), &["options", "onValue", "offValue"]));
    types.insert("radio".into(), TypeDefinition::input(Some("box"), &["options"]));
    types.insert("file".into(), TypeDefinition::input(None, &["noFiles"]));
    types.insert("button".into(), TypeDefinition::input(Some("button"), &[]));
    types.insert("submit".into(), TypeDefinition::input(Some("button"), &[]));
    types.insert(
        "form".into(),
        TypeDefinition::input(None, &["actions", "submitLabel", "incompleteMessage"]).with_kind(NodeKind::Group),
    );
    types.insert("group".into(), TypeDefinition::input(None, &[]).with_kind(NodeKind::Group));
    types.insert("list".into(), TypeDefinition::input(None, &[]).with_kind(NodeKind::List));
    types
}

// =============================================================================
// Engine Config
// =============================================================================

/// Engine-wide options. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Overrides the per-type default visibility mode.
    pub validation_visibility: Option<ValidationVisibility>,
    /// Used when a node has no `dirtyBehavior` prop.
    pub dirty_behavior: DirtyBehavior,
    /// Global class map: property → class string or `{ class: bool }`.
    pub classes: IndexMap<String, Value>,
    /// Known input types.
    pub types: IndexMap<String, TypeDefinition>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validation_visibility: None,
            dirty_behavior: DirtyBehavior::default(),
            classes: IndexMap::new(),
            types: default_types(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON config. Types listed in the JSON extend the built-in
    /// library (and replace entries with the same name).
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: EngineConfig = serde_json::from_str(json)?;
        let mut types = default_types();
        types.extend(config.types);
        config.types = types;
        Ok(config)
    }

    pub fn with_type(mut self, name: impl Into<String>, definition: TypeDefinition) -> Self {
        self.types.insert(name.into(), definition);
        self
    }

    pub fn with_classes(mut self, property: impl Into<String>, classes: impl Into<Value>) -> Self {
        self.classes.insert(property.into(), classes.into());
        self
    }

    pub fn with_validation_visibility(mut self, mode: ValidationVisibility) -> Self {
        self.validation_visibility = Some(mode);
        self
    }

    pub fn with_dirty_behavior(mut self, behavior: DirtyBehavior) -> Self {
        self.dirty_behavior = behavior;
        self
    }

    pub fn definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Default)]
struct RegistryInner {
    config: RefCell<EngineConfig>,
    root_classes: RefCell<Option<RootClassFn>>,
    active: RefCell<IndexMap<String, WeakNode>>,
}

/// Shared handle to the active configuration and the nodes using it.
#[derive(Clone, Default)]
pub struct ConfigRegistry {
    inner: Rc<RegistryInner>,
}

impl ConfigRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                config: RefCell::new(config),
                ..Default::default()
            }),
        }
    }

    /// Snapshot of the configuration.
    pub fn config(&self) -> EngineConfig {
        self.inner.config.borrow().clone()
    }

    pub fn definition(&self, name: &str) -> Option<TypeDefinition> {
        self.inner.config.borrow().definition(name).cloned()
    }

    /// Global class source for a property.
    pub fn class_source(&self, property: &str) -> Option<Value> {
        self.inner.config.borrow().classes.get(property).cloned()
    }

    // -------------------------------------------------------------------------
    // Active nodes
    // -------------------------------------------------------------------------

    pub fn register(&self, node: &Node) {
        debug!(node = %node.uid(), "registry register");
        self.inner
            .active
            .borrow_mut()
            .insert(node.uid().to_string(), node.downgrade());
    }

    pub fn unregister(&self, uid: &str) {
        if self.inner.active.borrow_mut().shift_remove(uid).is_some() {
            debug!(node = %uid, "registry unregister");
        }
    }

    pub fn is_registered(&self, uid: &str) -> bool {
        self.inner.active.borrow().contains_key(uid)
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.borrow().len()
    }

    /// Live registered nodes, in registration order.
    pub fn active_nodes(&self) -> Vec<Node> {
        self.inner
            .active
            .borrow()
            .values()
            .filter_map(WeakNode::upgrade)
            .collect()
    }

    // -------------------------------------------------------------------------
    // Engine-wide changes
    // -------------------------------------------------------------------------

    /// Root class function handed to nodes that attach without one.
    pub fn root_classes(&self) -> Option<RootClassFn> {
        self.inner.root_classes.borrow().clone()
    }

    /// Replace the root class function for the registry and every active node.
    pub fn set_root_classes(&self, root_classes: Option<RootClassFn>) {
        *self.inner.root_classes.borrow_mut() = root_classes.clone();
        for node in self.active_nodes() {
            node.set_root_classes(root_classes.clone());
        }
    }

    /// Change one entry of the global class map and drop the cached classes
    /// of every active node.
    pub fn set_classes(&self, property: &str, classes: Option<Value>) {
        {
            let mut config = self.inner.config.borrow_mut();
            match classes {
                Some(classes) => {
                    config.classes.insert(property.to_string(), classes);
                }
                None => {
                    config.classes.shift_remove(property);
                }
            }
        }
        for node in self.active_nodes() {
            if let Some(context) = node.context() {
                context.classes().invalidate_property(property);
            }
        }
    }
}
