//! Class Resolver - Lazy, cached class names per UI region.
//!
//! A region ("property": `outer`, `label`, `input`, `message`, ...) gets its
//! class string from four ordered sources:
//! 1. the node's root class function
//! 2. the engine-wide class map in [`EngineConfig`](crate::config::EngineConfig)
//! 3. the programmatic `_<property>Class` prop
//! 4. the `<property>Class` prop
//!
//! Sources are merged as ordered class → bool lists. A later source with
//! `$reset: true` discards everything before it, and a `$remove:<class>` entry
//! strips `<class>`. The first read of a property resolves and caches it;
//! later reads hit the cache, even for empty strings.
//!
//! # Example
//!
//! ```ignore
//! let classes = context.classes();
//! let outer = classes.get("outer");   // resolves and caches
//! let again = classes.get("outer");   // cache hit
//! node.set_root_classes(None);        // invalidates everything
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;
use spark_signals::{signal, Signal};
use tracing::trace;

use crate::config::ConfigRegistry;
use crate::node::{Node, WeakNode};
use crate::types::{truthy, Value};

/// Names starting with this prefix belong to reactive bookkeeping and are
/// never resolved.
pub const INTERNAL_PREFIX: &str = "__";

const RESET: &str = "$reset";
const REMOVE: &str = "$remove:";

/// Root class function: `(property, node) -> classes`.
pub type RootClassFn = Rc<dyn Fn(&str, &Node) -> ClassList>;

// =============================================================================
// Class List
// =============================================================================

/// Ordered set of classes with on/off flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassList(IndexMap<String, bool>);

impl ClassList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitespace-separated class names, all on.
    pub fn parse(classes: &str) -> Self {
        classes.split_whitespace().map(|c| (c.to_string(), true)).collect()
    }

    /// Strings parse as class names, objects map class → truthiness, arrays
    /// list class names. Anything else is empty.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), truthy(v))).collect(),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .flat_map(str::split_whitespace)
                .map(|c| (c.to_string(), true))
                .collect(),
            _ => Self::default(),
        }
    }

    pub fn with(mut self, class: impl Into<String>, on: bool) -> Self {
        self.0.insert(class.into(), on);
        self
    }

    pub fn insert(&mut self, class: impl Into<String>, on: bool) {
        self.0.insert(class.into(), on);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Enabled class names in order.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter(|(_, on)| **on).map(|(c, _)| c.as_str())
    }

    /// Apply `$remove:<class>` entries when anything else is enabled.
    fn apply_removals(&mut self) {
        let enabled: Vec<String> = self.enabled().map(String::from).collect();
        let removals: Vec<String> = enabled.iter().filter(|c| c.starts_with(REMOVE)).cloned().collect();
        if enabled.len() <= 1 || removals.is_empty() {
            return;
        }
        for removal in removals {
            if let Some(target) = removal.strip_prefix(REMOVE) {
                self.0.insert(target.to_string(), false);
            }
            self.0.insert(removal, false);
        }
    }
}

impl FromIterator<(String, bool)> for ClassList {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Merge class sources in order into a space-separated class string.
pub fn merge(sources: impl IntoIterator<Item = ClassList>) -> String {
    let mut combined = ClassList::new();
    for mut source in sources {
        let reset = source.0.shift_remove(RESET).unwrap_or(false);
        if reset {
            combined = source;
        } else {
            combined.0.extend(source.0);
        }
        combined.apply_removals();
    }
    combined
        .enabled()
        .filter(|c| !c.starts_with('$'))
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Resolver
// =============================================================================

/// Memoized class lookup for one node.
pub struct ClassResolver {
    node: WeakNode,
    registry: ConfigRegistry,
    cache: RefCell<IndexMap<String, String>>,
    version: Signal<u64>,
    resolutions: Cell<usize>,
}

impl ClassResolver {
    pub fn new(node: WeakNode, registry: ConfigRegistry) -> Self {
        Self {
            node,
            registry,
            cache: RefCell::new(IndexMap::new()),
            version: signal(0),
            resolutions: Cell::new(0),
        }
    }

    /// Class string for a property, resolved on first read.
    pub fn get(&self, property: &str) -> String {
        // Readers re-run when the cache is invalidated
        let _ = self.version.get();

        if property.starts_with(INTERNAL_PREFIX) {
            return String::new();
        }
        if let Some(hit) = self.cache.borrow().get(property) {
            return hit.clone();
        }
        let Some(node) = self.node.upgrade().filter(|n| !n.is_destroyed()) else {
            return String::new();
        };

        let class_name = self.resolve(property, &node);
        self.cache
            .borrow_mut()
            .insert(property.to_string(), class_name.clone());
        class_name
    }

    fn resolve(&self, property: &str, node: &Node) -> String {
        self.resolutions.set(self.resolutions.get() + 1);
        trace!(node = %node.uid(), property, "resolving classes");

        let root = node
            .root_classes()
            .map(|root_classes| root_classes(property, node))
            .unwrap_or_default();
        let global = self
            .registry
            .class_source(property)
            .map(|v| ClassList::from_value(&v))
            .unwrap_or_default();
        let computed = node
            .prop(&format!("_{property}Class"))
            .map(|v| ClassList::from_value(&v))
            .unwrap_or_default();
        let direct = node
            .prop(&format!("{property}Class"))
            .map(|v| ClassList::from_value(&v))
            .unwrap_or_default();

        merge([root, global, computed, direct])
    }

    /// Drop every cached property (root class function changed).
    pub fn invalidate(&self) {
        self.cache.borrow_mut().clear();
        self.version.set(self.version.get() + 1);
    }

    /// Drop one cached property (its class prop changed).
    pub fn invalidate_property(&self, property: &str) {
        let removed = self.cache.borrow_mut().shift_remove(property).is_some();
        if removed {
            self.version.set(self.version.get() + 1);
        }
    }

    /// Properties currently cached.
    pub fn cached(&self) -> Vec<String> {
        self.cache.borrow().keys().cloned().collect()
    }

    /// Bumped on every invalidation.
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    /// How many resolution passes have run.
    pub fn resolutions(&self) -> usize {
        self.resolutions.get()
    }
}

/// Map a class prop name (`labelClass`, `_labelClass`) to its property.
pub fn class_prop_property(key: &str) -> Option<&str> {
    let property = key.strip_prefix('_').unwrap_or(key).strip_suffix("Class")?;
    (!property.is_empty()).then_some(property)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::node::NodeOptions;
    use serde_json::json;

    fn resolver(node: &Node, config: EngineConfig) -> ClassResolver {
        ClassResolver::new(node.downgrade(), ConfigRegistry::new(config))
    }

    #[test]
    fn test_merge_in_order() {
        let merged = merge([
            ClassList::parse("a b"),
            ClassList::new().with("b", false).with("c", true),
        ]);
        assert_eq!(merged, "a c");
    }

    #[test]
    fn test_merge_reset() {
        let merged = merge([
            ClassList::parse("root global"),
            ClassList::parse("mine").with(RESET, true),
            ClassList::parse("extra"),
        ]);
        assert_eq!(merged, "mine extra");
    }

    #[test]
    fn test_merge_remove() {
        let merged = merge([
            ClassList::parse("outer wide"),
            ClassList::parse("$remove:wide narrow"),
        ]);
        assert_eq!(merged, "outer narrow");
    }

    #[test]
    fn test_merge_empty() {
        assert_eq!(merge([ClassList::new(), ClassList::new()]), "");
    }

    #[test]
    fn test_from_value() {
        assert_eq!(ClassList::from_value(&json!("a  b")), ClassList::parse("a b"));
        assert_eq!(
            ClassList::from_value(&json!({ "a": true, "b": false })),
            ClassList::new().with("a", true).with("b", false)
        );
        assert_eq!(ClassList::from_value(&json!(["a b", "c"])), ClassList::parse("a b c"));
        assert!(ClassList::from_value(&json!(1)).is_empty());
    }

    #[test]
    fn test_source_order() {
        let config = EngineConfig::default().with_classes("label", json!("global"));
        let node = Node::new(
            NodeOptions::input("text")
                .with_prop("_labelClass", "computed")
                .with_prop("labelClass", "direct"),
        );
        node.set_root_classes(Some(Rc::new(|property: &str, _: &Node| {
            ClassList::parse(&format!("root-{property}"))
        })));

        let classes = resolver(&node, config);
        assert_eq!(classes.get("label"), "root-label global computed direct");
    }

    #[test]
    fn test_memoized_per_property() {
        let node = Node::new(NodeOptions::input("text"));
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        node.set_root_classes(Some(Rc::new(move |property: &str, _: &Node| {
            calls_clone.set(calls_clone.get() + 1);
            ClassList::parse(property)
        })));

        let classes = resolver(&node, EngineConfig::default());
        assert_eq!(classes.get("outer"), "outer");
        assert_eq!(classes.get("outer"), "outer");
        assert_eq!(calls.get(), 1);
        assert_eq!(classes.resolutions(), 1);

        classes.get("inner");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_empty_result_is_cached() {
        let node = Node::new(NodeOptions::input("text"));
        let classes = resolver(&node, EngineConfig::default());

        assert_eq!(classes.get("help"), "");
        assert_eq!(classes.get("help"), "");
        assert_eq!(classes.resolutions(), 1);
        assert_eq!(classes.cached(), vec!["help".to_string()]);
    }

    #[test]
    fn test_internal_prefix_never_resolves() {
        let node = Node::new(NodeOptions::input("text"));
        let classes = resolver(&node, EngineConfig::default());

        assert_eq!(classes.get("__v_isRef"), "");
        assert_eq!(classes.resolutions(), 0);
        assert!(classes.cached().is_empty());
    }

    #[test]
    fn test_invalidation() {
        let node = Node::new(NodeOptions::input("text").with_prop("outerClass", "a"));
        let classes = resolver(&node, EngineConfig::default());
        classes.get("outer");
        classes.get("inner");

        node.set_prop("outerClass", "b");
        classes.invalidate_property("outer");
        assert_eq!(classes.cached(), vec!["inner".to_string()]);
        assert_eq!(classes.get("outer"), "b");

        let before = classes.version();
        classes.invalidate();
        assert!(classes.cached().is_empty());
        assert_eq!(classes.version(), before + 1);
    }

    #[test]
    fn test_dead_node_resolves_empty() {
        let node = Node::new(NodeOptions::input("text").with_prop("outerClass", "a"));
        let classes = resolver(&node, EngineConfig::default());
        node.destroy();
        assert_eq!(classes.get("outer"), "");
    }

    #[test]
    fn test_class_prop_property() {
        assert_eq!(class_prop_property("labelClass"), Some("label"));
        assert_eq!(class_prop_property("_labelClass"), Some("label"));
        assert_eq!(class_prop_property("Class"), None);
        assert_eq!(class_prop_property("rootClasses"), None);
        assert_eq!(class_prop_property("label"), None);
    }
}
