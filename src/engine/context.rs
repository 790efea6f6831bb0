//! View Context - The renderer-facing projection of a node.
//!
//! [`ViewContext::attach`] builds every engine cell from the node's current
//! state, subscribes to the node's events and hands a back-reference to the
//! node. From then on each event updates the cells it concerns and the
//! renderer reads plain getters that re-derive on every call.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──attach──> Booting ──created──> Active ──destroyed──> Destroyed
//! ```
//!
//! - Booting: cells seeded, handlers live, the dirty baseline not captured yet
//! - Active: the bridge has been reconciled with the node and a continuation
//!   waits for the node to settle before capturing the baseline
//! - Destroyed: subscriptions dropped, projections and class cache cleared;
//!   late events are ignored
//!
//! # Example
//!
//! ```ignore
//! let registry = ConfigRegistry::new(EngineConfig::default());
//! let node = Node::new(NodeOptions::input("email"));
//! let context = ViewContext::attach(&node, &registry)?;
//!
//! node.create();
//! node.tick();
//! node.input(json!("me@example.com"));
//!
//! assert!(context.state().dirty);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use spark_signals::{signal, Signal};
use tracing::{debug, trace};

use crate::config::{ConfigRegistry, TypeDefinition};
use crate::error::{EngineError, Result};
use crate::node::events::{settled_topic, unsettled_topic};
use crate::node::{topics, Event, Node, Payload, Receipt, WeakNode};
use crate::types::{
    flag_prop, DirtyBehavior, Message, MessageType, NodeKind, ValidationVisibility, Value,
};

use super::bridge::ValueBridge;
use super::classes::{class_prop_property, ClassResolver};
use super::fns::Fns;
use super::messages::{MessageMap, MessageProjector, Routed};
use super::state::{FormState, StateAggregator};
use super::visibility::{resolve, VisibilityInputs, VisibilityState};

/// Props every context mirrors.
const OBSERVED_PROPS: [&str; 12] = [
    "__root",
    "help",
    "label",
    "disabled",
    "options",
    "type",
    "attrs",
    "preserve",
    "preserveErrors",
    "id",
    "dirtyBehavior",
    "__slots",
];

/// Ledger counter of blocking messages.
pub const BLOCKING_COUNTER: &str = "blocking";
/// Ledger counter of error messages.
pub const ERRORS_COUNTER: &str = "errors";

/// Hidden state message that holds back the dirty check while present.
const VALIDATING: &str = "validating";

/// `<name>Icon` / `<name>-icon` props.
fn is_icon_prop(key: &str) -> bool {
    let Some(stem) = key.strip_suffix("-icon").or_else(|| key.strip_suffix("Icon")) else {
        return false;
    };
    !stem.is_empty() && stem.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
}

// =============================================================================
// Phase
// =============================================================================

/// Lifecycle phase of a [`ViewContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Booting,
    Active,
    Destroyed,
}

// =============================================================================
// Inner state
// =============================================================================

struct ContextInner {
    node: WeakNode,
    uid: String,
    registry: ConfigRegistry,
    type_name: String,
    definition: TypeDefinition,
    phase: Cell<Phase>,

    bridge: ValueBridge,
    projector: MessageProjector,
    state: StateAggregator,
    visibility: VisibilityState,
    classes: ClassResolver,

    /// Mirrored props.
    props: Signal<IndexMap<String, Value>>,
    /// Prop names being mirrored beyond the fixed set.
    extra_props: RefCell<Vec<String>>,
    items: Signal<Vec<String>>,
    did_mount: Signal<bool>,

    default_mode: ValidationVisibility,
    default_dirty: DirtyBehavior,
    has_ticked: Cell<bool>,
    baseline: RefCell<Option<Value>>,
    touch_pending: Cell<bool>,
    receipts: RefCell<Vec<Receipt>>,
}

impl ContextInner {
    fn is_live(&self) -> bool {
        self.phase.get() != Phase::Destroyed
    }

    fn observes(&self, key: &str) -> bool {
        OBSERVED_PROPS.contains(&key)
            || is_icon_prop(key)
            || self.definition.props.iter().any(|p| p == key)
            || self.extra_props.borrow().iter().any(|p| p == key)
    }

    fn mirror(&self, key: &str, value: Value) {
        let mut props = self.props.get();
        if props.get(key) == Some(&value) {
            return;
        }
        props.insert(key.to_string(), value);
        self.props.set(props);
    }

    fn prop(&self, key: &str) -> Option<Value> {
        self.props.get().get(key).cloned()
    }

    fn dirty_behavior(&self) -> DirtyBehavior {
        self.prop("dirtyBehavior")
            .filter(|v| !v.is_null())
            .map_or(self.default_dirty, |v| DirtyBehavior::from_value(&v))
    }

    // -------------------------------------------------------------------------
    // Visibility
    // -------------------------------------------------------------------------

    /// Pure read; the latch only moves in `refresh_visibility`.
    fn validation_visible(&self) -> bool {
        resolve(&VisibilityInputs {
            mode: self.visibility.mode(),
            submitted: self.state.submitted(),
            has_shown: self.visibility.has_shown(),
            settled: self.state.settled(),
            dirty: self.state.dirty(),
            blurred: self.state.blurred(),
        })
    }

    /// Re-resolve after an input to visibility changed and close the latch
    /// if validation now shows. Every handler that writes an input calls this.
    fn refresh_visibility(&self) {
        if self.visibility.latch(self.validation_visible()) {
            trace!(node = %self.uid, "validation shown, latch closed");
        }
    }

    // -------------------------------------------------------------------------
    // Messages
    // -------------------------------------------------------------------------

    fn on_message(&self, message: &Message) {
        if self.projector.apply(message) == Routed::State {
            self.state.set_flag(&message.key, message.is_truthy());
        }
        self.refresh_visibility();
    }

    fn on_message_removed(&self, node: &Node, message: &Message) {
        self.projector.remove(&message.key);
        self.state.remove_flag(&message.key);
        if message.key == VALIDATING && self.touch_pending.replace(false) {
            self.touch(node);
        }
        self.refresh_visibility();
    }

    // -------------------------------------------------------------------------
    // Dirty tracking
    // -------------------------------------------------------------------------

    /// Record `dirty` from the raw value vs the baseline. Sticky unless the
    /// node compares.
    fn touch(&self, node: &Node) {
        let compare = self.dirty_behavior() == DirtyBehavior::Compare;
        if self.state.dirty() && !compare {
            return;
        }
        let dirty = match &*self.baseline.borrow() {
            Some(baseline) => *baseline != self.bridge.raw(),
            None => true,
        };
        if !dirty && !compare {
            return;
        }
        trace!(node = %self.uid, dirty, "touch");
        node.store().set(Message::state("dirty", dirty));
    }

    fn on_commit(&self, node: &Node, payload: &Value) {
        let compare = self.dirty_behavior() == DirtyBehavior::Compare;
        if (!self.state.dirty() || compare) && node.is_created() && self.has_ticked.get() {
            let validating = node.store().get(VALIDATING).is_some_and(|m| m.is_truthy());
            if validating {
                self.touch_pending.set(true);
            } else {
                self.touch(node);
            }
        }

        if node.kind() == NodeKind::Input
            && self.state.errors()
            && !flag_prop(self.prop("preserveErrors").as_ref())
        {
            node.store()
                .filter(|m| !(m.message_type == MessageType::Error && m.meta.auto_clear));
        }

        if node.kind() == NodeKind::List && node.sync() {
            self.refresh_items(node);
        }

        self.state.set_empty_from(payload);
    }

    fn refresh_items(&self, node: &Node) {
        let items: Vec<String> = node.children().iter().map(|c| c.uid().to_string()).collect();
        if self.items.get() != items {
            self.items.set(items);
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    fn on_created(self: &Rc<Self>, node: &Node) {
        if self.phase.get() != Phase::Booting {
            return;
        }
        if self.bridge.reconcile(&node.raw_value(), &node.value()) {
            trace!(node = %self.uid, "bridge reconciled on create");
        }
        self.refresh_items(node);
        self.phase.set(Phase::Active);
        debug!(node = %self.uid, "context active");

        let settled = node.settled();
        let weak = Rc::downgrade(self);
        node.scheduler().spawn(async move {
            settled.await;
            let Some(inner) = weak.upgrade() else { return };
            if !inner.is_live() {
                return;
            }
            let Some(node) = inner.node.upgrade().filter(|n| !n.is_destroyed()) else {
                return;
            };
            debug!(node = %inner.uid, "dirty baseline captured");
            *inner.baseline.borrow_mut() = Some(node.value());
        });
    }

    fn teardown(&self, node: &Node) {
        self.phase.set(Phase::Destroyed);
        self.registry.unregister(&self.uid);
        for receipt in self.receipts.borrow_mut().drain(..) {
            node.off(receipt);
        }
        self.projector.clear();
        self.state.clear_flags();
        self.classes.invalidate();
        self.touch_pending.set(false);
        node.set_context(None);
        debug!(node = %self.uid, "context destroyed");
    }
}

// =============================================================================
// View Context
// =============================================================================

/// Derived, read-mostly view of one node. Cheap to clone.
#[derive(Clone)]
pub struct ViewContext {
    inner: Rc<ContextInner>,
}

impl std::fmt::Debug for ViewContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewContext")
            .field("node", &self.inner.uid)
            .field("type", &self.inner.type_name)
            .field("phase", &self.inner.phase.get())
            .finish()
    }
}

impl ViewContext {
    /// Attach a context to `node`.
    ///
    /// Fails when the node has no `type` prop, the type is not defined in the
    /// registry's configuration, or the node is already destroyed.
    pub fn attach(node: &Node, registry: &ConfigRegistry) -> Result<Self> {
        let uid = node.uid().to_string();
        if node.is_destroyed() {
            return Err(EngineError::Destroyed { uid });
        }
        let type_name = node
            .prop("type")
            .and_then(|v| v.as_str().map(String::from))
            .ok_or_else(|| EngineError::MissingType { uid: uid.clone() })?;
        let definition = registry
            .definition(&type_name)
            .ok_or_else(|| EngineError::UnknownType {
                name: type_name.clone(),
                uid: uid.clone(),
            })?;

        let config = registry.config();
        if node.root_classes().is_none() {
            if let Some(root_classes) = registry.root_classes() {
                node.set_root_classes(Some(root_classes));
            }
        }

        let blocking = node.ledger().count(BLOCKING_COUNTER, |m| m.blocking);
        let errors = node
            .ledger()
            .count(ERRORS_COUNTER, |m| m.message_type == MessageType::Error);

        let default_mode = config
            .validation_visibility
            .unwrap_or_else(|| ValidationVisibility::default_for(&type_name));
        let mode = node
            .prop("validationVisibility")
            .and_then(|v| ValidationVisibility::from_value(&v))
            .unwrap_or(default_mode);

        let messages = node.store().messages();
        let value = node.value();
        let state = StateAggregator::new(
            blocking,
            errors,
            node.prop("parsedRules").as_ref(),
            node.is_settled(),
            &value,
        );
        for message in &messages {
            if !message.visible && message.message_type == MessageType::State {
                state.set_flag(&message.key, message.is_truthy());
            }
        }

        let inner = Rc::new(ContextInner {
            node: node.downgrade(),
            uid: uid.clone(),
            registry: registry.clone(),
            type_name,
            definition,
            phase: Cell::new(Phase::Uninitialized),
            bridge: ValueBridge::new(node.raw_value(), value),
            projector: MessageProjector::new(&messages),
            state,
            visibility: VisibilityState::new(mode),
            classes: ClassResolver::new(node.downgrade(), registry.clone()),
            props: signal(IndexMap::new()),
            extra_props: RefCell::new(Vec::new()),
            items: signal(Vec::new()),
            did_mount: signal(false),
            default_mode,
            default_dirty: config.dirty_behavior,
            has_ticked: Cell::new(false),
            baseline: RefCell::new(None),
            touch_pending: Cell::new(false),
            receipts: RefCell::new(Vec::new()),
        });

        let observed: IndexMap<String, Value> = node
            .props()
            .into_iter()
            .filter(|(key, _)| inner.observes(key))
            .collect();
        inner.props.set(observed);
        inner.refresh_items(node);
        inner.phase.set(Phase::Booting);
        inner.refresh_visibility();

        let context = Self { inner };
        context.subscribe_all(node);

        let weak = Rc::downgrade(&context.inner);
        node.scheduler().next_tick(move || {
            if let Some(inner) = weak.upgrade() {
                inner.has_ticked.set(true);
            }
        });

        registry.register(node);
        node.set_context(Some(context.clone()));
        debug!(node = %uid, kind = ?node.kind(), "context attached");
        node.emit(topics::CONTEXT, Payload::None);

        if node.is_created() {
            context.inner.on_created(node);
        }
        Ok(context)
    }

    /// Subscribe a handler that only runs while the context and node live.
    fn subscribe(
        &self,
        node: &Node,
        topic: impl Into<String>,
        handler: impl Fn(&Rc<ContextInner>, &Node, &Event) + 'static,
    ) {
        let weak: Weak<ContextInner> = Rc::downgrade(&self.inner);
        let receipt = node.on(topic, move |event| {
            let Some(inner) = weak.upgrade() else { return };
            if !inner.is_live() {
                return;
            }
            let Some(node) = inner.node.upgrade() else { return };
            handler(&inner, &node, event);
        });
        self.inner.receipts.borrow_mut().push(receipt);
    }

    fn subscribe_all(&self, node: &Node) {
        // Lifecycle
        self.subscribe(node, topics::CREATED, |inner, node, _| inner.on_created(node));
        self.subscribe(node, topics::MOUNTED, |inner, _, _| {
            inner.did_mount.set(true);
        });
        self.subscribe(node, topics::SETTLED, |inner, _, event| {
            if let Some(settled) = event.payload.as_bool() {
                inner.state.set_settled(settled);
                inner.refresh_visibility();
            }
        });
        self.subscribe(node, topics::DESTROYED, |inner, node, _| inner.teardown(node));

        // Values
        self.subscribe(node, topics::INPUT, |inner, _, event| {
            if let Some(value) = event.payload.as_value() {
                inner.bridge.on_input(value);
            }
        });
        self.subscribe(node, topics::COMMIT_RAW, |inner, node, event| {
            if let Some(value) = event.payload.as_value() {
                let committed = inner.bridge.on_commit_raw(value);
                node.emit(topics::MODEL_UPDATED, committed);
            }
        });
        self.subscribe(node, topics::COMMIT, |inner, node, event| {
            if let Some(value) = event.payload.as_value() {
                inner.on_commit(node, value);
            }
        });

        // Messages
        for topic in [topics::MESSAGE_ADDED, topics::MESSAGE_UPDATED] {
            self.subscribe(node, topic, |inner, _, event| {
                if let Some(message) = event.payload.as_message() {
                    inner.on_message(message);
                }
            });
        }
        self.subscribe(node, topics::MESSAGE_REMOVED, |inner, node, event| {
            if let Some(message) = event.payload.as_message() {
                inner.on_message_removed(node, message);
            }
        });

        // Ledger crossings
        self.subscribe(node, settled_topic(BLOCKING_COUNTER), |inner, _, _| {
            inner.state.set_valid(true)
        });
        self.subscribe(node, unsettled_topic(BLOCKING_COUNTER), |inner, _, _| {
            inner.state.set_valid(false)
        });
        self.subscribe(node, settled_topic(ERRORS_COUNTER), |inner, _, _| {
            inner.state.set_errors(false)
        });
        self.subscribe(node, unsettled_topic(ERRORS_COUNTER), |inner, _, _| {
            inner.state.set_errors(true)
        });

        // Props
        self.subscribe(node, "prop:validationVisibility", |inner, _, event| {
            let mode = event
                .payload
                .as_value()
                .and_then(ValidationVisibility::from_value)
                .unwrap_or(inner.default_mode);
            inner.visibility.set_mode(mode);
            inner.refresh_visibility();
        });
        self.subscribe(node, "prop:parsedRules", |inner, _, event| {
            inner.state.set_rules(event.payload.as_value());
        });
        self.subscribe(node, "prop:rootClasses", |inner, _, _| inner.classes.invalidate());
        self.subscribe(node, topics::PROP, |inner, node, event| {
            let Payload::Prop { key, value } = &event.payload else { return };
            // A root class function may read any prop
            if node.root_classes().is_some() {
                inner.classes.invalidate();
            } else if let Some(property) = class_prop_property(key) {
                inner.classes.invalidate_property(property);
            }
            if inner.observes(key) {
                inner.mirror(key, value.clone());
            }
        });
        self.subscribe(node, topics::ADDED_PROPS, |inner, node, event| {
            let Some(keys) = event.payload.as_keys() else { return };
            for key in keys {
                if !inner.observes(key) {
                    inner.extra_props.borrow_mut().push(key.clone());
                }
                inner.mirror(key, node.prop(key).unwrap_or(Value::Null));
            }
        });
    }

    // -------------------------------------------------------------------------
    // Lifecycle & identity
    // -------------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.inner.phase.get()
    }

    pub fn node(&self) -> Option<Node> {
        self.inner.node.upgrade()
    }

    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn family(&self) -> Option<&str> {
        self.inner.definition.family.as_deref()
    }

    pub fn definition(&self) -> &TypeDefinition {
        &self.inner.definition
    }

    pub fn did_mount(&self) -> bool {
        self.inner.did_mount.get()
    }

    /// Dirty baseline, once the node has settled after creation.
    pub fn baseline(&self) -> Option<Value> {
        self.inner.baseline.borrow().clone()
    }

    /// Whether the first scheduler tick since attach has run.
    pub fn has_ticked(&self) -> bool {
        self.inner.has_ticked.get()
    }

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    /// Committed value.
    pub fn value(&self) -> Value {
        self.inner.bridge.value()
    }

    /// Raw value (`_value`).
    pub fn raw_value(&self) -> Value {
        self.inner.bridge.raw()
    }

    /// Forward a value written by an external binding. Values equal to the
    /// last committed value this context produced are dropped.
    pub fn push_external(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        let Some(node) = self.node().filter(|n| !n.is_destroyed()) else {
            return false;
        };
        if !self.inner.is_live() {
            return false;
        }
        if !self.inner.bridge.should_forward(&value) {
            trace!(node = %self.inner.uid, "external write matches last output, suppressed");
            return false;
        }
        node.input(value);
        true
    }

    /// Subscribe an external binding to every commit.
    pub fn on_model_update(&self, listener: impl Fn(&Value) + 'static) -> Option<Receipt> {
        let node = self.node()?;
        Some(node.on(topics::MODEL_UPDATED, move |event| {
            if let Some(value) = event.payload.as_value() {
                listener(value);
            }
        }))
    }

    // -------------------------------------------------------------------------
    // Props
    // -------------------------------------------------------------------------

    /// Mirrored prop value.
    pub fn prop(&self, key: &str) -> Option<Value> {
        self.inner.prop(key)
    }

    /// Every mirrored prop.
    pub fn props(&self) -> IndexMap<String, Value> {
        self.inner.props.get()
    }

    pub fn attrs(&self) -> Value {
        self.prop("attrs")
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    pub fn disabled(&self) -> bool {
        flag_prop(self.prop("disabled").as_ref())
    }

    pub fn help(&self) -> Option<String> {
        self.prop("help")
            .and_then(|v| v.as_str().map(String::from))
            .filter(|s| !s.is_empty())
    }

    pub fn id(&self) -> String {
        self.prop("id")
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default()
    }

    pub fn label(&self) -> Option<String> {
        self.prop("label").and_then(|v| v.as_str().map(String::from))
    }

    pub fn options(&self) -> Option<Value> {
        self.prop("options").filter(|v| !v.is_null())
    }

    pub fn slots(&self) -> Option<Value> {
        self.prop("__slots").filter(|v| !v.is_null())
    }

    pub fn dirty_behavior(&self) -> DirtyBehavior {
        self.inner.dirty_behavior()
    }

    /// Child uids in order.
    pub fn items(&self) -> Vec<String> {
        self.inner.items.get()
    }

    pub fn fns(&self) -> Fns {
        Fns
    }

    pub fn classes(&self) -> &ClassResolver {
        &self.inner.classes
    }

    // -------------------------------------------------------------------------
    // Messages & state
    // -------------------------------------------------------------------------

    pub fn validation_visible(&self) -> bool {
        self.inner.validation_visible()
    }

    pub fn validation_visibility(&self) -> ValidationVisibility {
        self.inner.visibility.mode()
    }

    /// Visible messages, validation messages only while validation shows.
    pub fn messages(&self) -> MessageMap {
        self.inner.projector.visible(self.validation_visible())
    }

    pub fn ui(&self) -> MessageMap {
        self.inner.projector.ui()
    }

    /// `help-<id>` and `<id>-<key>` for each visible message.
    pub fn described_by(&self) -> Option<String> {
        let id = self.id();
        let mut ids = Vec::new();
        if self.help().is_some() {
            ids.push(format!("help-{id}"));
        }
        ids.extend(self.messages().keys().map(|key| format!("{id}-{key}")));
        (!ids.is_empty()).then(|| ids.join(" "))
    }

    pub fn state(&self) -> FormState {
        let visible = self.validation_visible();
        self.inner.state.snapshot(&self.value(), visible)
    }

    /// Any message-driven flag (`blurred`, `validating`, ...).
    pub fn state_flag(&self, key: &str) -> bool {
        self.inner.state.flag(key)
    }

    pub fn handlers(&self) -> Handlers {
        Handlers {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Event handlers for the rendering layer.
#[derive(Clone)]
pub struct Handlers {
    inner: Weak<ContextInner>,
}

impl Handlers {
    fn live(&self) -> Option<(Rc<ContextInner>, Node)> {
        let inner = self.inner.upgrade().filter(|i| i.is_live())?;
        let node = inner.node.upgrade().filter(|n| !n.is_destroyed())?;
        Some((inner, node))
    }

    /// The field lost focus.
    pub fn blur(&self) {
        if let Some((_, node)) = self.live() {
            node.store().set(Message::state("blurred", true));
        }
    }

    /// Re-check the dirty flag against the baseline.
    pub fn touch(&self) {
        if let Some((inner, node)) = self.live() {
            inner.touch(&node);
        }
    }

    /// A DOM input event carrying a new value.
    pub fn dom_input(&self, value: impl Into<Value>) {
        if let Some((_, node)) = self.live() {
            let value = value.into();
            node.input(value.clone());
            node.emit(topics::DOM_INPUT, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::classes::ClassList;
    use crate::node::NodeOptions;
    use serde_json::json;

    fn registry() -> ConfigRegistry {
        ConfigRegistry::new(EngineConfig::default())
    }

    fn attached(options: NodeOptions) -> (Node, ViewContext) {
        let node = Node::new(options);
        let context = ViewContext::attach(&node, &registry()).unwrap();
        (node, context)
    }

    #[test]
    fn test_is_icon_prop() {
        assert!(is_icon_prop("prefixIcon"));
        assert!(is_icon_prop("suffix-icon"));
        assert!(is_icon_prop("select-Icon"));
        assert!(!is_icon_prop("Icon"));
        assert!(!is_icon_prop("icon"));
        assert!(!is_icon_prop("prefix1Icon"));
    }

    #[test]
    fn test_attach_errors() {
        let registry = registry();

        let untyped = Node::new(NodeOptions::default());
        assert!(matches!(
            ViewContext::attach(&untyped, &registry),
            Err(EngineError::MissingType { .. })
        ));

        let unknown = Node::new(NodeOptions::input("hologram"));
        let err = ViewContext::attach(&unknown, &registry).unwrap_err();
        assert!(matches!(err, EngineError::UnknownType { ref name, .. } if name == "hologram"));
        assert_eq!(registry.active_count(), 0);

        let dead = Node::new(NodeOptions::input("text"));
        dead.destroy();
        assert!(matches!(
            ViewContext::attach(&dead, &registry),
            Err(EngineError::Destroyed { .. })
        ));
    }

    #[test]
    fn test_attach_sets_back_reference_and_phase() {
        let registry = registry();
        let node = Node::new(NodeOptions::input("checkbox"));
        let announced = Rc::new(Cell::new(false));
        let announced_clone = announced.clone();
        node.on(topics::CONTEXT, move |_| announced_clone.set(true));

        let context = ViewContext::attach(&node, &registry).unwrap();

        assert!(announced.get());
        assert_eq!(context.phase(), Phase::Booting);
        assert!(node.context().is_some());
        assert!(registry.is_registered(node.uid()));
        assert_eq!(context.family(), Some("box"));
        assert_eq!(context.validation_visibility(), ValidationVisibility::Dirty);

        node.create();
        assert_eq!(context.phase(), Phase::Active);
    }

    #[test]
    fn test_visibility_mode_sources() {
        let registry = ConfigRegistry::new(
            EngineConfig::default().with_validation_visibility(ValidationVisibility::Live),
        );
        let node = Node::new(NodeOptions::input("checkbox"));
        let context = ViewContext::attach(&node, &registry).unwrap();
        assert_eq!(context.validation_visibility(), ValidationVisibility::Live);

        node.set_prop("validationVisibility", "blur");
        assert_eq!(context.validation_visibility(), ValidationVisibility::Blur);

        node.set_prop("validationVisibility", Value::Null);
        assert_eq!(context.validation_visibility(), ValidationVisibility::Live);
    }

    #[test]
    fn test_mounted_sets_did_mount() {
        let (node, context) = attached(NodeOptions::input("text"));
        node.create();
        assert!(!context.did_mount());

        node.mount();
        assert!(context.did_mount());
    }

    #[test]
    fn test_attach_on_created_node_activates() {
        let node = Node::new(NodeOptions::input("text").with_value(json!("pre")));
        node.create();
        let context = ViewContext::attach(&node, &registry()).unwrap();

        assert_eq!(context.phase(), Phase::Active);
        node.tick();
        assert_eq!(context.baseline(), Some(json!("pre")));
    }

    #[test]
    fn test_observed_props_mirror() {
        let (node, context) = attached(
            NodeOptions::input("select")
                .with_prop("label", "Country")
                .with_prop("placeholder", "Pick one")
                .with_prop("unrelated", 1),
        );

        assert_eq!(context.label().as_deref(), Some("Country"));
        assert_eq!(context.prop("placeholder"), Some(json!("Pick one")));
        assert_eq!(context.prop("unrelated"), None);
        assert_eq!(context.options(), None);
        assert_eq!(context.slots(), None);

        node.set_prop("options", json!(["a", "b"]));
        node.set_prop("__slots", json!({ "label": 1 }));
        assert_eq!(context.options(), Some(json!(["a", "b"])));
        assert_eq!(context.slots(), Some(json!({ "label": 1 })));

        node.set_prop("help", "Where you live");
        node.set_prop("prefixIcon", "globe");
        assert_eq!(context.help().as_deref(), Some("Where you live"));
        assert_eq!(context.prop("prefixIcon"), Some(json!("globe")));

        node.add_props(&["unrelated", "suffix"]);
        assert_eq!(context.prop("unrelated"), Some(json!(1)));
        assert_eq!(context.prop("suffix"), Some(Value::Null));
        node.set_prop("suffix", "!");
        assert_eq!(context.prop("suffix"), Some(json!("!")));
    }

    #[test]
    fn test_disabled_and_attrs() {
        let (node, context) = attached(NodeOptions::input("text"));
        assert!(!context.disabled());
        assert_eq!(context.attrs(), json!({}));

        node.set_prop("disabled", "");
        node.set_prop("attrs", json!({ "autocomplete": "off" }));
        assert!(context.disabled());
        assert_eq!(context.attrs(), json!({ "autocomplete": "off" }));
    }

    #[test]
    fn test_described_by() {
        let (node, context) = attached(
            NodeOptions::input("text")
                .with_prop("id", "email")
                .with_prop("validationVisibility", "live"),
        );
        assert_eq!(context.described_by(), None);

        node.set_prop("help", "We never share it");
        node.store().set(Message::new("rule_email", MessageType::Validation));
        assert_eq!(
            context.described_by().as_deref(),
            Some("help-email email-rule_email")
        );
    }

    #[test]
    fn test_reads_leave_latch_alone() {
        let (_node, context) = attached(NodeOptions::input("text"));
        for _ in 0..3 {
            assert!(!context.state().validation_visible);
            assert!(context.messages().is_empty());
        }
        assert!(!context.inner.visibility.has_shown());

        context.handlers().blur();
        assert!(context.inner.visibility.has_shown());
        assert!(context.validation_visible());
    }

    #[test]
    fn test_blur_handler_sets_flag() {
        let (_node, context) = attached(NodeOptions::input("text"));
        assert!(!context.state().blurred);

        context.handlers().blur();
        assert!(context.state().blurred);
        assert!(context.state_flag("blurred"));
    }

    #[test]
    fn test_dom_input_emits_after_commit() {
        let (node, context) = attached(NodeOptions::input("text"));
        let log = Rc::new(RefCell::new(Vec::new()));
        for topic in [topics::COMMIT, topics::DOM_INPUT, topics::MODEL_UPDATED] {
            let log = log.clone();
            node.on(topic, move |e| log.borrow_mut().push(e.name.clone()));
        }

        context.handlers().dom_input("typed");

        assert_eq!(*log.borrow(), vec!["modelUpdated", "commit", "dom-input-event"]);
        assert_eq!(context.value(), json!("typed"));
    }

    #[test]
    fn test_model_updated_on_every_commit() {
        let (node, context) = attached(NodeOptions::input("text"));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        context.on_model_update(move |v| seen_clone.borrow_mut().push(v.clone()));

        node.input(json!("a"));
        node.input(json!("a"));

        assert_eq!(*seen.borrow(), vec![json!("a"), json!("a")]);
    }

    #[test]
    fn test_touch_waits_for_validating() {
        let (node, context) = attached(NodeOptions::input("text").with_value(json!("")));
        node.create();
        node.tick();

        node.store().set(Message::state(VALIDATING, true));
        node.input(json!("x"));
        assert!(!context.state().dirty);

        node.store().remove(VALIDATING);
        assert!(context.state().dirty);
    }

    #[test]
    fn test_commit_before_tick_is_not_dirty() {
        let (node, context) = attached(NodeOptions::input("text").with_value(json!("")));
        node.create();
        node.input(json!("synthetic"));

        assert!(!context.has_ticked());
        assert!(!context.state().dirty);
    }

    #[test]
    fn test_list_items_sync_on_commit() {
        let list = Node::new(NodeOptions::list("list").with_sync(true));
        let context = ViewContext::attach(&list, &registry()).unwrap();
        assert!(context.items().is_empty());

        let first = Node::new(NodeOptions::input("text"));
        let second = Node::new(NodeOptions::input("text"));
        list.add_child(&first);
        list.add_child(&second);
        list.input(json!(["a", "b"]));

        assert_eq!(context.items(), vec![first.uid().to_string(), second.uid().to_string()]);
    }

    #[test]
    fn test_root_classes_change_invalidates_cache() {
        let (node, context) = attached(NodeOptions::input("text").with_prop("outerClass", "a"));
        assert_eq!(context.classes().get("outer"), "a");

        node.set_root_classes(Some(Rc::new(|property: &str, _: &Node| {
            ClassList::parse(&format!("root-{property}"))
        })));
        assert!(context.classes().cached().is_empty());
        assert_eq!(context.classes().get("outer"), "root-outer a");

        node.set_prop("outerClass", "b");
        assert_eq!(context.classes().get("outer"), "root-outer b");
    }

    #[test]
    fn test_root_classes_follow_props_they_read() {
        let (node, context) = attached(NodeOptions::input("text").with_prop("label", "Name"));
        node.set_root_classes(Some(Rc::new(|property: &str, node: &Node| {
            if node.prop("label").is_some_and(|v| !v.is_null()) {
                ClassList::parse(&format!("{property}-labelled"))
            } else {
                ClassList::parse(property)
            }
        })));
        assert_eq!(context.classes().get("outer"), "outer-labelled");

        node.set_prop("label", Value::Null);
        assert_eq!(context.classes().get("outer"), "outer");
    }

    #[test]
    fn test_registry_class_change_reaches_context() {
        let registry = registry();
        let node = Node::new(NodeOptions::input("text"));
        let context = ViewContext::attach(&node, &registry).unwrap();
        assert_eq!(context.classes().get("label"), "");

        registry.set_classes("label", Some(json!("field-label")));
        assert_eq!(context.classes().get("label"), "field-label");
    }

    #[test]
    fn test_destroy_tears_down() {
        let registry = registry();
        let node = Node::new(NodeOptions::input("text").with_prop("validationVisibility", "live"));
        let context = ViewContext::attach(&node, &registry).unwrap();
        node.store().set(Message::new("rule_required", MessageType::Validation).blocking(true));
        assert_eq!(context.messages().len(), 1);

        node.destroy();

        assert_eq!(context.phase(), Phase::Destroyed);
        assert!(node.context().is_none());
        assert!(!registry.is_registered(node.uid()));
        assert!(context.messages().is_empty());
        assert!(!context.push_external("late"));
        context.handlers().blur();
        assert!(!context.state_flag("blurred"));
    }
}
