//! Node - The framework-agnostic form node the engine observes.
//!
//! A node owns:
//! - a committed `value` and a raw (in-progress) value
//! - `props`, each change announced as `prop:<key>` and `prop`
//! - ordered `children`
//! - an [`EventBus`] (`on` / `off` / `emit`)
//! - a message [`Store`] and a [`Ledger`] of counters over it
//! - a [`Scheduler`] handle for next-tick work
//!
//! `Node` is a cheap `Rc` handle; clones refer to the same node. Everything
//! is single-threaded.
//!
//! # Example
//!
//! ```ignore
//! use formstate_sync::node::{Node, NodeOptions};
//! use serde_json::json;
//!
//! let node = Node::new(NodeOptions::input("text").with_value(json!("")));
//! node.create();
//! node.input(json!("hello"));
//! assert_eq!(node.value(), json!("hello"));
//! ```

pub mod events;
pub mod ledger;
pub mod scheduler;
pub mod store;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use futures::channel::oneshot;
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::engine::classes::RootClassFn;
use crate::engine::ViewContext;
use crate::types::{Message, NodeKind, Value};

pub use events::{Event, EventBus, Payload, Receipt, topics};
pub use ledger::Ledger;
pub use scheduler::Scheduler;
pub use store::Store;

// =============================================================================
// Uid allocation
// =============================================================================

thread_local! {
    /// Counter for generating unique node ids.
    static UID_COUNTER: Cell<u64> = const { Cell::new(0) };
}

fn next_uid() -> u64 {
    UID_COUNTER.with(|counter| {
        let id = counter.get();
        counter.set(id + 1);
        id
    })
}

// =============================================================================
// Options
// =============================================================================

/// Construction options for a [`Node`].
#[derive(Clone, Default)]
pub struct NodeOptions {
    pub name: Option<String>,
    pub kind: NodeKind,
    pub value: Value,
    pub props: IndexMap<String, Value>,
    /// List nodes only: keep `items` in step with children on every commit.
    pub sync: bool,
    /// Share a scheduler between nodes. A fresh one is created when `None`.
    pub scheduler: Option<Scheduler>,
}

impl NodeOptions {
    /// Leaf input of the given type (`text`, `checkbox`, ...).
    pub fn input(input_type: &str) -> Self {
        Self::default().with_prop("type", input_type)
    }

    /// Object-valued parent node.
    pub fn group(input_type: &str) -> Self {
        Self {
            kind: NodeKind::Group,
            value: Value::Object(Default::default()),
            ..Self::input(input_type)
        }
    }

    /// Array-valued parent node.
    pub fn list(input_type: &str) -> Self {
        Self {
            kind: NodeKind::List,
            value: Value::Array(Vec::new()),
            ..Self::input(input_type)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

// =============================================================================
// Node
// =============================================================================

pub(crate) struct NodeInner {
    uid: String,
    name: String,
    kind: NodeKind,
    sync: bool,
    value: RefCell<Value>,
    raw: RefCell<Value>,
    props: RefCell<IndexMap<String, Value>>,
    root_classes: RefCell<Option<RootClassFn>>,
    children: RefCell<Vec<Node>>,
    parent: RefCell<Option<WeakNode>>,
    bus: EventBus,
    messages: RefCell<IndexMap<String, Message>>,
    counters: RefCell<IndexMap<String, ledger::Counter>>,
    scheduler: Scheduler,
    created: Cell<bool>,
    destroyed: Cell<bool>,
    pending: Cell<usize>,
    settle_waiters: RefCell<Vec<oneshot::Sender<()>>>,
    context: RefCell<Option<ViewContext>>,
}

/// Shared handle to a form node.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

/// Non-owning node handle.
#[derive(Clone, Default)]
pub struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(|inner| Node { inner })
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("uid", &self.inner.uid)
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .finish()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Node {
    pub fn new(options: NodeOptions) -> Self {
        let n = next_uid();
        let mut props = options.props;
        props
            .entry("id".to_string())
            .or_insert_with(|| Value::String(format!("input_{n}")));

        let name = options.name.unwrap_or_else(|| {
            let input_type = props.get("type").and_then(Value::as_str).unwrap_or("node");
            format!("{input_type}_{n}")
        });

        let inner = NodeInner {
            uid: format!("n{n}"),
            name,
            kind: options.kind,
            sync: options.sync,
            value: RefCell::new(options.value.clone()),
            raw: RefCell::new(options.value),
            props: RefCell::new(props),
            root_classes: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(None),
            bus: EventBus::new(),
            messages: RefCell::new(IndexMap::new()),
            counters: RefCell::new(IndexMap::new()),
            scheduler: options.scheduler.unwrap_or_default(),
            created: Cell::new(false),
            destroyed: Cell::new(false),
            pending: Cell::new(0),
            settle_waiters: RefCell::new(Vec::new()),
            context: RefCell::new(None),
        };

        Self {
            inner: Rc::new(inner),
        }
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.inner))
    }

    // -------------------------------------------------------------------------
    // Identity & data
    // -------------------------------------------------------------------------

    pub fn uid(&self) -> &str {
        &self.inner.uid
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> NodeKind {
        self.inner.kind
    }

    /// Whether a list node keeps its items synced with its children.
    pub fn sync(&self) -> bool {
        self.inner.sync
    }

    /// Committed value.
    pub fn value(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Latest input, committed or not.
    pub fn raw_value(&self) -> Value {
        self.inner.raw.borrow().clone()
    }

    pub fn prop(&self, key: &str) -> Option<Value> {
        self.inner.props.borrow().get(key).cloned()
    }

    /// Snapshot of all props.
    pub fn props(&self) -> IndexMap<String, Value> {
        self.inner.props.borrow().clone()
    }

    pub fn store(&self) -> Store<'_> {
        Store { node: self }
    }

    pub fn ledger(&self) -> Ledger<'_> {
        Ledger { node: self }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    pub fn on(&self, topic: impl Into<String>, handler: impl Fn(&Event) + 'static) -> Receipt {
        self.inner.bus.on(topic, handler)
    }

    pub fn off(&self, receipt: Receipt) {
        self.inner.bus.off(receipt);
    }

    pub fn emit(&self, topic: impl Into<String>, payload: impl Into<Payload>) {
        self.inner.bus.emit(Event {
            name: topic.into(),
            payload: payload.into(),
            origin: self.inner.uid.clone(),
        });
    }

    pub fn listener_count(&self) -> usize {
        self.inner.bus.listener_count()
    }

    // -------------------------------------------------------------------------
    // Props
    // -------------------------------------------------------------------------

    /// Set a prop. Emits `prop:<key>` and `prop` only when the value changes.
    pub fn set_prop(&self, key: &str, value: impl Into<Value>) {
        if self.inner.destroyed.get() {
            return;
        }
        let value = value.into();
        let previous = self
            .inner
            .props
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        if previous.as_ref() == Some(&value) {
            return;
        }

        trace!(node = %self.inner.uid, key, "prop changed");
        self.emit(events::prop_topic(key), value.clone());
        self.emit(
            topics::PROP,
            Payload::Prop {
                key: key.to_string(),
                value,
            },
        );
    }

    /// Declare new props. Missing keys start as `null`; announces `added-props`.
    pub fn add_props(&self, keys: &[&str]) {
        if self.inner.destroyed.get() {
            return;
        }
        {
            let mut props = self.inner.props.borrow_mut();
            for key in keys {
                props.entry((*key).to_string()).or_insert(Value::Null);
            }
        }
        let keys = keys.iter().map(|k| (*k).to_string()).collect();
        self.emit(topics::ADDED_PROPS, Payload::Keys(keys));
    }

    /// Replace the root class function. Announces `prop:rootClasses`.
    pub fn set_root_classes(&self, root_classes: Option<RootClassFn>) {
        if self.inner.destroyed.get() {
            return;
        }
        *self.inner.root_classes.borrow_mut() = root_classes;
        self.emit(events::prop_topic("rootClasses"), Payload::None);
    }

    pub fn root_classes(&self) -> Option<RootClassFn> {
        self.inner.root_classes.borrow().clone()
    }

    // -------------------------------------------------------------------------
    // Tree
    // -------------------------------------------------------------------------

    pub fn add_child(&self, child: &Node) {
        *child.inner.parent.borrow_mut() = Some(self.downgrade());
        self.inner.children.borrow_mut().push(child.clone());
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().as_ref().and_then(WeakNode::upgrade)
    }

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    /// Record user input and commit it.
    ///
    /// Emits `input`, then `commitRaw` and `commit`.
    pub fn input(&self, value: impl Into<Value>) {
        if self.inner.destroyed.get() {
            trace!(node = %self.inner.uid, "input on destroyed node ignored");
            return;
        }
        let value = value.into();
        *self.inner.raw.borrow_mut() = value.clone();
        self.emit(topics::INPUT, value.clone());
        self.commit(value);
    }

    fn commit(&self, value: Value) {
        *self.inner.value.borrow_mut() = value.clone();
        self.emit(topics::COMMIT_RAW, value.clone());
        self.emit(topics::COMMIT, value);
    }

    /// Mark this node and every descendant as submitted.
    pub fn submit(&self) {
        self.store().set(Message::state("submitted", true));
        for child in self.children() {
            child.submit();
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Finish construction. Emits `created` once.
    pub fn create(&self) {
        if self.inner.created.get() || self.inner.destroyed.get() {
            return;
        }
        self.inner.created.set(true);
        debug!(node = %self.inner.uid, "created");
        self.emit(topics::CREATED, Payload::None);
    }

    pub fn mount(&self) {
        self.emit(topics::MOUNTED, Payload::None);
    }

    pub fn is_created(&self) -> bool {
        self.inner.created.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Tear down the node and its children. Emits `destroyed`, then drops
    /// every subscription once the pending events have been delivered.
    pub fn destroy(&self) {
        if self.inner.destroyed.get() {
            return;
        }
        for child in self.children() {
            child.destroy();
        }
        debug!(node = %self.inner.uid, "destroyed");
        self.emit(topics::DESTROYED, Payload::None);
        self.inner.destroyed.set(true);
        self.inner.settle_waiters.borrow_mut().clear();
        self.inner.bus.close();
    }

    // -------------------------------------------------------------------------
    // Settlement
    // -------------------------------------------------------------------------

    /// Start a piece of pending async work (validation, child loading).
    pub fn disturb(&self) {
        let pending = self.inner.pending.get();
        self.inner.pending.set(pending + 1);
        if pending == 0 {
            self.emit(topics::SETTLED, false);
        }
    }

    /// Finish a piece of pending work. The last one settles the node.
    pub fn calm(&self) {
        let pending = self.inner.pending.get();
        if pending == 0 {
            return;
        }
        self.inner.pending.set(pending - 1);
        if pending == 1 {
            self.emit(topics::SETTLED, true);
            let waiters: Vec<_> = self.inner.settle_waiters.borrow_mut().drain(..).collect();
            for waiter in waiters {
                let _ = waiter.send(());
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.inner.pending.get() == 0
    }

    /// Resolves once the node has no pending work. Also resolves if the node
    /// is destroyed first, so continuations must check liveness.
    pub fn settled(&self) -> Settled {
        let (tx, rx) = oneshot::channel();
        if self.is_settled() || self.inner.destroyed.get() {
            let _ = tx.send(());
        } else {
            self.inner.settle_waiters.borrow_mut().push(tx);
        }
        Settled { rx }
    }

    /// Run queued next-tick work.
    pub fn tick(&self) {
        self.inner.scheduler.tick();
    }

    // -------------------------------------------------------------------------
    // Context back-reference
    // -------------------------------------------------------------------------

    /// The view context attached to this node, if any.
    pub fn context(&self) -> Option<ViewContext> {
        self.inner.context.borrow().clone()
    }

    pub(crate) fn set_context(&self, context: Option<ViewContext>) {
        *self.inner.context.borrow_mut() = context;
    }
}

// =============================================================================
// Settled future
// =============================================================================

/// Future returned by [`Node::settled`].
pub struct Settled {
    rx: oneshot::Receiver<()>,
}

impl Future for Settled {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.rx).poll(cx).map(|_| ())
    }
}

// =============================================================================
// Tests
// =============================================================================
