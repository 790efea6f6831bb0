//! Event Bus - Per-node publish/subscribe channel.
//!
//! Every node owns one bus. Handlers subscribe to an exact topic name and get
//! a [`Receipt`] back for unsubscribing.
//!
//! Delivery is FIFO per bus: an event emitted while another event is being
//! dispatched is queued and delivered after the current one finishes. This
//! keeps message-store notifications in emission order even when a handler
//! mutates the store.
//!
//! # Topics
//!
//! | Topic | Payload |
//! |---|---|
//! | `created`, `mounted`, `destroyed`, `context` | `None` |
//! | `settled` | `Bool` |
//! | `input`, `commitRaw`, `commit`, `modelUpdated`, `dom-input-event` | `Value` |
//! | `prop:<key>` | `Value` (`None` for `prop:rootClasses`) |
//! | `prop` | `Prop` |
//! | `added-props` | `Keys` |
//! | `message-added`, `message-updated`, `message-removed` | `Message` |
//! | `settled:<name>`, `unsettled:<name>` | `Count` |
//!
//! # Example
//!
//! ```ignore
//! let receipt = node.on(topics::COMMIT, |event| {
//!     println!("committed {:?}", event.payload.as_value());
//! });
//! node.off(receipt);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::types::{Message, Value};

// =============================================================================
// Topics
// =============================================================================

/// Topic names emitted by nodes.
pub mod topics {
    pub const CREATED: &str = "created";
    pub const MOUNTED: &str = "mounted";
    pub const DESTROYED: &str = "destroyed";
    pub const CONTEXT: &str = "context";
    pub const SETTLED: &str = "settled";
    pub const INPUT: &str = "input";
    pub const COMMIT_RAW: &str = "commitRaw";
    pub const COMMIT: &str = "commit";
    pub const MODEL_UPDATED: &str = "modelUpdated";
    pub const DOM_INPUT: &str = "dom-input-event";
    pub const PROP: &str = "prop";
    pub const ADDED_PROPS: &str = "added-props";
    pub const MESSAGE_ADDED: &str = "message-added";
    pub const MESSAGE_UPDATED: &str = "message-updated";
    pub const MESSAGE_REMOVED: &str = "message-removed";
}

/// `prop:<key>`
pub fn prop_topic(key: &str) -> String {
    format!("prop:{key}")
}

/// `settled:<counter>`
pub fn settled_topic(counter: &str) -> String {
    format!("settled:{counter}")
}

/// `unsettled:<counter>`
pub fn unsettled_topic(counter: &str) -> String {
    format!("unsettled:{counter}")
}

// =============================================================================
// Event
// =============================================================================

/// Data carried by an event. The shape is fixed per topic (see module docs).
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Payload {
    #[default]
    None,
    Bool(bool),
    Value(Value),
    Message(Message),
    Prop { key: String, value: Value },
    Keys(Vec<String>),
    Count(usize),
}

impl Payload {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(v) => Some(v),
            Payload::Prop { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Payload::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Payload::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_keys(&self) -> Option<&[String]> {
        match self {
            Payload::Keys(keys) => Some(keys),
            _ => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Value(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Bool(value)
    }
}

impl From<Message> for Payload {
    fn from(message: Message) -> Self {
        Payload::Message(message)
    }
}

/// A delivered event.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: String,
    pub payload: Payload,
    /// Uid of the node that emitted the event.
    pub origin: String,
}

/// Event handler callback (Rc so dispatch can run it without holding a borrow).
pub type EventHandler = Rc<dyn Fn(&Event)>;

/// Subscription handle returned by [`EventBus::on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Receipt(u64);

// =============================================================================
// Event Bus
// =============================================================================

struct Listener {
    receipt: Receipt,
    topic: String,
    handler: EventHandler,
}

/// FIFO publish/subscribe channel.
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<Vec<Listener>>,
    queue: RefCell<VecDeque<Event>>,
    dispatching: Cell<bool>,
    closing: Cell<bool>,
    closed: Cell<bool>,
    next_receipt: Cell<u64>,
}

/// Resets the dispatching flag even if a handler panics.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic.
    pub fn on(&self, topic: impl Into<String>, handler: impl Fn(&Event) + 'static) -> Receipt {
        let receipt = Receipt(self.next_receipt.get());
        self.next_receipt.set(receipt.0 + 1);
        if self.closed.get() {
            return receipt;
        }
        self.listeners.borrow_mut().push(Listener {
            receipt,
            topic: topic.into(),
            handler: Rc::new(handler),
        });
        receipt
    }

    /// Unsubscribe. Unknown receipts are ignored.
    pub fn off(&self, receipt: Receipt) {
        self.listeners.borrow_mut().retain(|l| l.receipt != receipt);
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Queue an event and deliver everything queued, in order.
    ///
    /// Re-entrant calls (from inside a handler) only enqueue; the outermost
    /// call drains the queue.
    pub fn emit(&self, event: Event) {
        if self.closed.get() {
            return;
        }
        self.queue.borrow_mut().push_back(event);
        if self.dispatching.get() {
            return;
        }

        self.dispatching.set(true);
        let _guard = DispatchGuard(&self.dispatching);

        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else { break };

            let handlers: Vec<(Receipt, EventHandler)> = self
                .listeners
                .borrow()
                .iter()
                .filter(|l| l.topic == event.name)
                .map(|l| (l.receipt, l.handler.clone()))
                .collect();

            for (receipt, handler) in handlers {
                // A previous handler may have unsubscribed this one
                if self.is_subscribed(receipt) {
                    handler(&event);
                }
            }
        }

        if self.closing.get() {
            self.shutdown();
        }
    }

    /// Stop accepting events and drop all subscriptions once the current
    /// queue is drained.
    pub fn close(&self) {
        if self.dispatching.get() {
            self.closing.set(true);
        } else {
            self.shutdown();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn shutdown(&self) {
        self.closed.set(true);
        self.closing.set(false);
        self.queue.borrow_mut().clear();
        self.listeners.borrow_mut().clear();
    }

    fn is_subscribed(&self, receipt: Receipt) -> bool {
        self.listeners.borrow().iter().any(|l| l.receipt == receipt)
    }
}

// =============================================================================
// Tests
// =============================================================================
