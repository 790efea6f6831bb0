//! Value Bridge - Raw vs committed value tracking.
//!
//! The bridge keeps two cells:
//! - `raw`: every input as it arrives, before commit
//! - `committed`: the value after `commitRaw`
//!
//! It also remembers the last value it produced downstream, so an external
//! binding echoing that value back is not forwarded into the node again.

use std::cell::RefCell;

use spark_signals::{signal, Signal};

use crate::types::Value;

#[derive(Clone)]
pub struct ValueBridge {
    raw: Signal<Value>,
    committed: Signal<Value>,
    last_produced: RefCell<Option<Value>>,
}

impl ValueBridge {
    /// Seed both cells from the node.
    pub fn new(raw: Value, committed: Value) -> Self {
        Self {
            raw: signal(raw),
            committed: signal(committed),
            last_produced: RefCell::new(None),
        }
    }

    pub fn raw(&self) -> Value {
        self.raw.get()
    }

    pub fn value(&self) -> Value {
        self.committed.get()
    }

    /// `input` event.
    pub fn on_input(&self, payload: &Value) {
        self.raw.set(payload.clone());
    }

    /// `commitRaw` event. Returns the committed value to announce as
    /// `modelUpdated`; every commit is announced, changed or not.
    pub fn on_commit_raw(&self, payload: &Value) -> Value {
        self.raw.set(payload.clone());
        self.committed.set(payload.clone());
        *self.last_produced.borrow_mut() = Some(payload.clone());
        payload.clone()
    }

    /// Bring the cells in line with the node's authoritative values.
    /// Returns true if anything changed.
    pub fn reconcile(&self, raw: &Value, committed: &Value) -> bool {
        let mut changed = false;
        if self.raw.get() != *raw {
            self.raw.set(raw.clone());
            changed = true;
        }
        if self.committed.get() != *committed {
            self.committed.set(committed.clone());
            changed = true;
        }
        changed
    }

    /// Whether an external write should reach the node.
    pub fn should_forward(&self, external: &Value) -> bool {
        self.last_produced.borrow().as_ref() != Some(external)
    }

    pub fn last_produced(&self) -> Option<Value> {
        self.last_produced.borrow().clone()
    }
}
