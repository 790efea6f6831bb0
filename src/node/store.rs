//! Message Store - Keyed messages owned by a node.
//!
//! All mutations go through [`Store`] so that every change:
//! 1. updates the ledger counters first,
//! 2. emits `message-added` / `message-updated` / `message-removed`,
//! 3. emits any `settled:<name>` / `unsettled:<name>` crossings.
//!
//! Setting a message identical to the stored one is a no-op.

use tracing::trace;

use super::events::topics;
use super::ledger;
use super::Node;
use crate::types::Message;

/// Borrowed view over a node's message store.
pub struct Store<'a> {
    pub(super) node: &'a Node,
}

impl Store<'_> {
    /// Insert or replace a message by key.
    pub fn set(&self, message: Message) {
        let inner = &self.node.inner;
        if inner.destroyed.get() {
            return;
        }

        let previous = inner
            .messages
            .borrow_mut()
            .insert(message.key.clone(), message.clone());

        let topic = match &previous {
            None => topics::MESSAGE_ADDED,
            Some(prev) if *prev == message => return,
            Some(_) => topics::MESSAGE_UPDATED,
        };

        trace!(node = %inner.uid, key = %message.key, topic, "store set");
        let transitions = ledger::track(inner, previous.as_ref(), Some(&message));
        self.node.emit(topic, message);
        ledger::announce(self.node, transitions);
    }

    /// Remove a message by key, returning it if it was present.
    pub fn remove(&self, key: &str) -> Option<Message> {
        let inner = &self.node.inner;
        if inner.destroyed.get() {
            return None;
        }

        let removed = inner.messages.borrow_mut().shift_remove(key)?;
        trace!(node = %inner.uid, key, "store remove");
        let transitions = ledger::track(inner, Some(&removed), None);
        self.node.emit(topics::MESSAGE_REMOVED, removed.clone());
        ledger::announce(self.node, transitions);
        Some(removed)
    }

    /// Keep only the messages for which `keep` returns true.
    pub fn filter(&self, keep: impl Fn(&Message) -> bool) {
        let doomed: Vec<String> = self
            .node
            .inner
            .messages
            .borrow()
            .values()
            .filter(|m| !keep(m))
            .map(|m| m.key.clone())
            .collect();

        for key in doomed {
            self.remove(&key);
        }
    }

    /// Set a batch of messages and remove every existing message matched by
    /// `clear` that is not part of the batch.
    pub fn apply(&self, messages: Vec<Message>, clear: impl Fn(&Message) -> bool) {
        let incoming: Vec<String> = messages.iter().map(|m| m.key.clone()).collect();
        for message in messages {
            self.set(message);
        }
        self.filter(|m| incoming.contains(&m.key) || !clear(m));
    }

    pub fn get(&self, key: &str) -> Option<Message> {
        self.node.inner.messages.borrow().get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.node.inner.messages.borrow().contains_key(key)
    }

    /// Snapshot of all messages in insertion order.
    pub fn messages(&self) -> Vec<Message> {
        self.node.inner.messages.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.node.inner.messages.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
