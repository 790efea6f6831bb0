//! Ledger - Named counters over a node's message store.
//!
//! A counter tracks how many stored messages satisfy its predicate. When a
//! count crosses zero the node emits exactly one event for the crossing:
//! - `unsettled:<name>` when it goes from 0 to a positive count
//! - `settled:<name>` when it drops back to 0
//!
//! Adding a second matching message while the count is already positive
//! changes the count but emits nothing.

use std::rc::Rc;

use tracing::trace;

use super::events::{settled_topic, unsettled_topic, Payload};
use super::{Node, NodeInner};
use crate::types::Message;

/// Counter predicate.
pub type CounterPredicate = Rc<dyn Fn(&Message) -> bool>;

pub(super) struct Counter {
    predicate: CounterPredicate,
    count: usize,
}

/// A zero crossing produced by a store mutation.
pub(super) struct Transition {
    name: String,
    count: usize,
}

/// Borrowed view over a node's counters.
pub struct Ledger<'a> {
    pub(super) node: &'a Node,
}

impl Ledger<'_> {
    /// Start counting messages that match `predicate`.
    ///
    /// The initial count reflects messages already in the store and does not
    /// emit a transition. Registering an existing name keeps the original
    /// counter. Returns the current count.
    pub fn count(&self, name: &str, predicate: impl Fn(&Message) -> bool + 'static) -> usize {
        let inner = &self.node.inner;
        if let Some(counter) = inner.counters.borrow().get(name) {
            return counter.count;
        }

        let count = inner.messages.borrow().values().filter(|&m| predicate(m)).count();
        inner.counters.borrow_mut().insert(
            name.to_string(),
            Counter {
                predicate: Rc::new(predicate),
                count,
            },
        );
        count
    }

    /// Current count, 0 for unknown counters.
    pub fn value(&self, name: &str) -> usize {
        self.node
            .inner
            .counters
            .borrow()
            .get(name)
            .map_or(0, |c| c.count)
    }
}

/// Update every counter for a message going from `before` to `after`.
///
/// Returns the zero crossings; the caller announces them after the message
/// event so listeners see the store change first.
pub(super) fn track(
    inner: &NodeInner,
    before: Option<&Message>,
    after: Option<&Message>,
) -> Vec<Transition> {
    let mut transitions = Vec::new();
    let mut counters = inner.counters.borrow_mut();

    for (name, counter) in counters.iter_mut() {
        let was = before.is_some_and(|m| (counter.predicate)(m));
        let is = after.is_some_and(|m| (counter.predicate)(m));

        match (was, is) {
            (false, true) => {
                counter.count += 1;
                if counter.count == 1 {
                    transitions.push(Transition {
                        name: name.clone(),
                        count: 1,
                    });
                }
            }
            (true, false) => {
                counter.count = counter.count.saturating_sub(1);
                if counter.count == 0 {
                    transitions.push(Transition {
                        name: name.clone(),
                        count: 0,
                    });
                }
            }
            _ => {}
        }
    }

    transitions
}

/// Emit `settled:<name>` / `unsettled:<name>` for each crossing.
pub(super) fn announce(node: &Node, transitions: Vec<Transition>) {
    for Transition { name, count } in transitions {
        let topic = if count == 0 {
            settled_topic(&name)
        } else {
            unsettled_topic(&name)
        };
        trace!(node = %node.uid(), %topic, "ledger crossing");
        node.emit(topic, Payload::Count(count));
    }
}
