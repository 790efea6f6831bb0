//! Message Projector - Splits the store into what the renderer shows.
//!
//! Two projections are kept in signals:
//! - `ui`: visible `ui` messages not flagged `showAsMessage`
//! - `available`: every other visible message
//!
//! The renderer-facing `messages` view is `available` minus validation
//! messages while validation is hidden. Hidden messages are never projected;
//! hidden `state` messages are routed to the state flags instead.

use indexmap::IndexMap;
use spark_signals::{signal, Signal};

use crate::types::{Message, MessageType};

/// Keyed message map in insertion order.
pub type MessageMap = IndexMap<String, Message>;

/// Where a message ended up after [`MessageProjector::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Ui,
    Available,
    /// Hidden state message; the caller updates the state flag.
    State,
    /// Hidden non-state message; not projected anywhere.
    Hidden,
}

/// Reactive message projections.
#[derive(Clone)]
pub struct MessageProjector {
    available: Signal<MessageMap>,
    ui: Signal<MessageMap>,
}

impl MessageProjector {
    /// Seed from the messages currently in the store.
    pub fn new<'a>(initial: impl IntoIterator<Item = &'a Message>) -> Self {
        let mut available = MessageMap::new();
        let mut ui = MessageMap::new();
        for message in initial {
            match route(message) {
                Routed::Ui => {
                    ui.insert(message.key.clone(), message.clone());
                }
                Routed::Available => {
                    available.insert(message.key.clone(), message.clone());
                }
                Routed::State | Routed::Hidden => {}
            }
        }
        Self {
            available: signal(available),
            ui: signal(ui),
        }
    }

    /// Handle `message-added` / `message-updated`.
    ///
    /// The key is dropped from both projections first, so a message that
    /// became hidden or changed type never lingers in the wrong one.
    pub fn apply(&self, message: &Message) -> Routed {
        let routed = route(message);
        let mut ui = self.ui.get();
        let mut available = self.available.get();
        ui.shift_remove(&message.key);
        available.shift_remove(&message.key);

        match routed {
            Routed::Ui => {
                ui.insert(message.key.clone(), message.clone());
            }
            Routed::Available => {
                available.insert(message.key.clone(), message.clone());
            }
            Routed::State | Routed::Hidden => {}
        }

        self.ui.set(ui);
        self.available.set(available);
        routed
    }

    /// Handle `message-removed`.
    pub fn remove(&self, key: &str) {
        let mut ui = self.ui.get();
        if ui.shift_remove(key).is_some() {
            self.ui.set(ui);
        }
        let mut available = self.available.get();
        if available.shift_remove(key).is_some() {
            self.available.set(available);
        }
    }

    /// Drop everything (context teardown).
    pub fn clear(&self) {
        self.ui.set(MessageMap::new());
        self.available.set(MessageMap::new());
    }

    pub fn ui(&self) -> MessageMap {
        self.ui.get()
    }

    pub fn available(&self) -> MessageMap {
        self.available.get()
    }

    /// Messages on display given the current validation visibility.
    pub fn visible(&self, validation_visible: bool) -> MessageMap {
        self.available
            .get()
            .into_iter()
            .filter(|(_, m)| m.message_type != MessageType::Validation || validation_visible)
            .collect()
    }
}

/// Decide which projection a message belongs to.
pub fn route(message: &Message) -> Routed {
    if message.message_type == MessageType::Ui && message.visible && !message.meta.show_as_message {
        Routed::Ui
    } else if message.visible {
        Routed::Available
    } else if message.message_type == MessageType::State {
        Routed::State
    } else {
        Routed::Hidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageMeta;

    fn validation(key: &str) -> Message {
        Message::new(key, MessageType::Validation).blocking(true)
    }

    #[test]
    fn test_route() {
        assert_eq!(route(&Message::new("loading", MessageType::Ui)), Routed::Ui);
        let shown = Message::new("note", MessageType::Ui).with_meta(MessageMeta {
            show_as_message: true,
            ..Default::default()
        });
        assert_eq!(route(&shown), Routed::Available);
        assert_eq!(route(&validation("rule_required")), Routed::Available);
        assert_eq!(route(&Message::state("blurred", true)), Routed::State);
        assert_eq!(route(&validation("x").visible(false)), Routed::Hidden);
    }

    #[test]
    fn test_seed_skips_hidden() {
        let messages = vec![
            Message::new("loading", MessageType::Ui),
            validation("rule_required"),
            Message::new("secret", MessageType::Error).visible(false),
        ];
        let projector = MessageProjector::new(&messages);

        assert_eq!(projector.ui().len(), 1);
        assert!(projector.available().contains_key("rule_required"));
        assert!(!projector.available().contains_key("secret"));
    }

    #[test]
    fn test_validation_filtered_until_visible() {
        let projector = MessageProjector::new(Vec::<Message>::new().iter());
        projector.apply(&validation("rule_required"));
        projector.apply(&Message::new("server", MessageType::Error));

        let hidden: Vec<String> = projector.visible(false).into_keys().collect();
        assert_eq!(hidden, vec!["server".to_string()]);
        assert_eq!(projector.visible(true).len(), 2);
    }

    #[test]
    fn test_update_to_hidden_leaves_projection() {
        let projector = MessageProjector::new(Vec::<Message>::new().iter());
        projector.apply(&Message::new("hint", MessageType::Ui));
        assert_eq!(projector.ui().len(), 1);

        let routed = projector.apply(&Message::new("hint", MessageType::Ui).visible(false));
        assert_eq!(routed, Routed::Hidden);
        assert!(projector.ui().is_empty());
        assert!(projector.available().is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let projector = MessageProjector::new(Vec::<Message>::new().iter());
        projector.apply(&Message::new("hint", MessageType::Ui));
        projector.apply(&validation("rule_required"));

        projector.remove("hint");
        assert!(projector.ui().is_empty());
        assert_eq!(projector.available().len(), 1);

        projector.clear();
        assert!(projector.available().is_empty());
    }
}
