//! # formstate-sync
//!
//! Reactive form-state synchronization engine.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for fine-grained reactivity.
//!
//! ## Architecture
//!
//! A framework-agnostic form [`Node`] holds values, props, children and a
//! message store. The engine attaches a [`ViewContext`] to a node, listens to
//! its events and keeps a set of reactive cells in step. A rendering layer
//! reads the context and never writes to it.
//!
//! ```text
//! Node (store, ledger, events) → engine handlers → signals → ViewContext
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core types (Message, NodeKind, ValidationVisibility, ...)
//! - [`node`] - The node collaborator: events, store, ledger, scheduler
//! - [`engine`] - Visibility, messages, state, classes, value bridge, context
//! - [`config`] - Engine configuration and the config registry
//! - [`error`] - Error types

pub mod config;
pub mod engine;
pub mod error;
pub mod node;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::{ConfigRegistry, EngineConfig, TypeDefinition};

pub use engine::{
    ClassList, FormState, Fns, Handlers, Phase, RootClassFn, ViewContext,
};

pub use error::{EngineError, Result};

pub use node::{topics, Event, Node, NodeOptions, Payload, Receipt, Scheduler, WeakNode};
