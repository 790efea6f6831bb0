//! Sync Engine - Derived view state over a form node.
//!
//! The engine is split into small pieces, each owning its reactive cells:
//! - Visibility: when validation messages show
//! - Messages: `ui` and visible-message projections
//! - State: composite flags (`valid`, `dirty`, `complete`, ...)
//! - Classes: lazy, cached class strings per region
//! - Bridge: raw vs committed value and the feedback gate
//! - Context: wires the pieces to a node's events
//!
//! # Architecture
//!
//! ```text
//! Node events ──> handlers ──> Signals ──> ViewContext getters ──> renderer
//! ```
//!
//! Handlers are the only writers. The renderer only reads.

pub mod bridge;
pub mod classes;
pub mod context;
pub mod fns;
pub mod messages;
pub mod state;
pub mod visibility;

pub use bridge::ValueBridge;
pub use classes::{merge, ClassList, ClassResolver, RootClassFn};
pub use context::{Handlers, Phase, ViewContext};
pub use fns::{empty, Fns};
pub use messages::{MessageMap, MessageProjector};
pub use state::{FormState, StateAggregator};
pub use visibility::{resolve, VisibilityInputs, VisibilityState};
