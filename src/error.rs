//! Error types for the synchronization engine.
//!
//! Only configuration problems are errors. Validation failures and server
//! errors are messages in the node's store and never surface here.

use thiserror::Error;

/// Errors raised while building or configuring a view context.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The node has no `type` prop, so no definition can be resolved.
    #[error("node {uid} has no `type` prop to resolve a type definition from")]
    MissingType { uid: String },

    /// The node's `type` prop names a type the configuration does not define.
    #[error("no type definition registered for `{name}` (node {uid})")]
    UnknownType { name: String, uid: String },

    /// The node was destroyed before the context could attach.
    #[error("node {uid} is already destroyed")]
    Destroyed { uid: String },

    /// Engine configuration could not be parsed.
    #[error("invalid engine configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
