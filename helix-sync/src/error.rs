//! Error types for the sync layer.

use crate::conflict::Conflict;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Subscribing to a topic failed.
    #[error("subscription to {topic} failed: {reason}")]
    Subscription { topic: String, reason: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Errors raised by conflict resolution.
///
/// These are the only exception-style signals of the conflict engine;
/// detection itself never fails.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The `Manual` strategy never invents a resolution.
    #[error("manual resolution required for entity {}", conflict.local.id)]
    ManualResolutionRequired { conflict: Box<Conflict> },

    /// Three-way merge was requested for a conflict with no common ancestor.
    #[error("three-way merge requires a common ancestor")]
    MissingAncestor,
}
