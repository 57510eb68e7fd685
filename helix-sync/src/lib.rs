//! Multi-device sync core for Helix.
//!
//! Keeps emails, calendar events, tasks and memos consistent across the
//! devices of one user over an unreliable realtime transport.
//!
//! # Architecture
//!
//! - **Conflict engine** ([`conflict`], [`resolution`]): pure functions that
//!   detect divergent versions of a record and merge them.
//! - **Tracker** ([`tracker`]): per-session history of detected conflicts
//!   and how they were resolved.
//! - **Client** ([`SyncClient`]): subscribes to the backend's feeds, turns
//!   inbound rows into deltas for the host, and publishes local edits,
//!   queueing them while offline.
//! - **Transport** ([`transport`]): the pub/sub seam, with an in-process
//!   implementation for tests and hosts without a network.
//!
//! # Example
//!
//! ```
//! use helix_sync::transport::memory::MemoryTransport;
//! use helix_sync::{SyncClient, SyncConfig};
//! use std::sync::Arc;
//!
//! let config = SyncConfig {
//!     app_version: "2.1.0".to_string(),
//!     ..Default::default()
//! };
//! let client = SyncClient::new(config, Arc::new(MemoryTransport::default()));
//! ```

mod client;
mod config;
pub mod conflict;
mod error;
pub mod resolution;
pub mod state;
pub mod tracker;
pub mod transport;

pub use client::{ConflictHandler, DeltaHandler, Delivery, SyncClient};
pub use config::SyncConfig;
pub use conflict::{
    detect_conflict, detect_field_conflict, find_conflicted_fields, happens_before,
    is_clock_concurrent, Conflict, ConflictSeverity, ConflictType,
};
pub use error::{ResolutionError, SyncError, SyncResult};
pub use resolution::{
    calculate_merge_stats, resolve_conflict, MergeStats, ResolutionStrategy, StrategyKind,
};
pub use state::{ConnectionState, Snapshot, SubscriptionState};
pub use tracker::{ConflictStatistics, ConflictTracker, ResolutionRecord, TrackedConflict};
pub use transport::{SyncTransport, TransportMessage};
