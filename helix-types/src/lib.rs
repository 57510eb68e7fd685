//! Core type definitions for Helix sync.
//!
//! This crate defines the small, dependency-light types every other crate
//! in the workspace agrees on:
//! - Entity, conflict, device and user identifiers
//! - The synchronized entity collections ([`EntityType`])
//! - The device platforms that can author a write ([`DevicePlatform`])
//!
//! Record payloads and merge logic live in `helix-model` and `helix-sync`.

mod ids;
mod kinds;

pub use ids::{ConflictId, DeviceId, EntityId, UserId};
pub use kinds::{DevicePlatform, EntityType};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("unknown device platform: {0}")]
    UnknownPlatform(String),

    #[error("invalid device id: {0:?}")]
    InvalidDeviceId(String),
}
