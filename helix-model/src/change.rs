//! Change records exchanged between the sync core, its host and the backend.

use crate::entity::content_hash;
use crate::value::FieldMap;
use chrono::{DateTime, Utc};
use helix_crdt::VectorClock;
use helix_types::{ConflictId, DeviceId, DevicePlatform, EntityId, EntityType, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of write a change represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

impl ChangeOperation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChangeOperation::Insert => "insert",
            ChangeOperation::Update => "update",
            ChangeOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An edit made by the user on this device, handed to the core by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalChange {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub operation: ChangeOperation,
    pub data: FieldMap,
    pub timestamp: DateTime<Utc>,
}

impl LocalChange {
    pub fn new(
        entity_type: EntityType,
        entity_id: EntityId,
        operation: ChangeOperation,
        data: FieldMap,
    ) -> Self {
        Self {
            entity_type,
            entity_id,
            operation,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn insert(entity_type: EntityType, entity_id: EntityId, data: FieldMap) -> Self {
        Self::new(entity_type, entity_id, ChangeOperation::Insert, data)
    }

    pub fn update(entity_type: EntityType, entity_id: EntityId, data: FieldMap) -> Self {
        Self::new(entity_type, entity_id, ChangeOperation::Update, data)
    }

    pub fn delete(entity_type: EntityType, entity_id: EntityId) -> Self {
        Self::new(entity_type, entity_id, ChangeOperation::Delete, FieldMap::new())
    }
}

/// An inbound remote change, reshaped for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaChange {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub operation: String,
    pub changed_fields: FieldMap,
    pub vector_clock: VectorClock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DevicePlatform>,
    pub timestamp: DateTime<Utc>,
}

/// One row of the append-only change log.
///
/// Written by this device for every transmitted local change; rows written
/// by the backend with `conflict_detected` set point at a stored conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub operation: ChangeOperation,
    pub changed_fields: FieldMap,
    pub vector_clock: VectorClock,
    pub content_hash: String,
    pub device_id: DeviceId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub conflict_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_id: Option<ConflictId>,
}

impl ChangeLogEntry {
    /// Builds the log row for a local change stamped with `clock`.
    ///
    /// `record` is the entity's full data after the change (empty for a
    /// delete); the row's content hash is computed over it, so it matches
    /// the hash of the stored entity even when `change` is a partial update.
    pub fn from_local(
        change: &LocalChange,
        record: &FieldMap,
        clock: VectorClock,
        device_id: DeviceId,
    ) -> Self {
        Self {
            entity_type: change.entity_type,
            entity_id: change.entity_id,
            operation: change.operation,
            changed_fields: change.data.clone(),
            vector_clock: clock,
            content_hash: content_hash(record),
            device_id,
            created_at: Utc::now(),
            conflict_detected: false,
            conflict_id: None,
        }
    }
}

/// Liveness state advertised in presence records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

/// A device's presence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub device_id: DeviceId,
    pub platform: DevicePlatform,
    pub status: PresenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,
    pub app_version: String,
    pub last_seen: DateTime<Utc>,
}
