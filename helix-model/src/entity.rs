use crate::value::{encode_str, FieldMap, FieldValue};
use chrono::{DateTime, Utc};
use helix_crdt::VectorClock;
use helix_types::{DevicePlatform, EntityId, EntityType, UserId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sync bookkeeping carried alongside every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMeta {
    pub vector_clock: VectorClock,
    pub last_modified_at: DateTime<Utc>,
    pub last_modified_by: UserId,
    pub last_modified_device: DevicePlatform,
    /// Version this write was based on, if the host tracks versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_version: Option<String>,
    #[serde(default)]
    pub has_conflict: bool,
}

impl SyncMeta {
    /// Metadata for a write made now by `user` on `device`, with an empty clock.
    pub fn new(user: UserId, device: DevicePlatform) -> Self {
        Self {
            vector_clock: VectorClock::new(),
            last_modified_at: Utc::now(),
            last_modified_by: user,
            last_modified_device: device,
            parent_version: None,
            has_conflict: false,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: VectorClock) -> Self {
        self.vector_clock = clock;
        self
    }

    #[must_use]
    pub fn with_parent_version(mut self, version: impl Into<String>) -> Self {
        self.parent_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified_at = at;
        self
    }
}

/// The atomic unit of synchronization.
///
/// `data` is only reachable through methods that keep `content_hash` in
/// step with it, so two entities with the same hash hold the same fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncableEntity {
    pub id: EntityId,
    pub entity_type: EntityType,
    data: FieldMap,
    pub sync_meta: SyncMeta,
    content_hash: String,
}

impl SyncableEntity {
    pub fn new(id: EntityId, entity_type: EntityType, data: FieldMap, sync_meta: SyncMeta) -> Self {
        let content_hash = content_hash(&data);
        Self {
            id,
            entity_type,
            data,
            sync_meta,
            content_hash,
        }
    }

    #[must_use]
    pub fn data(&self) -> &FieldMap {
        &self.data
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.data.get(field)
    }

    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Replaces the payload and recomputes the content hash.
    pub fn set_data(&mut self, data: FieldMap) {
        self.content_hash = content_hash(&data);
        self.data = data;
    }

    /// Sets one field and recomputes the content hash.
    pub fn set_field(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.data.insert(field.into(), value.into());
        self.content_hash = content_hash(&self.data);
    }

    /// Same record with a different payload.
    #[must_use]
    pub fn with_data(&self, data: FieldMap) -> Self {
        let mut next = self.clone();
        next.set_data(data);
        next
    }

    /// Consumes the entity, returning its payload.
    #[must_use]
    pub fn into_data(self) -> FieldMap {
        self.data
    }

    /// Recomputes the hash after deserializing from an untrusted source.
    /// Returns true if the stored hash was stale.
    pub fn rehash(&mut self) -> bool {
        let fresh = content_hash(&self.data);
        let stale = fresh != self.content_hash;
        self.content_hash = fresh;
        stale
    }
}

/// Lowercase hex SHA-256 over the canonical encoding of `data`.
#[must_use]
pub fn content_hash(data: &FieldMap) -> String {
    let mut buf = Vec::with_capacity(64 * data.len());
    for (key, value) in data {
        encode_str(key, &mut buf);
        value.encode_canonical(&mut buf);
    }
    let mut hasher = Sha256::new();
    hasher.update(&buf);
    hex::encode(hasher.finalize())
}
