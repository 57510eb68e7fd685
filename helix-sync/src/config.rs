//! Session configuration supplied by the host.

use crate::error::{SyncError, SyncResult};
use helix_types::{DeviceId, DevicePlatform, EntityType, UserId};
use serde::{Deserialize, Serialize};

/// Configuration for a [`SyncClient`](crate::SyncClient) session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Stable identifier of this device for the session.
    pub device_id: DeviceId,
    /// Signed-in user.
    pub user_id: UserId,
    /// Platform advertised in presence records and entity metadata.
    pub platform: DevicePlatform,
    /// Application version advertised in presence records.
    pub app_version: String,
    /// What the user is currently looking at, if the host tracks it.
    pub current_context: Option<String>,
    /// Collections to subscribe to.
    pub tracked_types: Vec<EntityType>,
    /// Drop inbound rows whose clock happens-before what we already know.
    pub drop_stale_updates: bool,
    /// Flush the offline queue as soon as `initialize` succeeds.
    pub drain_on_connect: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            device_id: DeviceId::generate(),
            user_id: UserId::new("anonymous"),
            platform: DevicePlatform::Desktop,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            current_context: None,
            tracked_types: EntityType::ALL.to_vec(),
            drop_stale_updates: true,
            drain_on_connect: true,
        }
    }
}

impl SyncConfig {
    /// Parses a host-provided JSON document; missing keys take defaults.
    pub fn from_json_str(json: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device_id.as_str().trim().is_empty() {
            return Err(SyncError::Config("device_id must not be empty".into()));
        }
        if self.tracked_types.is_empty() {
            return Err(SyncError::Config("tracked_types must not be empty".into()));
        }
        Ok(())
    }
}
