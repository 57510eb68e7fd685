//! Closed enumerations shared by the sync core and its hosts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The record collections kept in sync across devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Email,
    CalendarEvent,
    Task,
    Memo,
}

impl EntityType {
    /// Every synchronized collection, in subscription order.
    pub const ALL: [EntityType; 4] = [
        EntityType::Email,
        EntityType::CalendarEvent,
        EntityType::Task,
        EntityType::Memo,
    ];

    /// Wire tag, as used in change-log entries.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityType::Email => "email",
            EntityType::CalendarEvent => "calendar_event",
            EntityType::Task => "task",
            EntityType::Memo => "memo",
        }
    }

    /// Name of the backing collection in the hosted data layer.
    #[must_use]
    pub const fn collection(&self) -> &'static str {
        match self {
            EntityType::Email => "emails",
            EntityType::CalendarEvent => "calendar_events",
            EntityType::Task => "tasks",
            EntityType::Memo => "memos",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.collection() == s)
            .ok_or_else(|| crate::Error::UnknownEntityType(s.to_string()))
    }
}

/// The kind of device that authored a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePlatform {
    Web,
    Ios,
    Android,
    Desktop,
}

impl DevicePlatform {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DevicePlatform::Web => "web",
            DevicePlatform::Ios => "ios",
            DevicePlatform::Android => "android",
            DevicePlatform::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DevicePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DevicePlatform {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(DevicePlatform::Web),
            "ios" => Ok(DevicePlatform::Ios),
            "android" => Ok(DevicePlatform::Android),
            "desktop" => Ok(DevicePlatform::Desktop),
            other => Err(crate::Error::UnknownPlatform(other.to_string())),
        }
    }
}
