//! Per-session table of vector clocks.
//!
//! The manager owns one clock per device it has seen write. The local
//! device advances its own entry with [`VectorClockManager::increment_clock`]
//! on every local write and folds remote knowledge in with
//! [`VectorClockManager::observe`]; it never decrements anything.

use crate::VectorClock;
use helix_types::DeviceId;
use std::collections::HashMap;

/// Tracks the current vector clock of each known device.
#[derive(Debug, Clone, Default)]
pub struct VectorClockManager {
    clocks: HashMap<DeviceId, VectorClock>,
}

impl VectorClockManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments `device`'s own counter in its clock and returns the
    /// resulting full clock.
    ///
    /// Called exactly once per local write, before transmission.
    pub fn increment_clock(&mut self, device: &DeviceId) -> VectorClock {
        let clock = self.clocks.entry(device.clone()).or_default();
        clock.increment(device);
        clock.clone()
    }

    /// Pointwise maximum of two clocks over the union of their devices.
    #[must_use]
    pub fn merge_clock(a: &VectorClock, b: &VectorClock) -> VectorClock {
        a.merged(b)
    }

    /// Returns the manager's view of `device`'s clock, or an empty clock.
    #[must_use]
    pub fn get_clock(&self, device: &DeviceId) -> VectorClock {
        self.clocks.get(device).cloned().unwrap_or_default()
    }

    /// Folds an accepted remote clock into `device`'s knowledge without
    /// advancing `device`'s own counter. Returns the merged clock.
    pub fn observe(&mut self, device: &DeviceId, remote: &VectorClock) -> VectorClock {
        let clock = self.clocks.entry(device.clone()).or_default();
        clock.merge(remote);
        clock.clone()
    }

    /// Number of devices with a clock in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }
}
