//! Vector Clock for causality tracking.
//!
//! A vector clock tracks the logical time across every device that has
//! written a record, enabling determination of causality (happens-before
//! relationships) between two versions of that record.
//!
//! Use cases:
//! - Detecting concurrent modifications of the same record
//! - Dropping remote updates this device has already incorporated
//! - Stamping outgoing change-log entries

use helix_types::DeviceId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Causality relationship between two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    /// First clock happened before second.
    Before,
    /// First clock happened after second.
    After,
    /// Clocks are concurrent (neither happened before the other).
    Concurrent,
    /// Clocks describe the same observed history.
    Equal,
}

/// A Vector Clock keyed by device id.
///
/// Entries are kept sorted so the serialized form is stable, which matters
/// because clocks travel inside change-log entries and conflict records.
/// A missing entry and an explicit zero are equivalent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    clocks: BTreeMap<DeviceId, u64>,
}

impl VectorClock {
    /// Creates a new empty vector clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clocks: BTreeMap::new(),
        }
    }

    /// Creates a clock holding a single device at `time`.
    #[must_use]
    pub fn single(device: DeviceId, time: u64) -> Self {
        let mut clocks = BTreeMap::new();
        clocks.insert(device, time);
        Self { clocks }
    }

    /// Returns the logical time for a device (0 if not present).
    #[must_use]
    pub fn get(&self, device: &DeviceId) -> u64 {
        self.clocks.get(device).copied().unwrap_or(0)
    }

    /// Returns all devices and their times, ordered by device id.
    pub fn devices(&self) -> impl Iterator<Item = (&DeviceId, &u64)> {
        self.clocks.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// Increments the clock for a device and returns the new time.
    ///
    /// Only the owning device may call this for its own entry.
    pub fn increment(&mut self, device: &DeviceId) -> u64 {
        let entry = self.clocks.entry(device.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Raises a device's entry to `time`. Lower values are ignored.
    pub fn update(&mut self, device: &DeviceId, time: u64) {
        let entry = self.clocks.entry(device.clone()).or_insert(0);
        if time > *entry {
            *entry = time;
        }
    }

    /// Merges another vector clock into this one (pointwise max).
    ///
    /// This operation is commutative, associative, and idempotent.
    pub fn merge(&mut self, other: &Self) {
        for (device, &time) in &other.clocks {
            self.update(device, time);
        }
    }

    /// Creates a new clock that is the merge of this and another.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Compares this clock with another to determine causal ordering.
    #[must_use]
    pub fn compare(&self, other: &Self) -> CausalOrder {
        let mut self_dominates = true;
        let mut other_dominates = true;

        let devices: BTreeSet<&DeviceId> =
            self.clocks.keys().chain(other.clocks.keys()).collect();

        for device in devices {
            let mine = self.get(device);
            let theirs = other.get(device);
            if mine < theirs {
                self_dominates = false;
            }
            if theirs < mine {
                other_dominates = false;
            }
        }

        match (self_dominates, other_dominates) {
            (true, true) => CausalOrder::Equal,
            (true, false) => CausalOrder::After,
            (false, true) => CausalOrder::Before,
            (false, false) => CausalOrder::Concurrent,
        }
    }

    /// Every entry ≤ the other's, with at least one strictly less.
    #[must_use]
    pub fn happens_before(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Before
    }

    /// Returns true if this clock is causally after the other.
    #[must_use]
    pub fn happens_after(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::After
    }

    /// Neither clock dominates. Equal clocks are not concurrent.
    #[must_use]
    pub fn is_concurrent(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Concurrent
    }

    /// Returns true if this clock is >= the other for every device.
    #[must_use]
    pub fn dominates(&self, other: &Self) -> bool {
        matches!(self.compare(other), CausalOrder::After | CausalOrder::Equal)
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Equal
    }
}

impl Eq for VectorClock {}

impl FromIterator<(DeviceId, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (DeviceId, u64)>>(iter: I) -> Self {
        let mut clock = VectorClock::new();
        for (device, time) in iter {
            clock.update(&device, time);
        }
        clock
    }
}
