//! Session state for a [`SyncClient`](crate::SyncClient).
//!
//! Everything the client mutates lives in one [`ClientState`] so a single
//! lock covers each read-modify-write (stamp then send or enqueue, drain).

use crate::transport::SubscriptionId;
use helix_crdt::{VectorClock, VectorClockManager};
use helix_model::{ChangeLogEntry, FieldMap, PresenceRecord};
use helix_types::{DeviceId, EntityId, EntityType};
use std::collections::{HashMap, VecDeque};

/// Connection lifecycle of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Whether a collection's topic is currently subscribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    Subscribed,
    Unsubscribed,
}

/// Last known version of a record, as seen by this device.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub data: FieldMap,
    pub clock: VectorClock,
}

#[derive(Debug)]
pub(crate) struct ClientState {
    pub(crate) connection: ConnectionState,
    pub(crate) clocks: VectorClockManager,
    pub(crate) queue: VecDeque<ChangeLogEntry>,
    /// Open subscriptions, keyed by topic.
    pub(crate) subscriptions: HashMap<String, SubscriptionId>,
    pub(crate) collections: HashMap<EntityType, SubscriptionState>,
    pub(crate) snapshots: HashMap<EntityId, Snapshot>,
    pub(crate) peers: HashMap<DeviceId, PresenceRecord>,
}

impl ClientState {
    pub(crate) fn new() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            clocks: VectorClockManager::new(),
            queue: VecDeque::new(),
            subscriptions: HashMap::new(),
            collections: HashMap::new(),
            snapshots: HashMap::new(),
            peers: HashMap::new(),
        }
    }

    /// True when local changes must be queued instead of published.
    pub(crate) fn must_queue(&self) -> bool {
        self.connection != ConnectionState::Connected || !self.queue.is_empty()
    }

    /// Records `data` as the latest version of `entity_id`, folding `clock`
    /// into the entity's known history.
    pub(crate) fn remember(&mut self, entity_id: EntityId, data: FieldMap, clock: &VectorClock) {
        match self.snapshots.get_mut(&entity_id) {
            Some(snapshot) => {
                snapshot.data = data;
                snapshot.clock.merge(clock);
            }
            None => {
                self.snapshots.insert(
                    entity_id,
                    Snapshot {
                        data,
                        clock: clock.clone(),
                    },
                );
            }
        }
    }
}
