//! Transport layer abstraction.
//!
//! The sync client only needs topic-based subscribe/publish with
//! at-least-once delivery, plus read access to stored conflict records and
//! ancestor snapshots. Any realtime backend can sit behind [`SyncTransport`].

use crate::conflict::Conflict;
use crate::error::SyncResult;
use async_trait::async_trait;
use helix_model::{PresenceRecord, SyncableEntity};
use helix_types::{ConflictId, EntityId, EntityType};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Topic carrying the append-only change log.
pub const CHANGE_LOG_TOPIC: &str = "sync:change_log";

/// Topic carrying presence upserts.
pub const PRESENCE_TOPIC: &str = "sync:presence";

/// Topic carrying row changes for one collection.
#[must_use]
pub fn entity_topic(entity_type: EntityType) -> String {
    format!("sync:{}", entity_type.collection())
}

/// Row-level event kind delivered on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowEvent {
    Insert,
    Update,
    Delete,
}

impl RowEvent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RowEvent::Insert => "insert",
            RowEvent::Update => "update",
            RowEvent::Delete => "delete",
        }
    }
}

/// A message delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportMessage {
    pub topic: String,
    pub event: RowEvent,
    pub payload: serde_json::Value,
}

/// Handle identifying one subscription on a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An open subscription: messages for `topic` arrive on `receiver`.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub topic: String,
    pub receiver: mpsc::Receiver<TransportMessage>,
}

/// A pub/sub transport with read access to conflict and ancestor records.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Opens a subscription to `topic`.
    async fn subscribe(&self, topic: &str) -> SyncResult<Subscription>;

    /// Closes a subscription. Unknown ids are not an error.
    async fn unsubscribe(&self, id: SubscriptionId) -> SyncResult<()>;

    /// Publishes `payload` on `topic` as an insert.
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> SyncResult<()>;

    /// Inserts or replaces this device's presence record.
    async fn upsert_presence(&self, record: &PresenceRecord) -> SyncResult<()>;

    /// Fetches the full record of a conflict flagged on the change log.
    async fn fetch_conflict(&self, id: ConflictId) -> SyncResult<Conflict>;

    /// Fetches the snapshot of an entity at `version`, for three-way merges.
    async fn fetch_ancestor(
        &self,
        entity_type: EntityType,
        entity_id: EntityId,
        version: &str,
    ) -> SyncResult<Option<SyncableEntity>>;
}

/// An in-process transport.
///
/// Publishes are recorded and fanned out to every subscriber of the topic,
/// including the publisher. Failures can be injected to exercise offline
/// and degraded paths.
pub mod memory {
    use super::*;
    use crate::error::SyncError;
    use helix_types::DeviceId;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    #[derive(Default)]
    struct Inner {
        next_id: u64,
        subscribers: HashMap<SubscriptionId, (String, mpsc::Sender<TransportMessage>)>,
        published: Vec<(String, serde_json::Value)>,
        conflicts: HashMap<ConflictId, Conflict>,
        ancestors: HashMap<(EntityId, String), SyncableEntity>,
        presence: HashMap<DeviceId, PresenceRecord>,
        fail_publish: bool,
        failures_remaining: usize,
        /// Publishes still allowed through before `failures_remaining` applies.
        failure_delay: usize,
        failing_topics: HashSet<String>,
    }

    pub struct MemoryTransport {
        capacity: usize,
        inner: Mutex<Inner>,
    }

    impl Default for MemoryTransport {
        fn default() -> Self {
            Self::new(256)
        }
    }

    impl MemoryTransport {
        /// Creates a transport whose subscriptions buffer `capacity` messages.
        pub fn new(capacity: usize) -> Self {
            Self {
                capacity: capacity.max(1),
                inner: Mutex::new(Inner::default()),
            }
        }

        fn lock(&self) -> MutexGuard<'_, Inner> {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Makes every publish fail until turned off again.
        pub fn set_fail_publish(&self, fail: bool) {
            self.lock().fail_publish = fail;
        }

        /// Makes the next `n` publishes fail.
        pub fn fail_next_publishes(&self, n: usize) {
            self.fail_publishes_after(0, n);
        }

        /// Lets the next `ok` publishes through, then fails the `n` after them.
        pub fn fail_publishes_after(&self, ok: usize, n: usize) {
            let mut inner = self.lock();
            inner.failure_delay = ok;
            inner.failures_remaining = n;
        }

        /// Makes subscribing to `topic` fail.
        pub fn fail_subscribe(&self, topic: impl Into<String>) {
            self.lock().failing_topics.insert(topic.into());
        }

        /// Stores a conflict record for [`SyncTransport::fetch_conflict`].
        pub fn insert_conflict(&self, id: ConflictId, conflict: Conflict) {
            self.lock().conflicts.insert(id, conflict);
        }

        /// Stores an ancestor snapshot for [`SyncTransport::fetch_ancestor`].
        pub fn insert_ancestor(&self, version: impl Into<String>, entity: SyncableEntity) {
            self.lock().ancestors.insert((entity.id, version.into()), entity);
        }

        /// Payloads successfully published on `topic`, in publish order.
        pub fn published(&self, topic: &str) -> Vec<serde_json::Value> {
            self.lock()
                .published
                .iter()
                .filter(|(t, _)| t == topic)
                .map(|(_, payload)| payload.clone())
                .collect()
        }

        /// Last presence record upserted for `device_id`.
        pub fn presence(&self, device_id: &DeviceId) -> Option<PresenceRecord> {
            self.lock().presence.get(device_id).cloned()
        }

        /// Number of open subscriptions on `topic`.
        pub fn subscriber_count(&self, topic: &str) -> usize {
            self.lock()
                .subscribers
                .values()
                .filter(|(t, _)| t == topic)
                .count()
        }

        /// Total open subscriptions.
        pub fn open_subscriptions(&self) -> usize {
            self.lock().subscribers.len()
        }

        /// Delivers a message to every subscriber of `topic` without
        /// recording it as published, simulating a change made elsewhere.
        pub async fn emit(&self, topic: &str, event: RowEvent, payload: serde_json::Value) {
            let message = TransportMessage {
                topic: topic.to_string(),
                event,
                payload,
            };
            self.deliver(message).await;
        }

        async fn deliver(&self, message: TransportMessage) {
            let senders: Vec<mpsc::Sender<TransportMessage>> = self
                .lock()
                .subscribers
                .values()
                .filter(|(t, _)| *t == message.topic)
                .map(|(_, tx)| tx.clone())
                .collect();

            for tx in senders {
                // A closed receiver just means the subscriber went away.
                let _ = tx.send(message.clone()).await;
            }
        }
    }

    #[async_trait]
    impl SyncTransport for MemoryTransport {
        async fn subscribe(&self, topic: &str) -> SyncResult<Subscription> {
            let mut inner = self.lock();
            if inner.failing_topics.contains(topic) {
                return Err(SyncError::Subscription {
                    topic: topic.to_string(),
                    reason: "subscription refused".into(),
                });
            }
            let (tx, rx) = mpsc::channel(self.capacity);
            inner.next_id += 1;
            let id = SubscriptionId(inner.next_id);
            inner.subscribers.insert(id, (topic.to_string(), tx));
            Ok(Subscription {
                id,
                topic: topic.to_string(),
                receiver: rx,
            })
        }

        async fn unsubscribe(&self, id: SubscriptionId) -> SyncResult<()> {
            self.lock().subscribers.remove(&id);
            Ok(())
        }

        async fn publish(&self, topic: &str, payload: serde_json::Value) -> SyncResult<()> {
            {
                let mut inner = self.lock();
                if inner.fail_publish {
                    return Err(SyncError::Network("transport offline".into()));
                }
                if inner.failures_remaining > 0 {
                    if inner.failure_delay > 0 {
                        inner.failure_delay -= 1;
                    } else {
                        inner.failures_remaining -= 1;
                        return Err(SyncError::Network("publish failed".into()));
                    }
                }
                inner.published.push((topic.to_string(), payload.clone()));
            }

            self.deliver(TransportMessage {
                topic: topic.to_string(),
                event: RowEvent::Insert,
                payload,
            })
            .await;
            Ok(())
        }

        async fn upsert_presence(&self, record: &PresenceRecord) -> SyncResult<()> {
            let payload = serde_json::to_value(record)?;
            let event = {
                let mut inner = self.lock();
                if inner.fail_publish {
                    return Err(SyncError::Network("transport offline".into()));
                }
                match inner.presence.insert(record.device_id.clone(), record.clone()) {
                    Some(_) => RowEvent::Update,
                    None => RowEvent::Insert,
                }
            };
            self.deliver(TransportMessage {
                topic: PRESENCE_TOPIC.to_string(),
                event,
                payload,
            })
            .await;
            Ok(())
        }

        async fn fetch_conflict(&self, id: ConflictId) -> SyncResult<Conflict> {
            self.lock()
                .conflicts
                .get(&id)
                .cloned()
                .ok_or_else(|| SyncError::NotFound(format!("conflict {id}")))
        }

        async fn fetch_ancestor(
            &self,
            _entity_type: EntityType,
            entity_id: EntityId,
            version: &str,
        ) -> SyncResult<Option<SyncableEntity>> {
            Ok(self
                .lock()
                .ancestors
                .get(&(entity_id, version.to_string()))
                .cloned())
        }
    }
}
