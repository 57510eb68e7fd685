//! Per-session sync client.
//!
//! The client subscribes to one topic per tracked collection plus the change
//! log and presence feeds, turns inbound rows into [`DeltaChange`]s for the
//! host, forwards backend-flagged conflicts, and publishes local edits to the
//! change log. While offline, local edits wait in a FIFO queue and are
//! published in order when the client comes back online.

use crate::config::SyncConfig;
use crate::conflict::{find_conflicted_fields, Conflict};
use crate::error::SyncResult;
use crate::state::{ClientState, ConnectionState, Snapshot, SubscriptionState};
use crate::transport::{
    entity_topic, RowEvent, Subscription, SyncTransport, TransportMessage, CHANGE_LOG_TOPIC,
    PRESENCE_TOPIC,
};
use chrono::Utc;
use helix_crdt::VectorClock;
use helix_model::{
    diff_fields, ChangeLogEntry, ChangeOperation, DeltaChange, FieldMap, LocalChange,
    PresenceRecord, PresenceStatus, SyncableEntity,
};
use helix_types::{ConflictId, DeviceId, EntityId, EntityType};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receives remote changes reshaped for the host.
pub trait DeltaHandler: Send + Sync {
    fn on_delta(&self, delta: DeltaChange);
}

impl<F> DeltaHandler for F
where
    F: Fn(DeltaChange) + Send + Sync,
{
    fn on_delta(&self, delta: DeltaChange) {
        self(delta)
    }
}

/// Receives conflicts the backend flagged on the change log.
pub trait ConflictHandler: Send + Sync {
    fn on_conflict(&self, id: ConflictId, conflict: Conflict);
}

impl<F> ConflictHandler for F
where
    F: Fn(ConflictId, Conflict) + Send + Sync,
{
    fn on_conflict(&self, id: ConflictId, conflict: Conflict) {
        self(id, conflict)
    }
}

/// What happened to a local change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Published to the change log.
    Sent,
    /// Waiting in the offline queue.
    Queued,
}

/// Which feed a subscription belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feed {
    Collection(EntityType),
    ChangeLog,
    Presence,
}

impl Feed {
    fn topic(&self) -> String {
        match self {
            Feed::Collection(entity_type) => entity_topic(*entity_type),
            Feed::ChangeLog => CHANGE_LOG_TOPIC.to_string(),
            Feed::Presence => PRESENCE_TOPIC.to_string(),
        }
    }
}

/// Synchronizes one device's records with the backend.
pub struct SyncClient {
    config: SyncConfig,
    transport: Arc<dyn SyncTransport>,
    state: Arc<Mutex<ClientState>>,
    delta_handler: Option<Arc<dyn DeltaHandler>>,
    conflict_handler: Option<Arc<dyn ConflictHandler>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncClient {
    /// Creates a disconnected client. Call [`initialize`](Self::initialize)
    /// to start syncing.
    pub fn new(config: SyncConfig, transport: Arc<dyn SyncTransport>) -> Self {
        Self {
            config,
            transport,
            state: Arc::new(Mutex::new(ClientState::new())),
            delta_handler: None,
            conflict_handler: None,
            tasks: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_delta_handler(mut self, handler: Arc<dyn DeltaHandler>) -> Self {
        self.delta_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn with_conflict_handler(mut self, handler: Arc<dyn ConflictHandler>) -> Self {
        self.conflict_handler = Some(handler);
        self
    }

    /// Sets the delta handler. Takes effect on the next `initialize`.
    pub fn set_delta_handler(&mut self, handler: Arc<dyn DeltaHandler>) {
        self.delta_handler = Some(handler);
    }

    /// Sets the conflict handler. Takes effect on the next `initialize`.
    pub fn set_conflict_handler(&mut self, handler: Arc<dyn ConflictHandler>) {
        self.conflict_handler = Some(handler);
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.config.device_id
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Opens every subscription, announces presence and flushes the offline
    /// queue.
    ///
    /// If any subscription fails, the ones already opened are closed, the
    /// client returns to `Disconnected` and the error is returned. Calling
    /// this on an initialized client is a no-op.
    pub async fn initialize(&self) -> SyncResult<()> {
        self.config.validate()?;

        {
            let mut state = self.state.lock().await;
            if !state.subscriptions.is_empty() || state.connection == ConnectionState::Connecting {
                debug!("Sync client {} already initialized", self.config.device_id);
                return Ok(());
            }
            state.connection = ConnectionState::Connecting;
        }
        info!(
            "Connecting device {} ({} collections)",
            self.config.device_id,
            self.config.tracked_types.len()
        );

        let feeds = self
            .config
            .tracked_types
            .iter()
            .map(|t| Feed::Collection(*t))
            .chain([Feed::ChangeLog, Feed::Presence]);

        let mut opened: Vec<(Feed, Subscription)> = Vec::new();
        for feed in feeds {
            let topic = feed.topic();
            match self.transport.subscribe(&topic).await {
                Ok(subscription) => {
                    debug!("Subscribed to {} as {}", topic, subscription.id);
                    opened.push((feed, subscription));
                }
                Err(e) => {
                    warn!("Failed to subscribe to {}: {}", topic, e);
                    for (_, subscription) in opened {
                        if let Err(err) = self.transport.unsubscribe(subscription.id).await {
                            warn!("Failed to unsubscribe from {}: {}", subscription.topic, err);
                        }
                    }
                    self.state.lock().await.connection = ConnectionState::Disconnected;
                    return Err(e);
                }
            }
        }

        let pump = Arc::new(Pump {
            device_id: self.config.device_id.clone(),
            drop_stale_updates: self.config.drop_stale_updates,
            transport: Arc::clone(&self.transport),
            state: Arc::clone(&self.state),
            delta_handler: self.delta_handler.clone(),
            conflict_handler: self.conflict_handler.clone(),
        });

        {
            let mut state = self.state.lock().await;
            let mut tasks = self.tasks.lock().await;
            for (feed, subscription) in opened {
                state.subscriptions.insert(subscription.topic, subscription.id);
                if let Feed::Collection(entity_type) = feed {
                    state
                        .collections
                        .insert(entity_type, SubscriptionState::Subscribed);
                }
                tasks.push(tokio::spawn(Arc::clone(&pump).run(feed, subscription.receiver)));
            }
            state.connection = ConnectionState::Connected;
        }
        info!("Device {} connected", self.config.device_id);

        self.announce_presence().await;

        if self.config.drain_on_connect {
            let mut state = self.state.lock().await;
            self.drain(&mut state).await;
        }
        Ok(())
    }

    async fn announce_presence(&self) {
        let record = PresenceRecord {
            user_id: self.config.user_id.clone(),
            device_id: self.config.device_id.clone(),
            platform: self.config.platform,
            status: PresenceStatus::Online,
            current_context: self.config.current_context.clone(),
            app_version: self.config.app_version.clone(),
            last_seen: Utc::now(),
        };
        if let Err(e) = self.transport.upsert_presence(&record).await {
            warn!("Failed to announce presence for {}: {}", self.config.device_id, e);
        }
    }

    /// Stops every feed and closes every subscription. Safe to call twice.
    pub async fn cleanup(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }

        let subscriptions: Vec<_> = {
            let mut state = self.state.lock().await;
            state.connection = ConnectionState::Disconnected;
            for status in state.collections.values_mut() {
                *status = SubscriptionState::Unsubscribed;
            }
            state.subscriptions.drain().collect()
        };

        if subscriptions.is_empty() {
            return;
        }
        for (topic, id) in &subscriptions {
            if let Err(e) = self.transport.unsubscribe(*id).await {
                warn!("Failed to unsubscribe from {}: {}", topic, e);
            }
        }
        info!(
            "Device {} closed {} subscriptions",
            self.config.device_id,
            subscriptions.len()
        );
    }

    // ── Connectivity ────────────────────────────────────────────

    /// Online: marks the client connected and flushes the offline queue,
    /// returning how many changes were sent. Offline: marks it disconnected.
    pub async fn set_online(&self, online: bool) -> usize {
        let mut state = self.state.lock().await;
        if online {
            if state.connection != ConnectionState::Connected {
                info!("Device {} back online", self.config.device_id);
            }
            state.connection = ConnectionState::Connected;
            self.drain(&mut state).await
        } else {
            if state.connection != ConnectionState::Disconnected {
                info!(
                    "Device {} offline, queueing local changes",
                    self.config.device_id
                );
            }
            state.connection = ConnectionState::Disconnected;
            0
        }
    }

    pub async fn go_online(&self) -> usize {
        self.set_online(true).await
    }

    pub async fn go_offline(&self) {
        self.set_online(false).await;
    }

    /// Publishes queued entries strictly in order. A failed entry goes back
    /// to the front and stops the drain.
    async fn drain(&self, state: &mut ClientState) -> usize {
        let mut sent = 0;
        while let Some(entry) = state.queue.pop_front() {
            if let Err(e) = self.publish_entry(&entry).await {
                warn!(
                    "Drain stopped after {} changes, {} pending: {}",
                    sent,
                    state.queue.len() + 1,
                    e
                );
                state.queue.push_front(entry);
                break;
            }
            sent += 1;
        }
        if sent > 0 {
            info!("Flushed {} queued changes", sent);
        }
        sent
    }

    // ── Local changes ───────────────────────────────────────────

    /// Stamps a local edit with the record's clock advanced by this device's
    /// next tick and publishes it,
    /// or queues it when offline or when the publish fails.
    ///
    /// Never surfaces transport errors. While the queue is non-empty new
    /// changes are queued behind it so nothing overtakes an older edit.
    pub async fn apply_local_change(&self, change: LocalChange) -> Delivery {
        let mut state = self.state.lock().await;
        let device_id = &self.config.device_id;
        let tick = state.clocks.increment_clock(device_id).get(device_id);

        // The stamp carries only what this record has seen, plus the new tick.
        let previous = state.snapshots.get(&change.entity_id).cloned();
        let mut clock = previous
            .as_ref()
            .map(|s| s.clock.clone())
            .unwrap_or_default();
        clock.update(device_id, tick);

        let record = match change.operation {
            ChangeOperation::Delete => {
                state.snapshots.remove(&change.entity_id);
                FieldMap::new()
            }
            ChangeOperation::Insert => {
                state.remember(change.entity_id, change.data.clone(), &clock);
                change.data.clone()
            }
            ChangeOperation::Update => {
                let mut data = previous.map(|s| s.data).unwrap_or_default();
                data.extend(change.data.clone());
                state.remember(change.entity_id, data.clone(), &clock);
                data
            }
        };

        let entry = ChangeLogEntry::from_local(&change, &record, clock, device_id.clone());

        if state.must_queue() {
            state.queue.push_back(entry);
            debug!(
                "Queued {} of {} {} ({} pending)",
                change.operation,
                change.entity_type,
                change.entity_id,
                state.queue.len()
            );
            return Delivery::Queued;
        }

        match self.publish_entry(&entry).await {
            Ok(()) => {
                debug!(
                    "Published {} of {} {}",
                    change.operation, change.entity_type, change.entity_id
                );
                Delivery::Sent
            }
            Err(e) => {
                warn!(
                    "Publish of {} {} failed, queueing: {}",
                    change.entity_type, change.entity_id, e
                );
                state.queue.push_back(entry);
                Delivery::Queued
            }
        }
    }

    async fn publish_entry(&self, entry: &ChangeLogEntry) -> SyncResult<()> {
        let payload = serde_json::to_value(entry)?;
        self.transport.publish(CHANGE_LOG_TOPIC, payload).await
    }

    // ── Conflicts ───────────────────────────────────────────────

    /// Makes sure `conflict` carries a common ancestor so it can be resolved
    /// with a three-way merge, fetching the version the local write was based
    /// on when needed. Returns whether an ancestor is now available.
    pub async fn prepare_three_way(&self, conflict: &mut Conflict) -> SyncResult<bool> {
        if conflict.common_ancestor.is_some() {
            return Ok(true);
        }
        let Some(version) = conflict.local.sync_meta.parent_version.clone() else {
            return Ok(false);
        };

        let ancestor = self
            .transport
            .fetch_ancestor(conflict.local.entity_type, conflict.local.id, &version)
            .await?;
        let Some(ancestor) = ancestor else {
            debug!(
                "No ancestor {} stored for entity {}",
                version, conflict.local.id
            );
            return Ok(false);
        };

        conflict.conflicted_fields = Some(find_conflicted_fields(
            &conflict.local,
            &conflict.remote,
            Some(&ancestor),
        ));
        conflict.common_ancestor = Some(ancestor);
        Ok(true)
    }

    // ── Accessors ───────────────────────────────────────────────

    pub async fn state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    /// Number of local changes waiting to be published.
    pub async fn pending_changes(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    /// The queued entries, oldest first.
    pub async fn pending_entries(&self) -> Vec<ChangeLogEntry> {
        self.state.lock().await.queue.iter().cloned().collect()
    }

    /// This device's vector clock, including everything it has observed.
    pub async fn current_clock(&self) -> VectorClock {
        self.state
            .lock()
            .await
            .clocks
            .get_clock(&self.config.device_id)
    }

    pub async fn subscription_state(&self, entity_type: EntityType) -> SubscriptionState {
        self.state
            .lock()
            .await
            .collections
            .get(&entity_type)
            .copied()
            .unwrap_or(SubscriptionState::Unsubscribed)
    }

    /// Last known version of a record.
    pub async fn snapshot(&self, entity_id: EntityId) -> Option<Snapshot> {
        self.state.lock().await.snapshots.get(&entity_id).cloned()
    }

    /// Other devices currently advertising themselves as online or away.
    pub async fn online_peers(&self) -> Vec<PresenceRecord> {
        let state = self.state.lock().await;
        let mut peers: Vec<_> = state.peers.values().cloned().collect();
        peers.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        peers
    }
}

/// Everything a feed task needs, shared by all of a client's feeds.
struct Pump {
    device_id: DeviceId,
    drop_stale_updates: bool,
    transport: Arc<dyn SyncTransport>,
    state: Arc<Mutex<ClientState>>,
    delta_handler: Option<Arc<dyn DeltaHandler>>,
    conflict_handler: Option<Arc<dyn ConflictHandler>>,
}

impl Pump {
    async fn run(
        self: Arc<Self>,
        feed: Feed,
        mut receiver: tokio::sync::mpsc::Receiver<TransportMessage>,
    ) {
        while let Some(message) = receiver.recv().await {
            match feed {
                Feed::Collection(entity_type) => self.handle_row(entity_type, message).await,
                Feed::ChangeLog => self.handle_change_log(message).await,
                Feed::Presence => self.handle_presence(message).await,
            }
        }
        debug!("Feed {:?} closed", feed);
    }

    async fn handle_row(&self, entity_type: EntityType, message: TransportMessage) {
        if message.event == RowEvent::Delete {
            debug!("Ignoring delete on {}", message.topic);
            return;
        }

        let mut entity: SyncableEntity = match serde_json::from_value(message.payload) {
            Ok(entity) => entity,
            Err(e) => {
                warn!("Malformed row on {}: {}", message.topic, e);
                return;
            }
        };
        if entity.entity_type != entity_type {
            warn!(
                "Row for {} {} arrived on {}",
                entity.entity_type, entity.id, message.topic
            );
            return;
        }
        if entity.rehash() {
            debug!("Recomputed stale content hash for {}", entity.id);
        }

        let delta = {
            let mut state = self.state.lock().await;
            let remote_clock = entity.sync_meta.vector_clock.clone();
            let previous = state.snapshots.get(&entity.id);

            if self.drop_stale_updates
                && previous.is_some_and(|s| remote_clock.happens_before(&s.clock))
            {
                debug!("Dropping stale {} for {}", message.event.as_str(), entity.id);
                return;
            }

            let changed_fields = diff_fields(previous.map(|s| &s.data), entity.data());
            state.clocks.observe(&self.device_id, &remote_clock);
            state.remember(entity.id, entity.data().clone(), &remote_clock);

            if changed_fields.is_empty() {
                debug!("No field changes for {}", entity.id);
                return;
            }

            DeltaChange {
                entity_type,
                entity_id: entity.id,
                operation: message.event.as_str().to_string(),
                changed_fields,
                vector_clock: remote_clock,
                device_type: Some(entity.sync_meta.last_modified_device),
                timestamp: entity.sync_meta.last_modified_at,
            }
        };

        if let Some(handler) = &self.delta_handler {
            handler.on_delta(delta);
        }
    }

    async fn handle_change_log(&self, message: TransportMessage) {
        if message.event != RowEvent::Insert {
            return;
        }
        let entry: ChangeLogEntry = match serde_json::from_value(message.payload) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Malformed change log entry: {}", e);
                return;
            }
        };
        if !entry.conflict_detected {
            return;
        }
        let Some(conflict_id) = entry.conflict_id else {
            warn!("Conflict flagged on {} without a conflict id", entry.entity_id);
            return;
        };

        match self.transport.fetch_conflict(conflict_id).await {
            Ok(conflict) => {
                info!("Conflict {} reported on {}", conflict_id, entry.entity_id);
                if let Some(handler) = &self.conflict_handler {
                    handler.on_conflict(conflict_id, conflict);
                }
            }
            Err(e) => warn!("Failed to fetch conflict {}: {}", conflict_id, e),
        }
    }

    async fn handle_presence(&self, message: TransportMessage) {
        let record: PresenceRecord = match serde_json::from_value(message.payload) {
            Ok(record) => record,
            Err(e) => {
                warn!("Malformed presence record: {}", e);
                return;
            }
        };
        if record.device_id == self.device_id {
            return;
        }

        let mut state = self.state.lock().await;
        if message.event == RowEvent::Delete || record.status == PresenceStatus::Offline {
            state.peers.remove(&record.device_id);
        } else {
            debug!("Peer {} is {:?}", record.device_id, record.status);
            state.peers.insert(record.device_id.clone(), record);
        }
    }
}
