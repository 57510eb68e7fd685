//! Topic fan-out shared by every connected socket.

use crate::{ClientFrame, ServerFrame};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One broadcast channel per topic, created on first subscribe.
pub struct Hub {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<ServerFrame>>>,
    next_client: AtomicU64,
    connected: AtomicUsize,
}

impl Hub {
    /// Creates a hub whose topic channels buffer `capacity` frames per
    /// receiver before the slowest receiver starts lagging.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
            next_client: AtomicU64::new(1),
            connected: AtomicUsize::new(0),
        }
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<ServerFrame>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<ServerFrame> {
        self.topics()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Sends `payload` to every current subscriber of `topic` and returns
    /// how many receivers it reached.
    pub fn publish(&self, topic: &str, payload: serde_json::Value, sender: &str) -> usize {
        let topics = self.topics();
        let Some(tx) = topics.get(topic) else {
            return 0;
        };
        let frame = ServerFrame {
            topic: topic.to_string(),
            payload,
            sender: sender.to_string(),
        };
        tx.send(frame).unwrap_or(0)
    }

    /// Drops topics nobody listens to any more.
    pub fn prune(&self) -> usize {
        let mut topics = self.topics();
        let before = topics.len();
        topics.retain(|_, tx| tx.receiver_count() > 0);
        before - topics.len()
    }

    /// Topics with at least one subscriber, sorted.
    pub fn active_topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .topics()
            .iter()
            .filter(|(_, tx)| tx.receiver_count() > 0)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    pub fn connected_clients(&self) -> usize {
        self.connected.load(Ordering::Relaxed)
    }

    /// Registers a new connection and returns its session.
    pub fn connect(self: &Arc<Self>, outbound: mpsc::Sender<ServerFrame>) -> Session {
        let id = self.next_client.fetch_add(1, Ordering::Relaxed);
        self.connected.fetch_add(1, Ordering::Relaxed);
        Session {
            client_id: format!("client-{id}"),
            hub: Arc::clone(self),
            outbound,
            forwards: HashMap::new(),
        }
    }
}

/// One connection's view of the hub.
///
/// Each subscribed topic gets a forwarding task that copies frames from the
/// topic's broadcast channel to the connection's outbound queue, skipping
/// frames the connection published itself.
pub struct Session {
    client_id: String,
    hub: Arc<Hub>,
    outbound: mpsc::Sender<ServerFrame>,
    forwards: HashMap<String, JoinHandle<()>>,
}

impl Session {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn subscriptions(&self) -> usize {
        self.forwards.len()
    }

    pub fn handle(&mut self, frame: ClientFrame) {
        match frame {
            ClientFrame::Subscribe { topic } => self.subscribe(topic),
            ClientFrame::Unsubscribe { topic } => self.unsubscribe(&topic),
            ClientFrame::Publish { topic, payload } => {
                let reached = self.hub.publish(&topic, payload, &self.client_id);
                debug!("{} published on {} ({} receivers)", self.client_id, topic, reached);
            }
        }
    }

    fn subscribe(&mut self, topic: String) {
        if self.forwards.contains_key(&topic) {
            return;
        }
        let mut rx = self.hub.subscribe(&topic);
        let outbound = self.outbound.clone();
        let own_id = self.client_id.clone();
        let label = topic.clone();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(frame) if frame.sender == own_id => {}
                    Ok(frame) => {
                        if outbound.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("{} lagged on {}, skipped {} frames", own_id, label, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        debug!("{} subscribed to {}", self.client_id, topic);
        self.forwards.insert(topic, task);
    }

    /// Stops every forwarding task and waits until their topic receivers
    /// are released, so a following [`Hub::prune`] sees them gone.
    pub async fn close(mut self) {
        for (_, task) in self.forwards.drain() {
            task.abort();
            let _ = task.await;
        }
    }

    fn unsubscribe(&mut self, topic: &str) {
        if let Some(task) = self.forwards.remove(topic) {
            task.abort();
            debug!("{} unsubscribed from {}", self.client_id, topic);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for (_, task) in self.forwards.drain() {
            task.abort();
        }
        self.hub.connected.fetch_sub(1, Ordering::Relaxed);
    }
}
