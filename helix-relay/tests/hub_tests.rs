use std::sync::Arc;
use std::time::Duration;
use helix_relay::{ClientFrame, Hub, ServerFrame};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn subscribe(topic: &str) -> ClientFrame {
    ClientFrame::Subscribe { topic: topic.into() }
}

fn publish(topic: &str, payload: serde_json::Value) -> ClientFrame {
    ClientFrame::Publish { topic: topic.into(), payload }
}

// ── Frames ──────────────────────────────────────────────────────

#[test]
fn client_frames_are_tagged_by_action() {
    let frame: ClientFrame =
        serde_json::from_value(json!({"action": "subscribe", "topic": "sync:tasks"})).unwrap();
    assert_eq!(frame, subscribe("sync:tasks"));

    let frame: ClientFrame = serde_json::from_value(
        json!({"action": "publish", "topic": "sync:change_log", "payload": {"n": 1}}),
    )
    .unwrap();
    assert_eq!(frame, publish("sync:change_log", json!({"n": 1})));

    assert!(serde_json::from_value::<ClientFrame>(json!({"action": "shout"})).is_err());
}

// ── Hub ─────────────────────────────────────────────────────────

#[tokio::test]
async fn publish_without_subscribers_reaches_nobody() {
    let hub = Hub::new(8);
    assert_eq!(hub.publish("sync:tasks", json!(1), "client-x"), 0);
    assert!(hub.active_topics().is_empty());
}

#[tokio::test]
async fn publish_fans_out_to_topic_subscribers() {
    let hub = Hub::new(8);
    let mut a = hub.subscribe("sync:tasks");
    let mut b = hub.subscribe("sync:tasks");
    let mut other = hub.subscribe("sync:memos");

    assert_eq!(hub.publish("sync:tasks", json!({"id": 7}), "client-9"), 2);

    let expected = ServerFrame {
        topic: "sync:tasks".into(),
        payload: json!({"id": 7}),
        sender: "client-9".into(),
    };
    assert_eq!(a.recv().await.unwrap(), expected);
    assert_eq!(b.recv().await.unwrap(), expected);
    assert!(other.try_recv().is_err());
}

#[tokio::test]
async fn prune_drops_abandoned_topics() {
    let hub = Hub::new(8);
    let keep = hub.subscribe("sync:tasks");
    drop(hub.subscribe("sync:memos"));

    assert_eq!(hub.prune(), 1);
    assert_eq!(hub.active_topics(), vec!["sync:tasks"]);
    drop(keep);
    assert_eq!(hub.prune(), 1);
}

// ── Sessions ────────────────────────────────────────────────────

#[tokio::test]
async fn sessions_exchange_frames_but_never_echo() {
    let hub = Arc::new(Hub::new(8));
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    let mut alice = hub.connect(tx_a);
    let mut bob = hub.connect(tx_b);
    assert_eq!(hub.connected_clients(), 2);
    assert_ne!(alice.client_id(), bob.client_id());

    alice.handle(subscribe("sync:change_log"));
    bob.handle(subscribe("sync:change_log"));
    assert_eq!(hub.subscriber_count("sync:change_log"), 2);

    alice.handle(publish("sync:change_log", json!({"seq": 1})));

    let frame = timeout(WAIT, rx_b.recv()).await.unwrap().unwrap();
    assert_eq!(frame.payload, json!({"seq": 1}));
    assert_eq!(frame.sender, alice.client_id());

    // Alice's own publish is not sent back to her.
    bob.handle(publish("sync:change_log", json!({"seq": 2})));
    let frame = timeout(WAIT, rx_a.recv()).await.unwrap().unwrap();
    assert_eq!(frame.payload, json!({"seq": 2}));
}

#[tokio::test]
async fn duplicate_subscribe_is_ignored() {
    let hub = Arc::new(Hub::new(8));
    let (tx, _rx) = mpsc::channel(8);
    let mut session = hub.connect(tx);

    session.handle(subscribe("sync:tasks"));
    session.handle(subscribe("sync:tasks"));
    assert_eq!(session.subscriptions(), 1);
    assert_eq!(hub.subscriber_count("sync:tasks"), 1);
}

#[tokio::test]
async fn unsubscribe_stops_forwarding() {
    let hub = Arc::new(Hub::new(8));
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, _rx_b) = mpsc::channel(8);
    let mut alice = hub.connect(tx_a);
    let mut bob = hub.connect(tx_b);

    alice.handle(subscribe("sync:presence"));
    alice.handle(ClientFrame::Unsubscribe { topic: "sync:presence".into() });
    assert_eq!(alice.subscriptions(), 0);

    for _ in 0..100 {
        if hub.subscriber_count("sync:presence") == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bob.handle(publish("sync:presence", json!("hello")));

    assert!(timeout(Duration::from_millis(100), rx_a.recv()).await.is_err());
}

#[tokio::test]
async fn closed_session_topics_are_pruned_immediately() {
    let hub = Arc::new(Hub::new(8));
    let (tx, _rx) = mpsc::channel(8);
    let mut session = hub.connect(tx);
    session.handle(subscribe("sync:tasks"));
    session.handle(subscribe("sync:memos"));
    assert_eq!(hub.active_topics(), vec!["sync:memos", "sync:tasks"]);

    session.close().await;
    assert_eq!(hub.connected_clients(), 0);
    assert_eq!(hub.prune(), 2);
    assert!(hub.active_topics().is_empty());
}

#[tokio::test]
async fn dropping_a_session_disconnects_it() {
    let hub = Arc::new(Hub::new(8));
    let (tx, _rx) = mpsc::channel(8);
    let mut session = hub.connect(tx);
    session.handle(subscribe("sync:tasks"));
    assert_eq!(hub.connected_clients(), 1);

    drop(session);
    assert_eq!(hub.connected_clients(), 0);
}
