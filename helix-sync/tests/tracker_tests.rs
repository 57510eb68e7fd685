use chrono::{Duration, TimeZone, Utc};
use helix_crdt::VectorClock;
use helix_model::{fields, SyncMeta, SyncableEntity};
use helix_sync::{detect_conflict, Conflict, ConflictTracker, StrategyKind};
use helix_types::{ConflictId, DeviceId, DevicePlatform, EntityId, EntityType, UserId};
use pretty_assertions::assert_eq;
use std::time::Duration as StdDuration;

fn sample_conflict() -> Conflict {
    let id = EntityId::new();
    let meta = |device: &str| {
        SyncMeta::new(UserId::new("u1"), DevicePlatform::Android)
            .with_clock(VectorClock::single(DeviceId::new(device), 1))
    };
    let local = SyncableEntity::new(id, EntityType::Email, fields! { "read" => true }, meta("a"));
    let remote = SyncableEntity::new(id, EntityType::Email, fields! { "read" => false }, meta("b"));
    detect_conflict(&local, &remote, None).unwrap()
}

#[test]
fn empty_tracker_statistics() {
    let tracker = ConflictTracker::new();
    let stats = tracker.get_statistics();

    assert_eq!(stats.total_conflicts, 0);
    assert_eq!(stats.resolved_conflicts, 0);
    assert_eq!(stats.unresolved_conflicts, 0);
    assert!(stats.resolution_methods.is_empty());
    assert_eq!(stats.conflict_rate, 0.0);
    assert_eq!(stats.average_resolution_time, StdDuration::ZERO);
}

#[test]
fn tracking_assigns_distinct_ids() {
    let mut tracker = ConflictTracker::new();
    let a = tracker.track_conflict(sample_conflict());
    let b = tracker.track_conflict(sample_conflict());

    assert_ne!(a, b);
    assert_eq!(tracker.len(), 2);
    assert!(tracker.get(a).is_some());
    assert!(!tracker.get(a).unwrap().is_resolved());
}

#[test]
fn record_resolution_for_unknown_id_is_false() {
    let mut tracker = ConflictTracker::new();
    tracker.track_conflict(sample_conflict());
    assert!(!tracker.record_resolution(ConflictId::new(), StrategyKind::Manual));
    assert_eq!(tracker.unresolved().count(), 1);
}

#[test]
fn statistics_count_methods_and_rate() {
    let mut tracker = ConflictTracker::new();
    let ids: Vec<_> = (0..4).map(|_| tracker.track_conflict(sample_conflict())).collect();

    assert!(tracker.record_resolution(ids[0], StrategyKind::LastWriteWins));
    assert!(tracker.record_resolution(ids[1], StrategyKind::LastWriteWins));
    assert!(tracker.record_resolution(ids[2], StrategyKind::SetUnion));

    let stats = tracker.get_statistics();
    assert_eq!(stats.total_conflicts, 4);
    assert_eq!(stats.resolved_conflicts, 3);
    assert_eq!(stats.unresolved_conflicts, 1);
    assert_eq!(stats.resolution_methods.get(&StrategyKind::LastWriteWins), Some(&2));
    assert_eq!(stats.resolution_methods.get(&StrategyKind::SetUnion), Some(&1));
    assert_eq!(stats.resolution_methods.get(&StrategyKind::Manual), None);
    assert_eq!(stats.conflict_rate, 25.0);

    let unresolved: Vec<_> = tracker.unresolved().map(|c| c.id).collect();
    assert_eq!(unresolved, vec![ids[3]]);
}

#[test]
fn average_resolution_time_uses_real_timings() {
    let mut tracker = ConflictTracker::new();
    let t0 = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();

    let fast = tracker.track_conflict_at(sample_conflict(), t0);
    let slow = tracker.track_conflict_at(sample_conflict(), t0);
    tracker.record_resolution_at(fast, StrategyKind::SetUnion, t0 + Duration::seconds(2));
    tracker.record_resolution_at(slow, StrategyKind::Manual, t0 + Duration::seconds(6));

    let stats = tracker.get_statistics();
    assert_eq!(stats.average_resolution_time, StdDuration::from_secs(4));
}

#[test]
fn resolving_twice_keeps_the_latest_strategy() {
    let mut tracker = ConflictTracker::new();
    let id = tracker.track_conflict(sample_conflict());
    tracker.record_resolution(id, StrategyKind::Manual);
    tracker.record_resolution(id, StrategyKind::LastWriteWins);

    let stats = tracker.get_statistics();
    assert_eq!(stats.resolved_conflicts, 1);
    assert_eq!(stats.resolution_methods.get(&StrategyKind::LastWriteWins), Some(&1));
    assert_eq!(stats.resolution_methods.get(&StrategyKind::Manual), None);
}

#[test]
fn known_ids_are_kept() {
    let mut tracker = ConflictTracker::new();
    let id = ConflictId::new();
    tracker.track_conflict_with_id(id, sample_conflict());
    assert!(tracker.record_resolution(id, StrategyKind::SetUnion));
    assert!(tracker.get(id).unwrap().is_resolved());
}

#[test]
fn trackers_are_independent() {
    let mut first = ConflictTracker::new();
    let second = ConflictTracker::new();
    first.track_conflict(sample_conflict());

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());

    first.clear();
    assert!(first.is_empty());
}

#[test]
fn statistics_serialize_method_names() {
    let mut tracker = ConflictTracker::new();
    let id = tracker.track_conflict(sample_conflict());
    tracker.record_resolution(id, StrategyKind::ThreeWayMerge);

    let json = serde_json::to_value(tracker.get_statistics()).unwrap();
    assert_eq!(json["resolution_methods"]["three_way_merge"], 1);
    assert_eq!(json["total_conflicts"], 1);
}
