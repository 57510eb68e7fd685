use helix_crdt::{VectorClock, VectorClockManager};
use helix_types::DeviceId;

#[test]
fn unknown_device_has_empty_clock() {
    let manager = VectorClockManager::new();
    assert!(manager.get_clock(&DeviceId::new("ghost")).is_empty());
    assert!(manager.is_empty());
}

#[test]
fn increment_creates_single_entry_then_advances() {
    let web = DeviceId::new("web");
    let mut manager = VectorClockManager::new();

    let first = manager.increment_clock(&web);
    assert_eq!(first.len(), 1);
    assert_eq!(first.get(&web), 1);

    let second = manager.increment_clock(&web);
    assert_eq!(second.get(&web), 2);
    assert_eq!(manager.get_clock(&web), second);
}

#[test]
fn increment_only_touches_own_entry() {
    let web = DeviceId::new("web");
    let phone = DeviceId::new("phone");
    let mut manager = VectorClockManager::new();

    manager.observe(&web, &VectorClock::single(phone.clone(), 4));
    let clock = manager.increment_clock(&web);
    assert_eq!(clock.get(&phone), 4);
    assert_eq!(clock.get(&web), 1);
}

#[test]
fn observe_merges_without_incrementing() {
    let web = DeviceId::new("web");
    let phone = DeviceId::new("phone");
    let mut manager = VectorClockManager::new();
    manager.increment_clock(&web);

    let remote: VectorClock = [(phone.clone(), 3), (web.clone(), 1)].into_iter().collect();
    let merged = manager.observe(&web, &remote);
    assert_eq!(merged.get(&web), 1);
    assert_eq!(merged.get(&phone), 3);

    let stale = VectorClock::single(phone.clone(), 1);
    let merged = manager.observe(&web, &stale);
    assert_eq!(merged.get(&phone), 3);
}

#[test]
fn merge_clock_is_pointwise_max() {
    let a: VectorClock = [(DeviceId::new("a"), 2), (DeviceId::new("b"), 1)]
        .into_iter()
        .collect();
    let b: VectorClock = [(DeviceId::new("b"), 5)].into_iter().collect();
    let merged = VectorClockManager::merge_clock(&a, &b);
    assert_eq!(merged.get(&DeviceId::new("a")), 2);
    assert_eq!(merged.get(&DeviceId::new("b")), 5);
}

#[test]
fn clocks_are_tracked_per_device() {
    let mut manager = VectorClockManager::new();
    manager.increment_clock(&DeviceId::new("a"));
    manager.increment_clock(&DeviceId::new("b"));
    assert_eq!(manager.len(), 2);
    assert_eq!(manager.get_clock(&DeviceId::new("a")).get(&DeviceId::new("b")), 0);
}
