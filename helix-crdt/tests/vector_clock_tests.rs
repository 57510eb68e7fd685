use helix_crdt::{CausalOrder, VectorClock};
use helix_types::DeviceId;
use pretty_assertions::assert_eq;

fn dev(name: &str) -> DeviceId {
    DeviceId::new(name)
}

fn clock(entries: &[(&str, u64)]) -> VectorClock {
    entries.iter().map(|(d, t)| (dev(d), *t)).collect()
}

#[test]
fn new_clock_is_empty() {
    let clock = VectorClock::new();
    assert!(clock.is_empty());
    assert_eq!(clock.len(), 0);
    assert!(VectorClock::default().is_empty());
}

#[test]
fn single_creates_one_entry() {
    let clock = VectorClock::single(dev("web"), 3);
    assert_eq!(clock.len(), 1);
    assert_eq!(clock.get(&dev("web")), 3);
}

#[test]
fn get_unknown_device_returns_zero() {
    assert_eq!(VectorClock::new().get(&dev("nobody")), 0);
}

#[test]
fn increment_increases_time() {
    let d = dev("phone");
    let mut clock = VectorClock::new();
    assert_eq!(clock.increment(&d), 1);
    assert_eq!(clock.increment(&d), 2);
    assert_eq!(clock.get(&d), 2);
}

#[test]
fn update_never_lowers() {
    let d = dev("phone");
    let mut clock = VectorClock::new();
    clock.update(&d, 10);
    clock.update(&d, 3);
    assert_eq!(clock.get(&d), 10);
}

#[test]
fn devices_iterate_in_sorted_order() {
    let clock = clock(&[("zeta", 1), ("alpha", 2)]);
    let names: Vec<_> = clock.devices().map(|(d, _)| d.as_str().to_string()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

// ── Compare ──────────────────────────────────────────────────────

#[test]
fn compare_empty_clocks_are_equal() {
    assert_eq!(VectorClock::new().compare(&VectorClock::new()), CausalOrder::Equal);
}

#[test]
fn missing_entry_equals_zero_entry() {
    assert_eq!(clock(&[("a", 0)]), VectorClock::new());
    assert_eq!(clock(&[("a", 1), ("b", 0)]), clock(&[("a", 1)]));
}

#[test]
fn compare_before_after() {
    let a = clock(&[("a", 1)]);
    let b = clock(&[("a", 2)]);
    assert_eq!(a.compare(&b), CausalOrder::Before);
    assert_eq!(b.compare(&a), CausalOrder::After);
    assert!(a.happens_before(&b));
    assert!(b.happens_after(&a));
}

#[test]
fn unknown_device_on_other_side_counts_as_ahead() {
    let a = clock(&[("a", 1)]);
    let b = clock(&[("a", 1), ("b", 1)]);
    assert!(a.happens_before(&b));
    assert!(!b.happens_before(&a));
}

#[test]
fn compare_concurrent() {
    let a = clock(&[("a", 1)]);
    let b = clock(&[("b", 1)]);
    assert_eq!(a.compare(&b), CausalOrder::Concurrent);
    assert!(a.is_concurrent(&b));
    assert!(b.is_concurrent(&a));
    assert!(!a.happens_before(&b));
    assert!(!b.happens_before(&a));
}

#[test]
fn equal_clocks_are_not_concurrent() {
    let a = clock(&[("a", 2), ("b", 5)]);
    assert!(!a.is_concurrent(&a.clone()));
    assert!(!a.happens_before(&a.clone()));
}

#[test]
fn happens_before_is_irreflexive() {
    let a = clock(&[("device1", 1)]);
    assert!(!a.happens_before(&a));
}

#[test]
fn multiple_devices_ordering() {
    let a = clock(&[("A", 1), ("B", 1)]);
    let b = clock(&[("A", 2), ("B", 1)]);
    assert!(a.happens_before(&b));
}

#[test]
fn dominates_equal_and_after() {
    let a = clock(&[("a", 2)]);
    let b = clock(&[("a", 1)]);
    assert!(a.dominates(&b));
    assert!(a.dominates(&a.clone()));
    assert!(!b.dominates(&a));
}

#[test]
fn dominates_concurrent_neither() {
    let a = clock(&[("a", 1)]);
    let b = clock(&[("b", 1)]);
    assert!(!a.dominates(&b));
    assert!(!b.dominates(&a));
}

// ── Merge ────────────────────────────────────────────────────────

#[test]
fn merge_takes_maximum() {
    let mut a = clock(&[("p1", 2)]);
    let b = clock(&[("p1", 1), ("p2", 3)]);
    a.merge(&b);
    assert_eq!(a.get(&dev("p1")), 2);
    assert_eq!(a.get(&dev("p2")), 3);
}

#[test]
fn merged_leaves_original_unchanged() {
    let a = clock(&[("p", 1)]);
    let result = a.merged(&clock(&[("p", 4)]));
    assert_eq!(result.get(&dev("p")), 4);
    assert_eq!(a.get(&dev("p")), 1);
}

#[test]
fn merge_result_dominates_both_inputs() {
    let a = clock(&[("a", 3), ("b", 1)]);
    let b = clock(&[("b", 2), ("c", 7)]);
    let m = a.merged(&b);
    assert!(m.dominates(&a));
    assert!(m.dominates(&b));
}

// ── Serde ────────────────────────────────────────────────────────

#[test]
fn serializes_as_sorted_object() {
    let clock = clock(&[("web", 2), ("ios", 1)]);
    let json = serde_json::to_string(&clock).unwrap();
    assert_eq!(json, r#"{"ios":1,"web":2}"#);
}

#[test]
fn serialization_roundtrip() {
    let clock = clock(&[("a", 5), ("b", 9)]);
    let json = serde_json::to_string(&clock).unwrap();
    let parsed: VectorClock = serde_json::from_str(&json).unwrap();
    assert_eq!(clock, parsed);
}
