//! Property-based tests for the vector clock algebra.
//!
//! Merge must be a semilattice join (commutative, associative, idempotent)
//! and the causal order must be a strict partial order.

use helix_crdt::{CausalOrder, VectorClock, VectorClockManager};
use helix_types::DeviceId;
use proptest::prelude::*;

fn clock_strategy() -> impl Strategy<Value = VectorClock> {
    prop::collection::vec((0usize..5, 0u64..20), 0..8).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(d, t)| (DeviceId::new(format!("device-{d}")), t))
            .collect()
    })
}

proptest! {
    #[test]
    fn merge_is_commutative(a in clock_strategy(), b in clock_strategy()) {
        prop_assert_eq!(
            VectorClockManager::merge_clock(&a, &b),
            VectorClockManager::merge_clock(&b, &a)
        );
    }

    #[test]
    fn merge_is_associative(
        a in clock_strategy(),
        b in clock_strategy(),
        c in clock_strategy(),
    ) {
        prop_assert_eq!(a.merged(&b).merged(&c), a.merged(&b.merged(&c)));
    }

    #[test]
    fn merge_absorbs(a in clock_strategy(), b in clock_strategy()) {
        let ab = VectorClockManager::merge_clock(&a, &b);
        prop_assert_eq!(VectorClockManager::merge_clock(&a, &ab), ab.clone());
        prop_assert_eq!(a.merged(&a), a);
    }

    #[test]
    fn clock_is_never_concurrent_with_itself(a in clock_strategy()) {
        prop_assert!(!a.is_concurrent(&a));
        prop_assert_eq!(a.compare(&a), CausalOrder::Equal);
    }

    #[test]
    fn happens_before_is_asymmetric(a in clock_strategy(), b in clock_strategy()) {
        prop_assert!(!(a.happens_before(&b) && b.happens_before(&a)));
    }

    #[test]
    fn compare_is_antisymmetric(a in clock_strategy(), b in clock_strategy()) {
        let expected = match a.compare(&b) {
            CausalOrder::Before => CausalOrder::After,
            CausalOrder::After => CausalOrder::Before,
            other => other,
        };
        prop_assert_eq!(b.compare(&a), expected);
    }

    #[test]
    fn increment_moves_strictly_forward(a in clock_strategy(), d in 0usize..5) {
        let device = DeviceId::new(format!("device-{d}"));
        let mut next = a.clone();
        next.increment(&device);
        prop_assert!(a.happens_before(&next));
    }
}
