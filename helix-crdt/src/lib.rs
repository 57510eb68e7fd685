//! Causality tracking for Helix sync.
//!
//! - [`VectorClock`]: device-id → counter map with the causal-order algebra
//! - [`CausalOrder`]: result of comparing two clocks
//! - [`VectorClockManager`]: per-session table of device clocks
//!
//! Clock merge satisfies the usual join-semilattice laws:
//! - **Commutative**: merge(a, b) == merge(b, a)
//! - **Associative**: merge(merge(a, b), c) == merge(a, merge(b, c))
//! - **Idempotent**: merge(a, a) == a
//!
//! These properties let every device converge on the same causal view of a
//! record regardless of the order in which updates arrive.

mod clock_manager;
mod vector_clock;

pub use clock_manager::VectorClockManager;
pub use vector_clock::{CausalOrder, VectorClock};
