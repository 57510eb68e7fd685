//! Per-session conflict bookkeeping.
//!
//! A [`ConflictTracker`] is owned by whoever runs the sync session and is
//! passed by reference to collaborators. It is never global, so tests and
//! multiple signed-in accounts each get their own history.

use crate::conflict::Conflict;
use crate::resolution::StrategyKind;
use chrono::{DateTime, Utc};
use helix_types::ConflictId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// A conflict seen during this session and, once handled, how.
#[derive(Debug, Clone)]
pub struct TrackedConflict {
    pub id: ConflictId,
    pub conflict: Conflict,
    pub detected_at: DateTime<Utc>,
    pub resolution: Option<ResolutionRecord>,
}

impl TrackedConflict {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionRecord {
    pub strategy: StrategyKind,
    pub resolved_at: DateTime<Utc>,
}

/// Aggregate view over the tracked conflicts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictStatistics {
    pub total_conflicts: usize,
    pub resolved_conflicts: usize,
    pub unresolved_conflicts: usize,
    pub resolution_methods: BTreeMap<StrategyKind, usize>,
    /// Percentage of tracked conflicts still unresolved.
    pub conflict_rate: f64,
    /// Mean time from detection to resolution over resolved conflicts.
    pub average_resolution_time: Duration,
}

#[derive(Debug, Default)]
pub struct ConflictTracker {
    conflicts: Vec<TrackedConflict>,
}

impl ConflictTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly observed conflict and returns its id.
    pub fn track_conflict(&mut self, conflict: Conflict) -> ConflictId {
        self.track_conflict_at(conflict, Utc::now())
    }

    /// Records a conflict under a known id, e.g. one assigned by the backend.
    pub fn track_conflict_with_id(&mut self, id: ConflictId, conflict: Conflict) {
        self.push(id, conflict, Utc::now());
    }

    pub fn track_conflict_at(&mut self, conflict: Conflict, detected_at: DateTime<Utc>) -> ConflictId {
        let id = ConflictId::new();
        self.push(id, conflict, detected_at);
        id
    }

    fn push(&mut self, id: ConflictId, conflict: Conflict, detected_at: DateTime<Utc>) {
        debug!(
            "Tracking conflict {} ({:?}) on entity {}",
            id, conflict.conflict_type, conflict.local.id
        );
        self.conflicts.push(TrackedConflict {
            id,
            conflict,
            detected_at,
            resolution: None,
        });
    }

    /// Associates a resolution strategy with a tracked conflict.
    /// Returns false if `id` is unknown.
    pub fn record_resolution(&mut self, id: ConflictId, strategy: StrategyKind) -> bool {
        self.record_resolution_at(id, strategy, Utc::now())
    }

    pub fn record_resolution_at(
        &mut self,
        id: ConflictId,
        strategy: StrategyKind,
        resolved_at: DateTime<Utc>,
    ) -> bool {
        match self.conflicts.iter_mut().find(|c| c.id == id) {
            Some(tracked) => {
                tracked.resolution = Some(ResolutionRecord {
                    strategy,
                    resolved_at,
                });
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn get(&self, id: ConflictId) -> Option<&TrackedConflict> {
        self.conflicts.iter().find(|c| c.id == id)
    }

    /// Tracked conflicts in the order they were observed.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedConflict> {
        self.conflicts.iter()
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &TrackedConflict> {
        self.conflicts.iter().filter(|c| !c.is_resolved())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn clear(&mut self) {
        self.conflicts.clear();
    }

    #[must_use]
    pub fn get_statistics(&self) -> ConflictStatistics {
        let total = self.conflicts.len();
        let mut resolution_methods = BTreeMap::new();
        let mut resolved = 0usize;
        let mut elapsed_ms: i64 = 0;

        for tracked in &self.conflicts {
            let Some(resolution) = tracked.resolution else {
                continue;
            };
            resolved += 1;
            *resolution_methods.entry(resolution.strategy).or_insert(0) += 1;
            elapsed_ms += (resolution.resolved_at - tracked.detected_at)
                .num_milliseconds()
                .max(0);
        }

        let unresolved = total - resolved;
        let conflict_rate = if total == 0 {
            0.0
        } else {
            unresolved as f64 / total as f64 * 100.0
        };
        let average_resolution_time = if resolved == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis((elapsed_ms / resolved as i64) as u64)
        };

        ConflictStatistics {
            total_conflicts: total,
            resolved_conflicts: resolved,
            unresolved_conflicts: unresolved,
            resolution_methods,
            conflict_rate,
            average_resolution_time,
        }
    }
}
