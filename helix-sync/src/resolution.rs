//! Conflict resolution strategies.
//!
//! [`resolve_conflict`] is pure: it never performs I/O and never mutates
//! its inputs. The resolved entity carries the merge of both sides' vector
//! clocks so that it causally supersedes either version.

use crate::conflict::{find_conflicted_fields, Conflict};
use crate::error::ResolutionError;
use helix_model::{FieldMap, FieldValue, SyncMeta, SyncableEntity};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Strategy tag without its inputs, used for bookkeeping and config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    LastWriteWins,
    ThreeWayMerge,
    SetUnion,
    Manual,
}

/// How to resolve a conflict. Each variant carries exactly what it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionStrategy {
    /// The later write wins in full.
    LastWriteWins,
    /// Field-level merge against the common ancestor.
    ThreeWayMerge { ancestor: SyncableEntity },
    /// Union list fields, keep local scalars.
    SetUnion,
    /// Hand the conflict to a human.
    Manual,
}

impl ResolutionStrategy {
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            ResolutionStrategy::LastWriteWins => StrategyKind::LastWriteWins,
            ResolutionStrategy::ThreeWayMerge { .. } => StrategyKind::ThreeWayMerge,
            ResolutionStrategy::SetUnion => StrategyKind::SetUnion,
            ResolutionStrategy::Manual => StrategyKind::Manual,
        }
    }

    /// Three-way merge using the ancestor recorded on `conflict`.
    pub fn three_way_merge_for(conflict: &Conflict) -> Result<Self, ResolutionError> {
        conflict
            .common_ancestor
            .clone()
            .map(|ancestor| ResolutionStrategy::ThreeWayMerge { ancestor })
            .ok_or(ResolutionError::MissingAncestor)
    }

    /// Builds a strategy from its tag, pulling the ancestor off `conflict`
    /// when the tag needs one.
    pub fn from_kind(kind: StrategyKind, conflict: &Conflict) -> Result<Self, ResolutionError> {
        match kind {
            StrategyKind::LastWriteWins => Ok(ResolutionStrategy::LastWriteWins),
            StrategyKind::ThreeWayMerge => Self::three_way_merge_for(conflict),
            StrategyKind::SetUnion => Ok(ResolutionStrategy::SetUnion),
            StrategyKind::Manual => Ok(ResolutionStrategy::Manual),
        }
    }
}

/// Resolves `conflict` with `strategy`.
///
/// `Manual` always fails with [`ResolutionError::ManualResolutionRequired`]
/// carrying the conflict unchanged.
pub fn resolve_conflict(
    conflict: &Conflict,
    strategy: &ResolutionStrategy,
) -> Result<SyncableEntity, ResolutionError> {
    match strategy {
        ResolutionStrategy::LastWriteWins => Ok(last_write_wins(&conflict.local, &conflict.remote)),
        ResolutionStrategy::ThreeWayMerge { ancestor } => {
            Ok(three_way_merge(&conflict.local, &conflict.remote, ancestor))
        }
        ResolutionStrategy::SetUnion => Ok(set_union(&conflict.local, &conflict.remote)),
        ResolutionStrategy::Manual => Err(ResolutionError::ManualResolutionRequired {
            conflict: Box::new(conflict.clone()),
        }),
    }
}

/// Orders two versions by recency, with a total tie-break so every device
/// picks the same winner: timestamp, then platform tag, then content hash.
fn recency(a: &SyncableEntity, b: &SyncableEntity) -> Ordering {
    a.sync_meta
        .last_modified_at
        .cmp(&b.sync_meta.last_modified_at)
        .then_with(|| {
            a.sync_meta
                .last_modified_device
                .as_str()
                .cmp(b.sync_meta.last_modified_device.as_str())
        })
        .then_with(|| a.content_hash().cmp(b.content_hash()))
}

fn resolved_meta(local: &SyncableEntity, remote: &SyncableEntity, has_conflict: bool) -> SyncMeta {
    let newer = if recency(remote, local) == Ordering::Less {
        local
    } else {
        remote
    };
    let mut meta = newer.sync_meta.clone();
    meta.vector_clock = local
        .sync_meta
        .vector_clock
        .merged(&remote.sync_meta.vector_clock);
    meta.has_conflict = has_conflict;
    meta
}

fn last_write_wins(local: &SyncableEntity, remote: &SyncableEntity) -> SyncableEntity {
    let winner = if recency(remote, local) == Ordering::Less {
        local
    } else {
        remote
    };
    let mut resolved = winner.clone();
    resolved.sync_meta = resolved_meta(local, remote, false);
    resolved
}

/// Starts from the ancestor, applies each side's non-conflicting edits and
/// takes the remote value for every truly conflicted field.
///
/// Picking remote on conflict is a recency-biased simplification, not a
/// correctness guarantee; `has_conflict` stays set so audits can see that a
/// tie-break happened.
fn three_way_merge(
    local: &SyncableEntity,
    remote: &SyncableEntity,
    ancestor: &SyncableEntity,
) -> SyncableEntity {
    let conflicted = find_conflicted_fields(local, remote, Some(ancestor));
    let mut data = ancestor.data().clone();

    apply_side(&mut data, local, ancestor, &conflicted);
    apply_side(&mut data, remote, ancestor, &conflicted);

    for field in &conflicted {
        match remote.get(field) {
            Some(value) => {
                data.insert(field.clone(), value.clone());
            }
            None => {
                data.remove(field);
            }
        }
    }

    let meta = resolved_meta(local, remote, !conflicted.is_empty());
    SyncableEntity::new(local.id, local.entity_type, data, meta)
}

/// Overlays one side's edits relative to the ancestor, including removals.
fn apply_side(
    data: &mut FieldMap,
    side: &SyncableEntity,
    ancestor: &SyncableEntity,
    conflicted: &BTreeSet<String>,
) {
    for (key, value) in side.data() {
        if !conflicted.contains(key) && ancestor.get(key) != Some(value) {
            data.insert(key.clone(), value.clone());
        }
    }
    for key in ancestor.data().keys() {
        if !conflicted.contains(key) && side.get(key).is_none() {
            data.remove(key);
        }
    }
}

/// Unions list fields (local order first, no duplicates) and keeps local
/// values for everything else. Remote-only fields are added.
///
/// A scalar edited on the remote side is dropped in favour of local.
fn set_union(local: &SyncableEntity, remote: &SyncableEntity) -> SyncableEntity {
    let mut data = local.data().clone();

    for (key, remote_value) in remote.data() {
        let Some(local_value) = data.get_mut(key) else {
            data.insert(key.clone(), remote_value.clone());
            continue;
        };
        if let (FieldValue::List(items), FieldValue::List(remote_items)) = (local_value, remote_value) {
            let mut merged: Vec<FieldValue> = Vec::with_capacity(items.len() + remote_items.len());
            for item in items.iter().chain(remote_items) {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            *items = merged;
        }
    }

    let meta = resolved_meta(local, remote, false);
    SyncableEntity::new(local.id, local.entity_type, data, meta)
}

/// Where each field of a merged record came from. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub total_fields: usize,
    /// Local and remote agreed.
    pub unchanged_fields: usize,
    pub local_fields_kept: usize,
    pub remote_fields_taken: usize,
    /// Value matches neither side (e.g. a list union).
    pub merged_fields: usize,
    /// Present on an input but absent from the result.
    pub dropped_fields: usize,
}

#[must_use]
pub fn calculate_merge_stats(
    local: &SyncableEntity,
    remote: &SyncableEntity,
    merged: &SyncableEntity,
) -> MergeStats {
    let mut stats = MergeStats {
        total_fields: merged.data().len(),
        ..MergeStats::default()
    };

    for (key, value) in merged.data() {
        let from_local = local.get(key) == Some(value);
        let from_remote = remote.get(key) == Some(value);
        match (from_local, from_remote) {
            (true, true) => stats.unchanged_fields += 1,
            (true, false) => stats.local_fields_kept += 1,
            (false, true) => stats.remote_fields_taken += 1,
            (false, false) => stats.merged_fields += 1,
        }
    }

    let inputs: BTreeSet<&String> = local.data().keys().chain(remote.data().keys()).collect();
    stats.dropped_fields = inputs
        .into_iter()
        .filter(|key| !merged.data().contains_key(*key))
        .count();

    stats
}
