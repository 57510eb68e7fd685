//! Conflict detection.
//!
//! Conflicts are data, not errors: every function here is pure and returns
//! `Option<Conflict>` or a plain value. Resolution lives in
//! [`crate::resolution`].

use helix_crdt::VectorClock;
use helix_model::{FieldValue, SyncableEntity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Why two versions of a record were flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// The two clocks are concurrent.
    ConcurrentModification,
    /// Clocks are ordered but the writes were based on different versions.
    VersionMismatch,
    /// Both sides changed the same fields away from the common ancestor.
    FieldConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Warning,
    Critical,
}

/// Two divergent versions of the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    pub local: SyncableEntity,
    pub remote: SyncableEntity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_ancestor: Option<SyncableEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicted_fields: Option<BTreeSet<String>>,
    pub severity: ConflictSeverity,
}

impl Conflict {
    /// Conflicted fields, recomputed from the versions if not recorded.
    #[must_use]
    pub fn fields(&self) -> BTreeSet<String> {
        match &self.conflicted_fields {
            Some(fields) => fields.clone(),
            None => find_conflicted_fields(
                &self.local,
                &self.remote,
                self.common_ancestor.as_ref(),
            ),
        }
    }
}

/// True iff neither clock dominates the other. Equal clocks are not
/// concurrent: they describe the same observed history.
#[must_use]
pub fn is_clock_concurrent(local: &VectorClock, remote: &VectorClock) -> bool {
    local.is_concurrent(remote)
}

/// True iff every entry of `c1` is ≤ the one in `c2` and at least one is
/// strictly less.
#[must_use]
pub fn happens_before(c1: &VectorClock, c2: &VectorClock) -> bool {
    c1.happens_before(c2)
}

/// Classifies the relationship between a local and a remote version.
///
/// Returns `None` when the content is identical or when one side causally
/// dominates the other; the caller should then simply adopt the dominant
/// side.
#[must_use]
pub fn detect_conflict(
    local: &SyncableEntity,
    remote: &SyncableEntity,
    ancestor: Option<&SyncableEntity>,
) -> Option<Conflict> {
    if local.content_hash() == remote.content_hash() {
        return None;
    }

    let (conflict_type, severity) =
        if is_clock_concurrent(&local.sync_meta.vector_clock, &remote.sync_meta.vector_clock) {
            (ConflictType::ConcurrentModification, ConflictSeverity::Critical)
        } else if local.sync_meta.parent_version != remote.sync_meta.parent_version {
            (ConflictType::VersionMismatch, ConflictSeverity::Warning)
        } else {
            return None;
        };

    Some(Conflict {
        conflict_type,
        local: local.clone(),
        remote: remote.clone(),
        common_ancestor: ancestor.cloned(),
        conflicted_fields: Some(find_conflicted_fields(local, remote, ancestor)),
        severity,
    })
}

/// Reports a [`ConflictType::FieldConflict`] when both sides moved the same
/// fields away from `ancestor` to different values.
///
/// Meant for rows whose clocks carry no signal (for example rows written by
/// a backend job rather than a device), where [`detect_conflict`] finds
/// nothing.
#[must_use]
pub fn detect_field_conflict(
    local: &SyncableEntity,
    remote: &SyncableEntity,
    ancestor: &SyncableEntity,
) -> Option<Conflict> {
    if local.content_hash() == remote.content_hash() {
        return None;
    }

    let fields = find_conflicted_fields(local, remote, Some(ancestor));
    if fields.is_empty() {
        return None;
    }

    Some(Conflict {
        conflict_type: ConflictType::FieldConflict,
        local: local.clone(),
        remote: remote.clone(),
        common_ancestor: Some(ancestor.clone()),
        conflicted_fields: Some(fields),
        severity: ConflictSeverity::Warning,
    })
}

/// Fields on which the two versions disagree.
///
/// With an ancestor a field is conflicted only on a true three-way
/// divergence: both sides differ from the ancestor and from each other.
/// Without one, any difference counts. An absent field is distinct from an
/// explicit `Null`.
#[must_use]
pub fn find_conflicted_fields(
    local: &SyncableEntity,
    remote: &SyncableEntity,
    ancestor: Option<&SyncableEntity>,
) -> BTreeSet<String> {
    let mut keys: BTreeSet<&String> = local.data().keys().chain(remote.data().keys()).collect();
    if let Some(base) = ancestor {
        keys.extend(base.data().keys());
    }

    keys.into_iter()
        .filter(|key| {
            let l: Option<&FieldValue> = local.get(key);
            let r: Option<&FieldValue> = remote.get(key);
            match ancestor {
                Some(base) => {
                    let a = base.get(key);
                    l != a && r != a && l != r
                }
                None => l != r,
            }
        })
        .cloned()
        .collect()
}
