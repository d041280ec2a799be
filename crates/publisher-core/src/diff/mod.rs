//! Diff engine: desired state vs. remote state
//!
//! Pure function from (desired record set, remote record set) to the minimal
//! operation set that reconciles remote to desired. Deterministic and
//! side-effect-free; the same inputs always yield the same [`Diff`].
//!
//! ## Matching
//!
//! Records match under their [`RecordKey`] identity (name + type, name
//! case-insensitive). For each desired record:
//!
//! - no remote match → create
//! - remote matches exist → the first encountered is the survivor; it is
//!   updated iff value/ttl/proxied/priority differ, and every later
//!   duplicate is deleted, converging toward a single canonical record per
//!   identity
//!
//! Remote records whose identity matches no desired record are orphans:
//! deleted when `delete_orphans` is set, left alone otherwise.

use std::collections::{HashMap, HashSet};

use crate::record::{DesiredRecord, RecordKey, RemoteRecord};

/// An update operation: overwrite the remote record `id` with `desired`
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    /// Provider-assigned ID of the record being overwritten
    pub id: String,
    /// The state the record should have
    pub desired: DesiredRecord,
}

/// The minimal operation set bridging remote state to desired state
///
/// Invariant: applying a `Diff` to the remote set it was computed from
/// yields a set equal to the desired set under identity comparison, modulo
/// ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    /// Desired records with no remote counterpart
    pub to_create: Vec<DesiredRecord>,
    /// Remote records whose content differs from their desired counterpart
    pub to_update: Vec<RecordUpdate>,
    /// Remote records to remove: duplicates and (optionally) orphans
    pub to_delete: Vec<RemoteRecord>,
    /// Desired records already satisfied by remote state
    pub unchanged: usize,
}

impl Diff {
    /// Whether the diff contains no operations
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of operations in the diff
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Compute the diff between a desired record set and a remote record set
///
/// Tie-break rule: when multiple remote records share one identity, the
/// first encountered (in remote listing order) is kept as the canonical
/// record and the remainder are marked for deletion.
pub fn diff(desired: &[DesiredRecord], remote: &[RemoteRecord], delete_orphans: bool) -> Diff {
    // Group remote records by identity, preserving listing order within
    // each group so the survivor rule is deterministic.
    let mut remote_by_key: HashMap<RecordKey, Vec<&RemoteRecord>> = HashMap::new();
    for record in remote {
        remote_by_key.entry(record.key()).or_default().push(record);
    }

    let desired_keys: HashSet<RecordKey> = desired.iter().map(|r| r.key()).collect();

    let mut result = Diff::default();

    for want in desired {
        match remote_by_key.get(&want.key()) {
            None => result.to_create.push(want.clone()),
            Some(matches) => {
                // matches is non-empty by construction
                let survivor = matches[0];
                if survivor.satisfies(want) {
                    result.unchanged += 1;
                } else {
                    result.to_update.push(RecordUpdate {
                        id: survivor.id.clone(),
                        desired: want.clone(),
                    });
                }
                for duplicate in &matches[1..] {
                    result.to_delete.push((*duplicate).clone());
                }
            }
        }
    }

    if delete_orphans {
        for record in remote {
            if !desired_keys.contains(&record.key()) {
                result.to_delete.push(record.clone());
            }
        }
    }

    result
}
