// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Network Graph

//! Network graph model -- materialized ancestor paths.
//!
//! Every member carries `network_path`, the ordered ancestor chain from the
//! root of their tree down to themselves. Ancestor lookup reads the path in
//! O(depth); it never walks referrer links recursively. A missing or stale
//! path is an integrity violation repaired by [`rebuild_paths`], which is
//! idempotent and order-independent.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::store::{Store, StoreError};
use crate::types::MemberId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from ancestor resolution and path rebuilds.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stale network path for {member}: {detail}")]
    StalePath { member: MemberId, detail: String },
}

// ---------------------------------------------------------------------------
// Ancestor resolution
// ---------------------------------------------------------------------------

/// Ordered upline of a member: `(ancestor id, level)` with level 1 being
/// the direct referrer, derived purely from the materialized path.
///
/// Fails with [`NetworkError::StalePath`] if the stored path does not
/// terminate in the member's own id, does not match the stored depth, or
/// does not extend the referrer link.
pub fn resolve_ancestors(
    store: &Store,
    member_id: MemberId,
    max_levels: u32,
) -> Result<Vec<(MemberId, u32)>, NetworkError> {
    let member = store.member(member_id)?;
    validate_path(store, member_id)?;

    let path = &member.network_path;
    let ancestors = path[..path.len() - 1]
        .iter()
        .rev()
        .take(max_levels as usize)
        .enumerate()
        .map(|(i, &ancestor)| (ancestor, i as u32 + 1))
        .collect();
    Ok(ancestors)
}

/// Check the path invariants for one member without mutating anything.
pub fn validate_path(store: &Store, member_id: MemberId) -> Result<(), NetworkError> {
    let member = store.member(member_id)?;
    let path = &member.network_path;

    let stale = |detail: String| NetworkError::StalePath { member: member_id, detail };

    if path.last() != Some(&member_id) {
        return Err(stale("path does not terminate in own id".into()));
    }
    if member.network_level as usize != path.len() - 1 {
        return Err(stale(format!(
            "depth {} does not match path length {}",
            member.network_level,
            path.len()
        )));
    }
    match member.referrer {
        Some(referrer) => {
            if path.len() < 2 || path[path.len() - 2] != referrer {
                return Err(stale(format!("path does not extend referrer {referrer}")));
            }
            // The path must reference only live ancestors.
            for &ancestor in &path[..path.len() - 1] {
                if !store.members.contains_key(&ancestor) {
                    return Err(stale(format!("path references deleted ancestor {ancestor}")));
                }
            }
        }
        None => {
            if path.len() != 1 {
                return Err(stale("root member with non-trivial path".into()));
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Path rebuild
// ---------------------------------------------------------------------------

/// Outcome of a full path rebuild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Members whose path or level changed.
    pub updated: usize,
    /// Members already at their fixed-point assignment.
    pub unchanged: usize,
    /// Referrer cycles found; each is the member ids on one cycle.
    pub cycles: Vec<Vec<MemberId>>,
    /// Members unreachable from any root but not on a cycle themselves
    /// (hanging off a cycle, or with a referrer that no longer exists).
    pub skipped: Vec<MemberId>,
}

impl RebuildReport {
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.skipped.is_empty()
    }
}

/// Recompute every member's path and level top-down from the roots.
///
/// Safe to re-run at any time; two consecutive runs produce identical
/// assignments (fixed point). A referrer cycle aborts that branch: members
/// on or below the cycle keep their previous path and are reported instead.
pub fn rebuild_paths(store: &mut Store) -> RebuildReport {
    let mut children: BTreeMap<MemberId, Vec<MemberId>> = BTreeMap::new();
    let mut roots: Vec<MemberId> = Vec::new();
    for member in store.members.values() {
        match member.referrer {
            Some(parent) => children.entry(parent).or_default().push(member.id),
            None => roots.push(member.id),
        }
    }

    let mut report = RebuildReport::default();
    let mut visited: BTreeSet<MemberId> = BTreeSet::new();
    let mut queue: VecDeque<MemberId> = roots.into_iter().collect();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        let (path, level) = match store.members.get(&id).and_then(|m| m.referrer) {
            Some(parent) => {
                let parent = &store.members[&parent];
                let mut path = parent.network_path.clone();
                path.push(id);
                let level = parent.network_level + 1;
                (path, level)
            }
            None => (vec![id], 0),
        };
        let member = store.members.get_mut(&id).expect("queued member exists");
        if member.network_path == path && member.network_level == level {
            report.unchanged += 1;
        } else {
            member.network_path = path;
            member.network_level = level;
            report.updated += 1;
        }
        if let Some(kids) = children.get(&id) {
            queue.extend(kids.iter().copied());
        }
    }

    // Whatever BFS could not reach sits on a cycle, below one, or behind a
    // dangling referrer link.
    let unreached: Vec<MemberId> = store
        .members
        .keys()
        .copied()
        .filter(|id| !visited.contains(id))
        .collect();
    classify_unreached(store, &unreached, &mut report);
    report
}

fn classify_unreached(store: &Store, unreached: &[MemberId], report: &mut RebuildReport) {
    let unreached_set: BTreeSet<MemberId> = unreached.iter().copied().collect();
    let mut accounted: BTreeSet<MemberId> = BTreeSet::new();

    for &start in unreached {
        if accounted.contains(&start) {
            continue;
        }
        // Walk the referrer chain until it loops, leaves the unreached set
        // (impossible for live links), or dangles.
        let mut walk: Vec<MemberId> = Vec::new();
        let mut current = start;
        loop {
            if let Some(pos) = walk.iter().position(|&m| m == current) {
                let cycle: Vec<MemberId> = walk[pos..].to_vec();
                for &m in &walk {
                    accounted.insert(m);
                }
                for &m in &walk[..pos] {
                    report.skipped.push(m);
                }
                tracing::error!(?cycle, "referrer cycle detected; branch aborted");
                report.cycles.push(cycle);
                break;
            }
            walk.push(current);
            match store.members.get(&current).and_then(|m| m.referrer) {
                Some(next) if unreached_set.contains(&next) => {
                    if accounted.contains(&next) {
                        // Chain feeds into an already-reported cycle.
                        for &m in &walk {
                            accounted.insert(m);
                            report.skipped.push(m);
                        }
                        break;
                    }
                    current = next;
                }
                _ => {
                    // Dangling referrer: the parent id no longer exists.
                    for &m in &walk {
                        accounted.insert(m);
                        report.skipped.push(m);
                    }
                    break;
                }
            }
        }
    }
    report.skipped.sort();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
