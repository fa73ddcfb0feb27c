// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Team Volumes

//! Team volume aggregation -- per-member, per-calendar-month counters.
//!
//! Volume propagates up the *entire* ancestor chain (not capped at the
//! commission level limit): every ancestor's group volume grows by the
//! event amount, the direct referrer additionally books personal volume,
//! and each ancestor counts the purchaser as an active referral at most
//! once per period. Counters only ever increase within a period.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::clock::Period;
use crate::network::{self, NetworkError};
use crate::store::Store;
use crate::types::{Kwacha, MemberId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from volume aggregation.
#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error(transparent)]
    Network(#[from] NetworkError),
}

// ---------------------------------------------------------------------------
// TeamVolumePeriod
// ---------------------------------------------------------------------------

/// One member's aggregated volumes for one calendar month. Exactly one row
/// exists per (member, period); rows are created lazily on the first event
/// of the month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamVolumePeriod {
    pub member: MemberId,
    pub period: Period,
    /// Volume from direct referrals' purchases.
    pub personal_volume: Kwacha,
    /// Volume from the whole downline, direct referrals included.
    pub group_volume: Kwacha,
    /// Distinct downline members counted active this period.
    pub active_referrals: u32,
    /// `max(descendant level) - own level`, clamped to zero.
    pub team_depth: u32,
    /// Members already counted toward `active_referrals` this period.
    counted_active: BTreeSet<MemberId>,
}

impl TeamVolumePeriod {
    fn new(member: MemberId, period: Period) -> Self {
        Self {
            member,
            period,
            personal_volume: Kwacha::zero(),
            group_volume: Kwacha::zero(),
            active_referrals: 0,
            team_depth: 0,
            counted_active: BTreeSet::new(),
        }
    }

    /// Whether `who` has already been counted active this period.
    pub fn counted_active(&self, who: MemberId) -> bool {
        self.counted_active.contains(&who)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Roll one purchase into the period counters of every ancestor of the
/// purchaser. Row mutation is pure increment; re-applying a *different*
/// event accumulates, and the caller's event-level idempotency (the
/// commission engine's source-event check) prevents double application.
pub fn apply_purchase(
    store: &mut Store,
    purchaser: MemberId,
    amount: Kwacha,
    period: Period,
) -> Result<Vec<MemberId>, VolumeError> {
    // Full chain: the path is never longer than the tree depth, so resolve
    // with an effectively unbounded cap.
    let ancestors = network::resolve_ancestors(store, purchaser, u32::MAX)?;

    for &(ancestor, level) in &ancestors {
        let depth = recompute_team_depth(store, ancestor);
        let row = store
            .volume_periods
            .entry((ancestor, period))
            .or_insert_with(|| TeamVolumePeriod::new(ancestor, period));
        row.group_volume += amount;
        if level == 1 {
            row.personal_volume += amount;
        }
        if row.counted_active.insert(purchaser) {
            row.active_referrals += 1;
        }
        row.team_depth = depth;
    }

    Ok(ancestors.into_iter().map(|(id, _)| id).collect())
}

/// Depth of a member's organization: the deepest descendant's level minus
/// the member's own, zero when the member has no downline.
pub fn recompute_team_depth(store: &Store, member: MemberId) -> u32 {
    let own_level = match store.members.get(&member) {
        Some(m) => m.network_level,
        None => return 0,
    };
    store
        .descendants_of(member)
        .iter()
        .map(|d| d.network_level.saturating_sub(own_level))
        .max()
        .unwrap_or(0)
}

/// The period row for a member, if any event has created it.
pub fn period_row<'a>(
    store: &'a Store,
    member: MemberId,
    period: Period,
) -> Option<&'a TeamVolumePeriod> {
    store.volume_periods.get(&(member, period))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
