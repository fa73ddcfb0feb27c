// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Data Store

//! In-memory transactional data store.
//!
//! Stands in for the single consistent database the engine assumes. All
//! collections are plain ordered maps so iteration is deterministic; the
//! engine achieves atomic units of work by cloning the store before a
//! mutation sequence and restoring the clone on failure (see
//! `CompEngine::in_transaction`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::clock::Period;
use crate::commission::CommissionRecord;
use crate::ledger::{LedgerEntry, LegacySource};
use crate::points::{MonthlyPointsArchive, PointTransaction, PointsAccount};
use crate::qualification::{TierQualification, TierUpgrade};
use crate::types::{BadgeCode, EventId, MemberId, MemberStatus, ProLevel, TierId};
use crate::volume::TeamVolumePeriod;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from store lookups.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown member {0}")]
    UnknownMember(MemberId),
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

/// A member of the referral network.
///
/// `network_path` is the materialized ancestor chain, root first and always
/// terminating in the member's own id; `network_level` is its length minus
/// one. The path is the only supported ancestor representation -- a stale
/// path is an integrity violation repaired by a rebuild, never recomputed
/// on the fly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub referrer: Option<MemberId>,
    pub network_path: Vec<MemberId>,
    pub network_level: u32,
    pub status: MemberStatus,
    pub tier: TierId,
    pub pro_level: ProLevel,
    pub joined_at: DateTime<Utc>,
    pub completed_courses: u32,
}

impl Member {
    pub fn new(
        id: MemberId,
        name: impl Into<String>,
        referrer: Option<&Member>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        let (network_path, network_level) = match referrer {
            Some(parent) => {
                let mut path = parent.network_path.clone();
                path.push(id);
                let level = parent.network_level + 1;
                (path, level)
            }
            None => (vec![id], 0),
        };
        Self {
            id,
            name: name.into(),
            referrer: referrer.map(|r| r.id),
            network_path,
            network_level,
            status: MemberStatus::Active,
            tier: TierId(0),
            pro_level: ProLevel::Associate,
            joined_at,
            completed_courses: 0,
        }
    }

    /// Age of the account in whole days at `now`.
    pub fn account_age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.joined_at).num_days()
    }

    #[cfg(test)]
    pub(crate) fn root_for_test(id: MemberId) -> Self {
        Self::new(id, format!("member-{}", id.0), None, Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Every collection the compensation engine reads or writes.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub members: BTreeMap<MemberId, Member>,
    pub commissions: Vec<CommissionRecord>,
    pub volume_periods: BTreeMap<(MemberId, Period), TeamVolumePeriod>,
    pub qualifications: BTreeMap<(MemberId, Period), TierQualification>,
    pub tier_upgrades: Vec<TierUpgrade>,
    pub points_accounts: BTreeMap<MemberId, PointsAccount>,
    pub point_transactions: Vec<PointTransaction>,
    pub points_archives: BTreeMap<(MemberId, Period), MonthlyPointsArchive>,
    pub ledger: Vec<LedgerEntry>,
    pub badges: BTreeMap<MemberId, BTreeSet<BadgeCode>>,
    /// Event ids that completed the full purchase pipeline, including
    /// events that produced zero commission records.
    pub processed_events: BTreeSet<EventId>,
    pub legacy_sources: Vec<LegacySource>,
    next_member_id: u64,
    next_entry_id: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_member_id(&mut self) -> MemberId {
        self.next_member_id += 1;
        MemberId(self.next_member_id)
    }

    /// Monotonic id for ledger entries, commissions and point transactions.
    pub fn allocate_entry_id(&mut self) -> u64 {
        self.next_entry_id += 1;
        self.next_entry_id
    }

    pub fn member(&self, id: MemberId) -> Result<&Member, StoreError> {
        self.members.get(&id).ok_or(StoreError::UnknownMember(id))
    }

    pub fn member_mut(&mut self, id: MemberId) -> Result<&mut Member, StoreError> {
        self.members.get_mut(&id).ok_or(StoreError::UnknownMember(id))
    }

    pub fn insert_member(&mut self, member: Member) {
        self.members.insert(member.id, member);
    }

    /// Members whose direct referrer is `id`.
    pub fn direct_referrals(&self, id: MemberId) -> Vec<&Member> {
        self.members
            .values()
            .filter(|m| m.referrer == Some(id))
            .collect()
    }

    /// Members whose materialized path passes through `id` (excluding the
    /// member itself).
    pub fn descendants_of(&self, id: MemberId) -> Vec<&Member> {
        self.members
            .values()
            .filter(|m| m.id != id && m.network_path.contains(&id))
            .collect()
    }

    /// Commission records created for a source event.
    pub fn commissions_for_event(&self, event: &EventId) -> Vec<&CommissionRecord> {
        self.commissions
            .iter()
            .filter(|c| &c.source_event == event)
            .collect()
    }

    pub fn has_badge(&self, member: MemberId, code: &BadgeCode) -> bool {
        self.badges
            .get(&member)
            .map(|set| set.contains(code))
            .unwrap_or(false)
    }

    /// Record a badge grant; returns false if the member already held it.
    pub fn grant_badge(&mut self, member: MemberId, code: BadgeCode) -> bool {
        self.badges.entry(member).or_default().insert(code)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
