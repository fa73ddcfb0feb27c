// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Tier Qualification

//! Tier qualification and advancement -- the monthly state machine.
//!
//! Once per calendar month each member is evaluated against the thresholds
//! of the *next* tier above their current one (never higher -- tier
//! skipping is not permitted). A qualifying month increments the
//! consecutive-month counter, a miss resets it to zero, and reaching the
//! tier's required streak promotes the member: tier update, one-time
//! achievement bonus on the ledger, and a [`TierUpgrade`] audit record, all
//! in one atomic unit supplied by the caller's transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Period;
use crate::ledger::{self, LedgerCategory};
use crate::store::{Store, StoreError};
use crate::types::{EventRef, Kwacha, MemberId, TierId};
use crate::volume;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from tier evaluation.
#[derive(Debug, thiserror::Error)]
pub enum QualificationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("tier ladder is empty or not contiguous at {0}")]
    MalformedLadder(TierId),
}

// ---------------------------------------------------------------------------
// Tier ladder
// ---------------------------------------------------------------------------

/// One promotable tier and its thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierDef {
    pub id: TierId,
    pub name: String,
    /// Monthly group volume required to count the month as qualifying.
    pub group_volume: Kwacha,
    /// Active referrals required in the same month.
    pub active_referrals: u32,
    /// Consecutive qualifying months needed for promotion.
    pub required_streak: u32,
    /// One-time achievement bonus paid on promotion.
    pub bonus: Kwacha,
}

/// Ordered ladder of promotable tiers (tier 0, the entry tier, has no
/// thresholds and is not listed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierLadder {
    tiers: Vec<TierDef>,
}

impl TierLadder {
    /// Tiers must be contiguous starting at id 1.
    pub fn new(tiers: Vec<TierDef>) -> Result<Self, QualificationError> {
        for (i, tier) in tiers.iter().enumerate() {
            if tier.id.0 != i as u32 + 1 {
                return Err(QualificationError::MalformedLadder(tier.id));
            }
        }
        Ok(Self { tiers })
    }

    /// The single tier a member may currently be evaluated against.
    pub fn next_above(&self, current: TierId) -> Option<&TierDef> {
        self.tiers.iter().find(|t| t.id.0 == current.0 + 1)
    }

    pub fn get(&self, id: TierId) -> Option<&TierDef> {
        self.tiers.iter().find(|t| t.id == id)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One member's evaluation for one month, with thresholds snapshotted at
/// evaluation time. Exactly one row per (member, month).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierQualification {
    pub member: MemberId,
    /// The tier evaluated against (the next one above the member's).
    pub tier: TierId,
    pub month: Period,
    pub observed_volume: Kwacha,
    pub observed_referrals: u32,
    pub required_volume: Kwacha,
    pub required_referrals: u32,
    pub qualifies: bool,
    pub consecutive_months: u32,
    pub permanent: bool,
}

/// Audit record written at promotion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierUpgrade {
    pub member: MemberId,
    pub from: TierId,
    pub to: TierId,
    pub month: Period,
    pub bonus: Kwacha,
    pub at: DateTime<Utc>,
}

/// What one month's evaluation did for one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonthOutcome {
    /// A row for this month already exists; nothing re-evaluated and no
    /// second bonus posted.
    AlreadyEvaluated,
    /// Member sits at the top of the ladder.
    AtTopTier,
    /// Thresholds missed; streak reset to zero.
    NotQualifying,
    /// Thresholds met; streak now at the given count.
    Qualifying { consecutive_months: u32 },
    /// Streak reached the required length; member promoted.
    Promoted { to: TierId, bonus: Kwacha },
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate one member for one month. Idempotent per (member, month):
/// re-running returns [`MonthOutcome::AlreadyEvaluated`] without touching
/// the ledger.
pub fn evaluate_member_month(
    store: &mut Store,
    ladder: &TierLadder,
    member_id: MemberId,
    month: Period,
    now: DateTime<Utc>,
) -> Result<MonthOutcome, QualificationError> {
    if store.qualifications.contains_key(&(member_id, month)) {
        return Ok(MonthOutcome::AlreadyEvaluated);
    }

    let member = store.member(member_id)?;
    let current_tier = member.tier;
    let target = match ladder.next_above(current_tier) {
        Some(t) => t.clone(),
        None => return Ok(MonthOutcome::AtTopTier),
    };

    let (observed_volume, observed_referrals) = match volume::period_row(store, member_id, month) {
        Some(row) => (row.group_volume, row.active_referrals),
        None => (Kwacha::zero(), 0),
    };

    let qualifies =
        observed_volume >= target.group_volume && observed_referrals >= target.active_referrals;

    // Streak continuity: only a qualifying month immediately following a
    // qualifying month toward the same target extends the streak.
    let consecutive_months = if qualifies {
        match store.qualifications.get(&(member_id, month.previous())) {
            Some(prev) if prev.qualifies && prev.tier == target.id => prev.consecutive_months + 1,
            _ => 1,
        }
    } else {
        0
    };

    let promoted = qualifies && consecutive_months >= target.required_streak;

    store.qualifications.insert(
        (member_id, month),
        TierQualification {
            member: member_id,
            tier: target.id,
            month,
            observed_volume,
            observed_referrals,
            required_volume: target.group_volume,
            required_referrals: target.active_referrals,
            qualifies,
            consecutive_months,
            permanent: promoted,
        },
    );

    if promoted {
        store.member_mut(member_id)?.tier = target.id;
        ledger::post_completed(
            store,
            member_id,
            target.bonus,
            LedgerCategory::TierBonus,
            EventRef::TierUpgrade(target.id),
            now,
        );
        store.tier_upgrades.push(TierUpgrade {
            member: member_id,
            from: current_tier,
            to: target.id,
            month,
            bonus: target.bonus,
            at: now,
        });
        return Ok(MonthOutcome::Promoted { to: target.id, bonus: target.bonus });
    }

    if qualifies {
        Ok(MonthOutcome::Qualifying { consecutive_months })
    } else {
        tracing::info!(%member_id, %month, "tier thresholds not met; streak reset");
        Ok(MonthOutcome::NotQualifying)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
