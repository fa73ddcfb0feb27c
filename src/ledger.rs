// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Ledger & Balances

//! Append-only ledger and balance derivation.
//!
//! A member's spendable balance is always derived by summing completed
//! ledger entries (plus explicitly enumerated legacy pre-ledger sources).
//! No mutable balance counter exists anywhere that could drift from the
//! entries. Corrections are new offsetting entries; completed entries are
//! never edited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::store::Store;
use crate::types::{EventRef, Kwacha, MemberId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from balance policy validation.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("category {0:?} appears in both earnings and expenses")]
    CategoryOverlap(LedgerCategory),

    #[error("category {0:?} is neither excluded nor assigned to a breakdown bucket")]
    CategoryUnassigned(LedgerCategory),
}

// ---------------------------------------------------------------------------
// Entry types
// ---------------------------------------------------------------------------

/// Category tag on a ledger entry. The balance policy partitions these into
/// earnings and expenses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum LedgerCategory {
    /// Multi-level referral commission.
    Commission,
    /// One-time tier achievement bonus.
    TierBonus,
    /// Professional-level milestone bonus.
    LevelBonus,
    /// Money returned to the member.
    Refund,
    /// Package purchase by the member.
    Purchase,
    /// Withdrawal to an external account.
    Withdrawal,
    /// Operator correction (offsetting entry).
    Adjustment,
}

impl LedgerCategory {
    pub const ALL: [LedgerCategory; 7] = [
        Self::Commission,
        Self::TierBonus,
        Self::LevelBonus,
        Self::Refund,
        Self::Purchase,
        Self::Withdrawal,
        Self::Adjustment,
    ];
}

/// Settlement state of an entry. Only `Completed` entries count toward the
/// balance; an entry is immutable once completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Pending,
    Completed,
    Failed,
}

/// One immutable signed monetary record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub member: MemberId,
    /// Signed amount: positive credits the member, negative debits.
    pub amount: Kwacha,
    pub category: LedgerCategory,
    pub status: EntryStatus,
    pub reference: EventRef,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Append an already-settled entry and return its id.
pub fn post_completed(
    store: &mut Store,
    member: MemberId,
    amount: Kwacha,
    category: LedgerCategory,
    reference: EventRef,
    now: DateTime<Utc>,
) -> u64 {
    let id = store.allocate_entry_id();
    store.ledger.push(LedgerEntry {
        id,
        member,
        amount,
        category,
        status: EntryStatus::Completed,
        reference,
        created_at: now,
        completed_at: Some(now),
    });
    id
}

// ---------------------------------------------------------------------------
// Legacy sources
// ---------------------------------------------------------------------------

/// A pre-ledger balance source imported at migration time, enumerated per
/// category so the breakdown can place it in the right bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacySource {
    pub member: MemberId,
    pub category: LedgerCategory,
    pub amount: Kwacha,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Balance policy
// ---------------------------------------------------------------------------

/// Partition of ledger categories into earnings and expenses, with an
/// optional excluded set that never counts toward the balance.
///
/// [`validate`](Self::validate) enforces that the buckets are disjoint and
/// that their union covers every non-excluded category exactly, so the
/// breakdown always reconstructs the overall balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancePolicy {
    pub excluded: BTreeSet<LedgerCategory>,
    pub earnings: BTreeSet<LedgerCategory>,
    pub expenses: BTreeSet<LedgerCategory>,
}

impl Default for BalancePolicy {
    fn default() -> Self {
        Self {
            excluded: BTreeSet::new(),
            earnings: [
                LedgerCategory::Commission,
                LedgerCategory::TierBonus,
                LedgerCategory::LevelBonus,
                LedgerCategory::Refund,
            ]
            .into_iter()
            .collect(),
            expenses: [
                LedgerCategory::Purchase,
                LedgerCategory::Withdrawal,
                LedgerCategory::Adjustment,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl BalancePolicy {
    /// Check the disjoint-and-exhaustive invariant.
    pub fn validate(&self) -> Result<(), LedgerError> {
        for category in LedgerCategory::ALL {
            let in_earnings = self.earnings.contains(&category);
            let in_expenses = self.expenses.contains(&category);
            if in_earnings && in_expenses {
                return Err(LedgerError::CategoryOverlap(category));
            }
            if !self.excluded.contains(&category) && !in_earnings && !in_expenses {
                return Err(LedgerError::CategoryUnassigned(category));
            }
        }
        Ok(())
    }

    fn counts(&self, category: LedgerCategory) -> bool {
        !self.excluded.contains(&category)
    }
}

// ---------------------------------------------------------------------------
// Balance derivation
// ---------------------------------------------------------------------------

/// Category-level breakdown of a member's balance. `earnings + expenses`
/// always equals [`balance`] for the same policy (expenses carry their
/// natural negative sign).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBreakdown {
    pub earnings: Kwacha,
    pub expenses: Kwacha,
    pub total: Kwacha,
}

/// Derive a member's spendable balance by replaying the ledger. Pure; safe
/// to call concurrently and repeatedly.
pub fn balance(store: &Store, member: MemberId, policy: &BalancePolicy) -> Kwacha {
    let entries: Kwacha = store
        .ledger
        .iter()
        .filter(|e| {
            e.member == member && e.status == EntryStatus::Completed && policy.counts(e.category)
        })
        .map(|e| e.amount)
        .fold(Kwacha::zero(), |acc, a| acc + a);

    let legacy: Kwacha = store
        .legacy_sources
        .iter()
        .filter(|s| s.member == member && policy.counts(s.category))
        .map(|s| s.amount)
        .fold(Kwacha::zero(), |acc, a| acc + a);

    entries + legacy
}

/// Earnings/expenses breakdown over the same entries [`balance`] sums.
pub fn breakdown(store: &Store, member: MemberId, policy: &BalancePolicy) -> BalanceBreakdown {
    let mut earnings = Kwacha::zero();
    let mut expenses = Kwacha::zero();

    let mut bucket = |category: LedgerCategory, amount: Kwacha| {
        if !policy.counts(category) {
            return;
        }
        if policy.earnings.contains(&category) {
            earnings += amount;
        } else if policy.expenses.contains(&category) {
            expenses += amount;
        }
    };

    for entry in &store.ledger {
        if entry.member == member && entry.status == EntryStatus::Completed {
            bucket(entry.category, entry.amount);
        }
    }
    for source in &store.legacy_sources {
        if source.member == member {
            bucket(source.category, source.amount);
        }
    }

    BalanceBreakdown { earnings, expenses, total: earnings + expenses }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
