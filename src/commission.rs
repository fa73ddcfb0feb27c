// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Commission Distribution

//! Commission distribution -- paying the upline for a package purchase.
//!
//! For one monetary event the engine walks at most seven ancestor levels,
//! applies the qualification gate at payment time, and creates exactly one
//! commission record per qualifying (referrer, level), paying it and
//! appending the matching ledger entry in the same unit of work. The whole
//! distribution is atomic per event: the caller wraps it in a store
//! transaction, and re-processing an already-distributed event id is a
//! no-op by construction (checked before any record is created).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{self, LedgerCategory};
use crate::network::{self, NetworkError};
use crate::rates::{self, RateError, RateTable, MAX_COMMISSION_LEVELS};
use crate::store::{Store, StoreError};
use crate::types::{EventId, EventRef, Kwacha, MemberId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from commission distribution.
#[derive(Debug, thiserror::Error)]
pub enum CommissionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Rate(#[from] RateError),

    #[error("purchase amount must be positive, got {0}")]
    NonPositiveAmount(Kwacha),

    #[error("duplicate commission for event {event} / referrer {referrer} / level {level}")]
    Duplicate {
        event: EventId,
        referrer: MemberId,
        level: u32,
    },
}

// ---------------------------------------------------------------------------
// CommissionRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommissionStatus {
    Pending,
    /// Terminal.
    Paid,
}

/// Origin of a commission record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommissionKind {
    /// Multi-level referral share of a package purchase.
    Referral,
    /// Operator-issued correction.
    ManualAdjustment,
}

/// One referrer's share of one source event at one level. At most one
/// record may exist per (source event, referrer, level); the amount is
/// fixed at creation and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub id: u64,
    pub referrer: MemberId,
    pub referred: MemberId,
    pub source_event: EventId,
    pub level: u32,
    pub amount: Kwacha,
    pub percentage: Decimal,
    pub status: CommissionStatus,
    pub kind: CommissionKind,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Distribution outcome
// ---------------------------------------------------------------------------

/// A level skipped because the gate did not pass -- a normal no-effect
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLevel {
    pub member: MemberId,
    pub level: u32,
}

/// Result of distributing one source event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionOutcome {
    pub event: EventId,
    /// True when the event was already processed and nothing new was
    /// created.
    pub already_processed: bool,
    pub commissions_created: u32,
    pub total_paid: Kwacha,
    pub skipped: Vec<SkippedLevel>,
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// Distribute commissions for one purchase up the referral chain.
///
/// Caller is responsible for the surrounding transaction boundary and for
/// invoking the volume aggregator afterwards.
pub fn distribute(
    store: &mut Store,
    rates: &RateTable,
    map_requirement: u64,
    purchaser: MemberId,
    amount: Kwacha,
    event: EventId,
    now: DateTime<Utc>,
) -> Result<DistributionOutcome, CommissionError> {
    if !amount.is_positive() {
        return Err(CommissionError::NonPositiveAmount(amount));
    }

    // Idempotence: an event that already produced records is a no-op.
    let existing = store.commissions_for_event(&event);
    if !existing.is_empty() {
        let total_paid = existing
            .iter()
            .map(|c| c.amount)
            .fold(Kwacha::zero(), |acc, a| acc + a);
        let commissions_created = existing.len() as u32;
        tracing::info!(%event, "event already distributed; skipping");
        return Ok(DistributionOutcome {
            event,
            already_processed: true,
            commissions_created,
            total_paid,
            skipped: Vec::new(),
        });
    }

    let ancestors = network::resolve_ancestors(store, purchaser, MAX_COMMISSION_LEVELS)?;

    let mut outcome = DistributionOutcome {
        event: event.clone(),
        already_processed: false,
        commissions_created: 0,
        total_paid: Kwacha::zero(),
        skipped: Vec::new(),
    };

    for (ancestor, level) in ancestors {
        // Gate evaluated at payment time, against current standing.
        let member = store.member(ancestor)?;
        let account = store.points_accounts.get(&ancestor);
        if !rates::is_qualified(member, account, map_requirement) {
            tracing::info!(%ancestor, level, "not qualified; no commission at any level");
            outcome.skipped.push(SkippedLevel { member: ancestor, level });
            continue;
        }

        if store
            .commissions
            .iter()
            .any(|c| c.source_event == event && c.referrer == ancestor && c.level == level)
        {
            return Err(CommissionError::Duplicate { event, referrer: ancestor, level });
        }

        let percentage = rates.rate_for_level(level)?;
        let commission = amount.percentage(percentage);

        let id = store.allocate_entry_id();
        let mut record = CommissionRecord {
            id,
            referrer: ancestor,
            referred: purchaser,
            source_event: event.clone(),
            level,
            amount: commission,
            percentage,
            status: CommissionStatus::Pending,
            kind: CommissionKind::Referral,
            created_at: now,
            paid_at: None,
        };

        // Immediate payment: pending -> paid plus the ledger entry, in the
        // same unit of work.
        record.status = CommissionStatus::Paid;
        record.paid_at = Some(now);
        store.commissions.push(record);
        ledger::post_completed(
            store,
            ancestor,
            commission,
            LedgerCategory::Commission,
            EventRef::Purchase(event.clone()),
            now,
        );

        outcome.commissions_created += 1;
        outcome.total_paid += commission;
    }

    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{balance, BalancePolicy};
    use crate::points::PointsAccount;
    use crate::store::Member;
    use crate::types::MemberStatus;
    use rust_decimal_macros::dec;

    fn k(n: i64) -> Kwacha {
        Kwacha(Decimal::from(n))
    }

    /// Chain 1 <- 2 <- 3 <- 4 (4 is the purchaser), all with enough MAP.
    fn qualified_chain() -> Store {
        let mut store = Store::new();
        let root = Member::root_for_test(MemberId(1));
        let a = Member::new(MemberId(2), "a", Some(&root), Utc::now());
        let b = Member::new(MemberId(3), "b", Some(&a), Utc::now());
        let c = Member::new(MemberId(4), "c", Some(&b), Utc::now());
        for m in [root, a, b, c] {
            let mut account = PointsAccount::new(m.id);
            account.monthly_points = 500;
            store.points_accounts.insert(m.id, account);
            store.insert_member(m);
        }
        store
    }

    #[test]
    fn k500_level_one_scenario() {
        let mut store = qualified_chain();
        let rates = RateTable::default();
        let outcome = distribute(
            &mut store,
            &rates,
            100,
            MemberId(4),
            k(500),
            EventId::from("evt-1"),
            Utc::now(),
        )
        .expect("test: distribute");

        assert!(!outcome.already_processed);
        assert_eq!(outcome.commissions_created, 3);

        let level1: Vec<_> = store
            .commissions
            .iter()
            .filter(|c| c.referrer == MemberId(3) && c.level == 1)
            .collect();
        assert_eq!(level1.len(), 1, "exactly one record for the direct referrer");
        let record = level1[0];
        assert_eq!(record.percentage, dec!(10));
        assert_eq!(record.amount, Kwacha(dec!(50.00)));
        assert_eq!(record.status, CommissionStatus::Paid);
        assert_eq!(record.referred, MemberId(4));

        // Matching ledger entry for the same amount.
        assert_eq!(
            balance(&store, MemberId(3), &BalancePolicy::default()),
            Kwacha(dec!(50.00))
        );
    }

    #[test]
    fn sum_matches_cumulative_rate() {
        let mut store = qualified_chain();
        let rates = RateTable::default();
        let outcome = distribute(
            &mut store,
            &rates,
            100,
            MemberId(4),
            k(1000),
            EventId::from("evt-2"),
            Utc::now(),
        )
        .expect("test: distribute");

        // 3 qualifying ancestors: 10% + 7% + 5% of 1000.
        assert_eq!(outcome.total_paid, Kwacha(dec!(220.00)));
    }

    #[test]
    fn redistribution_is_a_no_op() {
        let mut store = qualified_chain();
        let rates = RateTable::default();
        let event = EventId::from("evt-3");
        let first = distribute(
            &mut store,
            &rates,
            100,
            MemberId(4),
            k(500),
            event.clone(),
            Utc::now(),
        )
        .expect("test: first");
        let record_count = store.commissions.len();

        let second = distribute(
            &mut store,
            &rates,
            100,
            MemberId(4),
            k(500),
            event,
            Utc::now(),
        )
        .expect("test: second");

        assert!(second.already_processed);
        assert_eq!(store.commissions.len(), record_count, "no duplicates created");
        assert_eq!(second.total_paid, first.total_paid);
        assert_eq!(second.commissions_created, first.commissions_created);
    }

    #[test]
    fn unqualified_ancestor_is_skipped_entirely() {
        let mut store = qualified_chain();
        // Member 2 loses qualification: inactive status.
        store.members.get_mut(&MemberId(2)).unwrap().status = MemberStatus::Inactive;
        let rates = RateTable::default();
        let outcome = distribute(
            &mut store,
            &rates,
            100,
            MemberId(4),
            k(500),
            EventId::from("evt-4"),
            Utc::now(),
        )
        .expect("test: distribute");

        assert_eq!(outcome.commissions_created, 2);
        assert_eq!(outcome.skipped, vec![SkippedLevel { member: MemberId(2), level: 2 }]);
        assert!(
            !store.commissions.iter().any(|c| c.referrer == MemberId(2)),
            "skipped member gets no record at any level"
        );
        // Levels keep their positions: member 1 still earns the level-3 rate.
        let root_record = store
            .commissions
            .iter()
            .find(|c| c.referrer == MemberId(1))
            .expect("root record");
        assert_eq!(root_record.level, 3);
        assert_eq!(root_record.percentage, dec!(5));
    }

    #[test]
    fn low_map_blocks_commission() {
        let mut store = qualified_chain();
        store.points_accounts.get_mut(&MemberId(3)).unwrap().monthly_points = 10;
        let rates = RateTable::default();
        let outcome = distribute(
            &mut store,
            &rates,
            100,
            MemberId(4),
            k(500),
            EventId::from("evt-5"),
            Utc::now(),
        )
        .expect("test: distribute");

        assert!(outcome
            .skipped
            .contains(&SkippedLevel { member: MemberId(3), level: 1 }));
    }

    #[test]
    fn non_positive_amount_rejected_before_mutation() {
        let mut store = qualified_chain();
        let rates = RateTable::default();
        let err = distribute(
            &mut store,
            &rates,
            100,
            MemberId(4),
            Kwacha::zero(),
            EventId::from("evt-6"),
            Utc::now(),
        );
        assert!(matches!(err, Err(CommissionError::NonPositiveAmount(_))));
        assert!(store.commissions.is_empty());
        assert!(store.ledger.is_empty());
    }

    #[test]
    fn amounts_are_fixed_at_creation() {
        let mut store = qualified_chain();
        let rates = RateTable::default();
        distribute(
            &mut store,
            &rates,
            100,
            MemberId(4),
            Kwacha(dec!(333.33)),
            EventId::from("evt-7"),
            Utc::now(),
        )
        .expect("test: distribute");

        for record in &store.commissions {
            assert_eq!(
                record.amount,
                Kwacha(dec!(333.33)).percentage(record.percentage),
                "amount == eventAmount * percentage / 100 at creation"
            );
        }
    }
}
