// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Rate Table

//! Commission rate table and the qualification gate.
//!
//! Both are pure: the rate table maps a referral level to a percentage and
//! the gate maps (member state, points account) to an eligibility boolean.
//! The gate is global per member -- a non-qualifying member earns no
//! commission at any level -- and is evaluated at payment time so it always
//! reflects the member's current standing.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::points::PointsAccount;
use crate::store::Member;

/// Maximum depth commissions can reach in the referral chain.
pub const MAX_COMMISSION_LEVELS: u32 = 7;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from rate lookup and table construction.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("level {0} outside supported range 1..={MAX_COMMISSION_LEVELS}")]
    InvalidLevel(u32),

    #[error("rate table must hold exactly {MAX_COMMISSION_LEVELS} entries, got {0}")]
    WrongLength(usize),

    #[error("rate table must be monotonically non-increasing (level {level}: {rate} > {previous})")]
    NotMonotonic {
        level: u32,
        rate: Decimal,
        previous: Decimal,
    },

    #[error("rate for level {level} out of range: {rate}")]
    RateOutOfRange { level: u32, rate: Decimal },
}

// ---------------------------------------------------------------------------
// RateTable
// ---------------------------------------------------------------------------

/// Fixed per-level commission percentages, level 1 (direct referrer) first.
///
/// Construction validates length, range and monotonicity so a lookup can
/// only fail on an out-of-range level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    rates: Vec<Decimal>,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            rates: vec![
                dec!(10),
                dec!(7),
                dec!(5),
                dec!(3),
                dec!(2),
                dec!(1.5),
                dec!(1),
            ],
        }
    }
}

impl RateTable {
    /// Build a table from percentages, level 1 first.
    pub fn new(rates: Vec<Decimal>) -> Result<Self, RateError> {
        if rates.len() != MAX_COMMISSION_LEVELS as usize {
            return Err(RateError::WrongLength(rates.len()));
        }
        let mut previous = dec!(100);
        for (i, &rate) in rates.iter().enumerate() {
            let level = i as u32 + 1;
            if rate <= Decimal::ZERO || rate > dec!(100) {
                return Err(RateError::RateOutOfRange { level, rate });
            }
            if rate > previous {
                return Err(RateError::NotMonotonic { level, rate, previous });
            }
            previous = rate;
        }
        Ok(Self { rates })
    }

    /// Percentage for a referral level (1-based).
    pub fn rate_for_level(&self, level: u32) -> Result<Decimal, RateError> {
        if level == 0 || level > MAX_COMMISSION_LEVELS {
            return Err(RateError::InvalidLevel(level));
        }
        Ok(self.rates[(level - 1) as usize])
    }

    /// Sum of the percentages for levels `1..=depth` (capped at the table).
    pub fn cumulative_rate(&self, depth: u32) -> Decimal {
        let depth = depth.min(MAX_COMMISSION_LEVELS) as usize;
        self.rates[..depth].iter().copied().sum()
    }
}

// ---------------------------------------------------------------------------
// Qualification gate
// ---------------------------------------------------------------------------

/// Whether a member is eligible to receive commission this month.
///
/// Requires active status and the current-month activity points (MAP) to
/// meet the configured requirement. A member with no points account has
/// zero MAP.
pub fn is_qualified(
    member: &Member,
    account: Option<&PointsAccount>,
    map_requirement: u64,
) -> bool {
    if !member.status.is_active() {
        return false;
    }
    let map = account.map(|a| a.monthly_points).unwrap_or(0);
    map >= map_requirement
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemberId, MemberStatus};

    fn member(status: MemberStatus) -> Member {
        let mut m = Member::root_for_test(MemberId(1));
        m.status = status;
        m
    }

    fn account(map: u64) -> PointsAccount {
        let mut a = PointsAccount::new(MemberId(1));
        a.monthly_points = map;
        a
    }

    #[test]
    fn default_table_is_valid() {
        let table = RateTable::default();
        assert_eq!(table.rate_for_level(1).expect("test: level 1"), dec!(10));
        assert_eq!(table.rate_for_level(7).expect("test: level 7"), dec!(1));
    }

    #[test]
    fn level_zero_and_beyond_table_are_errors() {
        let table = RateTable::default();
        assert!(matches!(table.rate_for_level(0), Err(RateError::InvalidLevel(0))));
        assert!(matches!(table.rate_for_level(8), Err(RateError::InvalidLevel(8))));
    }

    #[test]
    fn construction_rejects_increasing_rates() {
        let err = RateTable::new(vec![
            dec!(5),
            dec!(7),
            dec!(5),
            dec!(3),
            dec!(2),
            dec!(1.5),
            dec!(1),
        ]);
        assert!(
            matches!(err, Err(RateError::NotMonotonic { level: 2, .. })),
            "expected NotMonotonic at level 2, got {err:?}"
        );
    }

    #[test]
    fn construction_rejects_wrong_length() {
        let err = RateTable::new(vec![dec!(10), dec!(5)]);
        assert!(matches!(err, Err(RateError::WrongLength(2))));
    }

    #[test]
    fn construction_rejects_out_of_range() {
        let err = RateTable::new(vec![
            dec!(101),
            dec!(7),
            dec!(5),
            dec!(3),
            dec!(2),
            dec!(1.5),
            dec!(1),
        ]);
        assert!(matches!(err, Err(RateError::RateOutOfRange { level: 1, .. })));
    }

    #[test]
    fn cumulative_rate_caps_at_table_depth() {
        let table = RateTable::default();
        assert_eq!(table.cumulative_rate(2), dec!(17));
        assert_eq!(table.cumulative_rate(7), dec!(29.5));
        assert_eq!(table.cumulative_rate(20), dec!(29.5));
    }

    #[test]
    fn gate_requires_active_status() {
        let acct = account(500);
        assert!(is_qualified(&member(MemberStatus::Active), Some(&acct), 100));
        assert!(!is_qualified(&member(MemberStatus::Inactive), Some(&acct), 100));
        assert!(!is_qualified(&member(MemberStatus::Blocked), Some(&acct), 100));
    }

    #[test]
    fn gate_requires_monthly_points() {
        let m = member(MemberStatus::Active);
        assert!(!is_qualified(&m, Some(&account(99)), 100));
        assert!(is_qualified(&m, Some(&account(100)), 100));
        assert!(!is_qualified(&m, None, 100), "no account means zero MAP");
        assert!(is_qualified(&m, None, 0), "zero requirement always passes");
    }
}
