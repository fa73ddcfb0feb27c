// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Configuration

//! Engine configuration -- every tunable in one injected value.
//!
//! There is no ambient global configuration: the engine receives an
//! [`EngineConfig`] at construction and exposes an explicit replacement
//! call as its cache-invalidation contract. Defaults model the production
//! compensation plan.

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::ledger::BalancePolicy;
use crate::points::{
    BadgeCriterion, BadgeDef, LevelDef, LevelLadder, MultiplierSchedule,
};
use crate::qualification::{QualificationError, TierDef, TierLadder};
use crate::rates::{RateError, RateTable};
use crate::types::{BadgeCode, Kwacha, MemberId, ProLevel, TierId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Rates(#[from] RateError),

    #[error(transparent)]
    Ladder(#[from] QualificationError),

    #[error(transparent)]
    Ledger(#[from] crate::ledger::LedgerError),
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub rates: RateTable,
    pub tiers: TierLadder,
    pub levels: LevelLadder,
    pub badges: Vec<BadgeDef>,
    pub multiplier_schedule: MultiplierSchedule,
    pub balance_policy: BalancePolicy,
    /// Monthly activity points needed to qualify for commission and count
    /// toward streaks.
    pub map_requirement: u64,
    /// Registrations without a referrer attach here (no ambient global).
    pub default_sponsor: Option<MemberId>,
    /// LP granted per whole kwacha of own purchase volume.
    pub purchase_lp_rate: rust_decimal::Decimal,
    /// MAP granted per whole kwacha of own purchase volume.
    pub purchase_map_rate: rust_decimal::Decimal,
    /// Flat LP/MAP for completing a course.
    pub course_lp: u64,
    pub course_map: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rates: RateTable::default(),
            tiers: default_tier_ladder(),
            levels: default_level_ladder(),
            badges: default_badges(),
            multiplier_schedule: MultiplierSchedule::default(),
            balance_policy: BalancePolicy::default(),
            map_requirement: 100,
            default_sponsor: None,
            purchase_lp_rate: dec!(0.2),
            purchase_map_rate: dec!(0.2),
            course_lp: 50,
            course_map: 25,
        }
    }
}

impl EngineConfig {
    /// Check the cross-cutting invariants once, at injection time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.balance_policy.validate()?;
        Ok(())
    }
}

fn default_tier_ladder() -> TierLadder {
    TierLadder::new(vec![
        TierDef {
            id: TierId(1),
            name: "Bronze".into(),
            group_volume: Kwacha(dec!(5000)),
            active_referrals: 3,
            required_streak: 2,
            bonus: Kwacha(dec!(500)),
        },
        TierDef {
            id: TierId(2),
            name: "Silver".into(),
            group_volume: Kwacha(dec!(20000)),
            active_referrals: 5,
            required_streak: 3,
            bonus: Kwacha(dec!(2000)),
        },
        TierDef {
            id: TierId(3),
            name: "Gold".into(),
            group_volume: Kwacha(dec!(75000)),
            active_referrals: 10,
            required_streak: 3,
            bonus: Kwacha(dec!(7500)),
        },
        TierDef {
            id: TierId(4),
            name: "Platinum".into(),
            group_volume: Kwacha(dec!(200000)),
            active_referrals: 20,
            required_streak: 4,
            bonus: Kwacha(dec!(20000)),
        },
        TierDef {
            id: TierId(5),
            name: "Elite".into(),
            group_volume: Kwacha(dec!(500000)),
            active_referrals: 40,
            required_streak: 6,
            bonus: Kwacha(dec!(60000)),
        },
    ])
    .expect("default tier ladder is contiguous")
}

fn default_level_ladder() -> LevelLadder {
    LevelLadder {
        levels: vec![
            LevelDef {
                level: ProLevel::Professional,
                lifetime_points: 1000,
                min_account_age_days: 30,
                direct_referrals: 3,
                active_referrals: 1,
                completed_courses: 1,
                downline_at_level: None,
                bonus_cash: Kwacha(dec!(250)),
                bonus_lp: 100,
                referrer_award_lp: 25,
            },
            LevelDef {
                level: ProLevel::Consultant,
                lifetime_points: 5000,
                min_account_age_days: 90,
                direct_referrals: 5,
                active_referrals: 3,
                completed_courses: 3,
                downline_at_level: None,
                bonus_cash: Kwacha(dec!(1000)),
                bonus_lp: 300,
                referrer_award_lp: 50,
            },
            LevelDef {
                level: ProLevel::Director,
                lifetime_points: 15000,
                min_account_age_days: 180,
                direct_referrals: 10,
                active_referrals: 5,
                completed_courses: 5,
                downline_at_level: Some(ProLevel::Professional),
                bonus_cash: Kwacha(dec!(5000)),
                bonus_lp: 1000,
                referrer_award_lp: 100,
            },
            LevelDef {
                level: ProLevel::Ambassador,
                lifetime_points: 50000,
                min_account_age_days: 365,
                direct_referrals: 20,
                active_referrals: 10,
                completed_courses: 8,
                downline_at_level: Some(ProLevel::Director),
                bonus_cash: Kwacha(dec!(25000)),
                bonus_lp: 5000,
                referrer_award_lp: 250,
            },
        ],
    }
}

fn default_badges() -> Vec<BadgeDef> {
    vec![
        BadgeDef {
            code: BadgeCode::from("first-sale"),
            name: "First Sale".into(),
            lp_award: 100,
            map_award: 50,
            criterion: BadgeCriterion::FirstSale,
        },
        BadgeDef {
            code: BadgeCode::from("team-of-ten"),
            name: "Team of Ten".into(),
            lp_award: 500,
            map_award: 100,
            criterion: BadgeCriterion::NetworkSize(10),
        },
        BadgeDef {
            code: BadgeCode::from("scholar"),
            name: "Scholar".into(),
            lp_award: 300,
            map_award: 0,
            criterion: BadgeCriterion::CoursesCompleted(5),
        },
        BadgeDef {
            code: BadgeCode::from("half-year-streak"),
            name: "Half-Year Streak".into(),
            lp_award: 750,
            map_award: 0,
            criterion: BadgeCriterion::StreakMonths(6),
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
