// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Type Definitions

//! Core identifier and money types shared across the compensation engine.
//!
//! Money is represented as [`Kwacha`], a thin newtype over
//! `rust_decimal::Decimal` so monetary math never touches floating point.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique member identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// External source-event identifier (caller-supplied, e.g. a payment
/// gateway reference).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        EventId(s.to_string())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compensation tier identifier. Tier 0 is the entry tier every member
/// starts in; higher ids are strictly better bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TierId(pub u32);

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.0)
    }
}

/// Stable badge code, e.g. `first-sale`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BadgeCode(pub String);

impl From<&str> for BadgeCode {
    fn from(s: &str) -> Self {
        BadgeCode(s.to_string())
    }
}

impl fmt::Display for BadgeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Kwacha
// ---------------------------------------------------------------------------

/// Kwacha denomination backed by `rust_decimal::Decimal`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Kwacha(pub Decimal);

impl Kwacha {
    /// Zero value
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from a `Decimal` value
    pub fn from_decimal(d: Decimal) -> Self {
        Self(d)
    }

    /// Whether the value is exactly zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whether the value is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Round to whole ngwee (two decimal places, midpoint away from zero).
    pub fn round_currency(&self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// `self * pct / 100`, rounded to currency precision.
    pub fn percentage(&self, pct: Decimal) -> Self {
        Self(self.0 * pct / dec!(100)).round_currency()
    }
}

impl Add for Kwacha {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Kwacha {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Kwacha {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Kwacha {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl fmt::Display for Kwacha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "K{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Member status
// ---------------------------------------------------------------------------

/// Account standing. Members are never hard-deleted; removal is a status
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    Active,
    Inactive,
    Blocked,
}

impl MemberStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

// ---------------------------------------------------------------------------
// Professional level
// ---------------------------------------------------------------------------

/// Professional progression ladder, independent of the investment tier.
/// Driven by lifetime points and network composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProLevel {
    Associate,
    Professional,
    Consultant,
    Director,
    Ambassador,
}

impl ProLevel {
    /// The next rung up, or `None` at the top of the ladder.
    pub fn next(&self) -> Option<ProLevel> {
        match self {
            Self::Associate => Some(Self::Professional),
            Self::Professional => Some(Self::Consultant),
            Self::Consultant => Some(Self::Director),
            Self::Director => Some(Self::Ambassador),
            Self::Ambassador => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Associate => "Associate",
            Self::Professional => "Professional",
            Self::Consultant => "Consultant",
            Self::Director => "Director",
            Self::Ambassador => "Ambassador",
        }
    }
}

impl fmt::Display for ProLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Event references
// ---------------------------------------------------------------------------

/// Tagged reference to the event that triggered a record. Replaces the
/// untyped (entity-type, id) pair of polymorphic associations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventRef {
    /// A package purchase, keyed by its external event id.
    Purchase(EventId),
    /// A badge grant.
    Badge(BadgeCode),
    /// A professional-level promotion.
    LevelUp(ProLevel),
    /// A tier promotion.
    TierUpgrade(TierId),
    /// Operator-initiated, no triggering event.
    Manual,
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Purchase(id) => write!(f, "purchase:{id}"),
            Self::Badge(code) => write!(f, "badge:{code}"),
            Self::LevelUp(level) => write!(f, "level-up:{level}"),
            Self::TierUpgrade(tier) => write!(f, "tier-upgrade:{tier}"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
