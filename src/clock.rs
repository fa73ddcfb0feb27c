// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Time & Periods

//! Time source abstraction and calendar-month period arithmetic.
//!
//! All monthly batch logic depends on a single [`Clock`] being consistent
//! for the duration of a run; tests pin time with [`FixedClock`].

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current timestamp. Injected at engine construction;
/// nothing in the engine reads the system clock directly.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The calendar-month period containing "now".
    fn current_period(&self) -> Period {
        Period::containing(self.now())
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Pinned time for tests and replays. `set` advances (or rewinds) the
/// reported instant.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    /// Pin to midnight UTC on the given date.
    pub fn at_date(year: i32, month: u32, day: u32) -> Self {
        let now = Utc
            .with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::new(now)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn set_date(&self, year: i32, month: u32, day: u32) {
        if let Some(now) = Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single() {
            self.set(now);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|g| *g).unwrap_or_else(|_| Utc::now())
    }
}

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

/// A calendar month, the aggregation window for volumes, qualification and
/// points resets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Period {
    pub year: i32,
    /// 1-based calendar month.
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month));
        Self { year, month }
    }

    /// The period containing the given instant.
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self { year: at.year(), month: at.month() }
    }

    /// First instant of the month.
    pub fn start(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .expect("first of month is always a valid instant")
    }

    /// First instant of the following month (exclusive end bound).
    pub fn end(&self) -> DateTime<Utc> {
        self.next().start()
    }

    pub fn next(&self) -> Period {
        if self.month == 12 {
            Period { year: self.year + 1, month: 1 }
        } else {
            Period { year: self.year, month: self.month + 1 }
        }
    }

    pub fn previous(&self) -> Period {
        if self.month == 1 {
            Period { year: self.year - 1, month: 12 }
        } else {
            Period { year: self.year, month: self.month - 1 }
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start() && at < self.end()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_rollover_at_year_boundary() {
        let dec = Period::new(2026, 12);
        assert_eq!(dec.next(), Period::new(2027, 1));
        assert_eq!(Period::new(2027, 1).previous(), dec);
    }

    #[test]
    fn period_bounds_are_half_open() {
        let p = Period::new(2026, 8);
        assert!(p.contains(p.start()));
        assert!(!p.contains(p.end()));
        assert_eq!(p.end(), Period::new(2026, 9).start());
    }

    #[test]
    fn fixed_clock_reports_pinned_period() {
        let clock = FixedClock::at_date(2026, 8, 15);
        assert_eq!(clock.current_period(), Period::new(2026, 8));

        clock.set_date(2026, 9, 1);
        assert_eq!(clock.current_period(), Period::new(2026, 9));
    }

    #[test]
    fn period_display() {
        assert_eq!(Period::new(2026, 3).to_string(), "2026-03");
    }
}
