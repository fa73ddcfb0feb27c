// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine - Points & Levels

//! Dual-currency points engine and professional level progression.
//!
//! Lifetime points (LP) accumulate forever; monthly activity points (MAP)
//! reset each calendar month and gate commission qualification. Every
//! award flows through the account's streak-derived multiplier and lands as
//! an immutable [`PointTransaction`], so account totals are always
//! reproducible by replaying non-reversed transactions. Awards trigger two
//! independent side checks: badge eligibility and professional-level
//! advancement (a ladder separate from the investment tier).

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::clock::Period;
use crate::ledger::{self, LedgerCategory};
use crate::store::{Store, StoreError};
use crate::types::{BadgeCode, EventRef, Kwacha, MemberId, ProLevel};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from point awards and the monthly reset.
#[derive(Debug, thiserror::Error)]
pub enum PointsError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Account & transactions
// ---------------------------------------------------------------------------

/// A member's points balances. Created lazily on the first award.
///
/// `multiplier` is a pure function of `current_streak` (see
/// [`MultiplierSchedule`]); it is recomputed at each monthly reset, never
/// set independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsAccount {
    pub member: MemberId,
    pub lifetime_points: u64,
    pub monthly_points: u64,
    pub previous_month_points: u64,
    /// Mean MAP over the last three archived months.
    pub rolling_average: u64,
    /// Consecutive qualified months, as of the last reset.
    pub current_streak: u32,
    pub longest_streak: u32,
    pub multiplier: Decimal,
    pub last_activity: Option<DateTime<Utc>>,
}

impl PointsAccount {
    pub fn new(member: MemberId) -> Self {
        Self {
            member,
            lifetime_points: 0,
            monthly_points: 0,
            previous_month_points: 0,
            rolling_average: 0,
            current_streak: 0,
            longest_streak: 0,
            multiplier: Decimal::ONE,
            last_activity: None,
        }
    }
}

/// Where a point award came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointSource {
    Purchase,
    Badge,
    LevelMilestone,
    /// Smaller award to the referrer when a direct downline advances.
    DownlineAdvance,
    CourseCompletion,
    Manual,
}

/// Immutable record of one point grant (post-multiplier amounts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointTransaction {
    pub id: u64,
    pub member: MemberId,
    pub source: PointSource,
    pub lp: u64,
    pub map: u64,
    pub multiplier: Decimal,
    pub reference: EventRef,
    pub at: DateTime<Utc>,
    pub reversed: bool,
}

/// Archived MAP total for one closed month. Unique per (member, month);
/// the uniqueness is what makes the monthly reset re-runnable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyPointsArchive {
    pub member: MemberId,
    pub month: Period,
    pub map_total: u64,
    pub qualified: bool,
    pub archived_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Multiplier schedule
// ---------------------------------------------------------------------------

/// Streak-length thresholds mapping to multipliers (≥ 1.0). The multiplier
/// for a streak is the entry with the largest threshold not exceeding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiplierSchedule {
    /// (minimum streak months, multiplier), ascending by threshold.
    pub steps: Vec<(u32, Decimal)>,
}

impl Default for MultiplierSchedule {
    fn default() -> Self {
        Self {
            steps: vec![
                (0, dec!(1.0)),
                (3, dec!(1.1)),
                (6, dec!(1.25)),
                (12, dec!(1.5)),
            ],
        }
    }
}

impl MultiplierSchedule {
    pub fn multiplier_for(&self, streak: u32) -> Decimal {
        self.steps
            .iter()
            .rev()
            .find(|(min, _)| streak >= *min)
            .map(|(_, m)| *m)
            .unwrap_or(Decimal::ONE)
    }
}

// ---------------------------------------------------------------------------
// Badges
// ---------------------------------------------------------------------------

/// Cumulative milestone a badge unlocks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BadgeCriterion {
    /// First level-1 commission earned (first sale by a direct referral).
    FirstSale,
    /// Total downline size reached the threshold.
    NetworkSize(u32),
    /// Completed-course count reached the threshold.
    CoursesCompleted(u32),
    /// Qualification streak reached the threshold (months).
    StreakMonths(u32),
}

/// One unlockable achievement. Granting is idempotent per (member, code).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeDef {
    pub code: BadgeCode,
    pub name: String,
    pub lp_award: u64,
    pub map_award: u64,
    pub criterion: BadgeCriterion,
}

// ---------------------------------------------------------------------------
// Professional level ladder
// ---------------------------------------------------------------------------

/// Requirements and rewards for one rung of the professional ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDef {
    pub level: ProLevel,
    pub lifetime_points: u64,
    pub min_account_age_days: i64,
    pub direct_referrals: u32,
    /// Direct referrals meeting the MAP requirement this month.
    pub active_referrals: u32,
    pub completed_courses: u32,
    /// For the upper rungs: at least one direct downline must have reached
    /// this level.
    pub downline_at_level: Option<ProLevel>,
    pub bonus_cash: Kwacha,
    pub bonus_lp: u64,
    /// LP awarded to the advancing member's referrer.
    pub referrer_award_lp: u64,
}

/// Requirement set per advancement target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelLadder {
    pub levels: Vec<LevelDef>,
}

impl LevelLadder {
    pub fn requirements_for(&self, level: ProLevel) -> Option<&LevelDef> {
        self.levels.iter().find(|l| l.level == level)
    }
}

// ---------------------------------------------------------------------------
// Award context & results
// ---------------------------------------------------------------------------

/// Configuration slice the points engine needs for one award.
#[derive(Debug, Clone, Copy)]
pub struct AwardContext<'a> {
    pub schedule: &'a MultiplierSchedule,
    pub badges: &'a [BadgeDef],
    pub levels: &'a LevelLadder,
    pub map_requirement: u64,
}

/// A professional-level promotion that fired during an award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelPromotion {
    pub member: MemberId,
    pub to: ProLevel,
    pub bonus_cash: Kwacha,
    pub bonus_lp: u64,
    /// The referrer who received the downline-advanced award, if any.
    pub notified_referrer: Option<MemberId>,
}

/// What one award did, side effects included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardResult {
    pub lp_granted: u64,
    pub map_granted: u64,
    pub multiplier: Decimal,
    pub badges_granted: Vec<BadgeCode>,
    pub level_up: Option<LevelPromotion>,
}

// ---------------------------------------------------------------------------
// Awarding
// ---------------------------------------------------------------------------

/// Grant points to a member and run the badge and level side checks.
///
/// Both amounts are scaled by the account's current multiplier and rounded
/// to whole points. Caller supplies the transaction boundary.
pub fn award_points(
    store: &mut Store,
    ctx: AwardContext<'_>,
    member: MemberId,
    source: PointSource,
    lp: u64,
    map: u64,
    reference: EventRef,
    now: DateTime<Utc>,
) -> Result<AwardResult, PointsError> {
    store.member(member)?;
    let (lp_granted, map_granted, multiplier) =
        grant(store, member, source, lp, map, reference, now);

    let badges_granted = evaluate_badges(store, ctx, member, now)?;
    let level_up = evaluate_level(store, ctx, member, now)?;

    Ok(AwardResult { lp_granted, map_granted, multiplier, badges_granted, level_up })
}

/// Append one point transaction and bump the account totals. No side
/// checks; badge and level rewards use this directly so a grant can never
/// re-enter its own evaluation.
fn grant(
    store: &mut Store,
    member: MemberId,
    source: PointSource,
    lp: u64,
    map: u64,
    reference: EventRef,
    now: DateTime<Utc>,
) -> (u64, u64, Decimal) {
    let account = store
        .points_accounts
        .entry(member)
        .or_insert_with(|| PointsAccount::new(member));
    let multiplier = account.multiplier;
    let lp_granted = scale(lp, multiplier);
    let map_granted = scale(map, multiplier);

    account.lifetime_points += lp_granted;
    account.monthly_points += map_granted;
    account.last_activity = Some(now);

    let id = store.allocate_entry_id();
    store.point_transactions.push(PointTransaction {
        id,
        member,
        source,
        lp: lp_granted,
        map: map_granted,
        multiplier,
        reference,
        at: now,
        reversed: false,
    });
    (lp_granted, map_granted, multiplier)
}

fn scale(amount: u64, multiplier: Decimal) -> u64 {
    (Decimal::from(amount) * multiplier)
        .round()
        .to_u64()
        .unwrap_or(amount)
}

// ---------------------------------------------------------------------------
// Badge evaluation
// ---------------------------------------------------------------------------

fn criterion_met(store: &Store, member: MemberId, criterion: &BadgeCriterion) -> bool {
    match criterion {
        BadgeCriterion::FirstSale => store
            .commissions
            .iter()
            .any(|c| c.referrer == member && c.level == 1),
        BadgeCriterion::NetworkSize(n) => store.descendants_of(member).len() >= *n as usize,
        BadgeCriterion::CoursesCompleted(n) => store
            .members
            .get(&member)
            .map(|m| m.completed_courses >= *n)
            .unwrap_or(false),
        BadgeCriterion::StreakMonths(n) => store
            .points_accounts
            .get(&member)
            .map(|a| a.current_streak >= *n)
            .unwrap_or(false),
    }
}

/// Grant every newly-earned badge. Re-evaluation never re-grants a held
/// badge, and each grant is itself a (side-check-free) point award.
pub fn evaluate_badges(
    store: &mut Store,
    ctx: AwardContext<'_>,
    member: MemberId,
    now: DateTime<Utc>,
) -> Result<Vec<BadgeCode>, PointsError> {
    let mut granted = Vec::new();
    for def in ctx.badges {
        if store.has_badge(member, &def.code) {
            continue;
        }
        if !criterion_met(store, member, &def.criterion) {
            continue;
        }
        store.grant_badge(member, def.code.clone());
        grant(
            store,
            member,
            PointSource::Badge,
            def.lp_award,
            def.map_award,
            EventRef::Badge(def.code.clone()),
            now,
        );
        tracing::info!(%member, badge = %def.code, "badge granted");
        granted.push(def.code.clone());
    }
    Ok(granted)
}

// ---------------------------------------------------------------------------
// Level evaluation
// ---------------------------------------------------------------------------

fn level_requirements_met(
    store: &Store,
    ctx: AwardContext<'_>,
    member: &crate::store::Member,
    req: &LevelDef,
    now: DateTime<Utc>,
) -> bool {
    let account = match store.points_accounts.get(&member.id) {
        Some(a) => a,
        None => return false,
    };
    if account.lifetime_points < req.lifetime_points {
        return false;
    }
    if member.account_age_days(now) < req.min_account_age_days {
        return false;
    }
    let direct = store.direct_referrals(member.id);
    if (direct.len() as u32) < req.direct_referrals {
        return false;
    }
    let active = direct
        .iter()
        .filter(|m| {
            store
                .points_accounts
                .get(&m.id)
                .map(|a| a.monthly_points >= ctx.map_requirement)
                .unwrap_or(false)
        })
        .count() as u32;
    if active < req.active_referrals {
        return false;
    }
    if member.completed_courses < req.completed_courses {
        return false;
    }
    if let Some(required_level) = req.downline_at_level {
        if !direct.iter().any(|m| m.pro_level >= required_level) {
            return false;
        }
    }
    true
}

/// Advance the member at most one rung if the next level's requirements
/// are met. Pays the milestone bonus (cash + points) atomically with the
/// level change and awards the referrer the downline-advanced points.
pub fn evaluate_level(
    store: &mut Store,
    ctx: AwardContext<'_>,
    member_id: MemberId,
    now: DateTime<Utc>,
) -> Result<Option<LevelPromotion>, PointsError> {
    let member = store.member(member_id)?.clone();
    let next = match member.pro_level.next() {
        Some(next) => next,
        None => return Ok(None),
    };
    let req = match ctx.levels.requirements_for(next) {
        Some(req) => req.clone(),
        None => return Ok(None),
    };
    if !level_requirements_met(store, ctx, &member, &req, now) {
        return Ok(None);
    }

    store.member_mut(member_id)?.pro_level = next;
    if req.bonus_cash.is_positive() {
        ledger::post_completed(
            store,
            member_id,
            req.bonus_cash,
            LedgerCategory::LevelBonus,
            EventRef::LevelUp(next),
            now,
        );
    }
    if req.bonus_lp > 0 {
        grant(
            store,
            member_id,
            PointSource::LevelMilestone,
            req.bonus_lp,
            0,
            EventRef::LevelUp(next),
            now,
        );
    }

    let notified_referrer = member.referrer.filter(|_| req.referrer_award_lp > 0);
    if let Some(referrer) = notified_referrer {
        if store.members.contains_key(&referrer) {
            grant(
                store,
                referrer,
                PointSource::DownlineAdvance,
                req.referrer_award_lp,
                0,
                EventRef::LevelUp(next),
                now,
            );
        }
    }

    tracing::info!(%member_id, level = %next, "professional level advanced");
    Ok(Some(LevelPromotion {
        member: member_id,
        to: next,
        bonus_cash: req.bonus_cash,
        bonus_lp: req.bonus_lp,
        notified_referrer,
    }))
}

// ---------------------------------------------------------------------------
// Monthly reset
// ---------------------------------------------------------------------------

/// Outcome of closing one member's month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetOutcome {
    /// No points account exists; nothing to archive.
    NoAccount,
    /// An archive row for this month already exists; untouched.
    AlreadyArchived,
    Archived {
        qualified: bool,
        streak: u32,
        multiplier: Decimal,
    },
}

/// Close `month` for one member: archive the MAP total and qualification
/// outcome, zero the monthly counter, update the streak and recompute the
/// multiplier from it. Re-runnable: the unique (member, month) archive row
/// guards against double application.
pub fn reset_member_month(
    store: &mut Store,
    schedule: &MultiplierSchedule,
    map_requirement: u64,
    member: MemberId,
    month: Period,
    now: DateTime<Utc>,
) -> Result<ResetOutcome, PointsError> {
    if store.points_archives.contains_key(&(member, month)) {
        return Ok(ResetOutcome::AlreadyArchived);
    }
    if !store.points_accounts.contains_key(&member) {
        return Ok(ResetOutcome::NoAccount);
    }

    let (map_total, qualified) = {
        let account = &store.points_accounts[&member];
        (account.monthly_points, account.monthly_points >= map_requirement)
    };
    store.points_archives.insert(
        (member, month),
        MonthlyPointsArchive { member, month, map_total, qualified, archived_at: now },
    );

    // Rolling average over the last three archived months, this one
    // included.
    let mut recent = Vec::with_capacity(3);
    let mut m = month;
    for _ in 0..3 {
        if let Some(archive) = store.points_archives.get(&(member, m)) {
            recent.push(archive.map_total);
        }
        m = m.previous();
    }
    let rolling_average = recent.iter().sum::<u64>() / recent.len().max(1) as u64;

    let account = store
        .points_accounts
        .get_mut(&member)
        .expect("account checked above");
    account.previous_month_points = map_total;
    account.monthly_points = 0;
    account.rolling_average = rolling_average;
    if qualified {
        account.current_streak += 1;
        account.longest_streak = account.longest_streak.max(account.current_streak);
    } else {
        account.current_streak = 0;
    }
    account.multiplier = schedule.multiplier_for(account.current_streak);
    let streak = account.current_streak;
    let multiplier = account.multiplier;

    Ok(ResetOutcome::Archived { qualified, streak, multiplier })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Member;
    use crate::types::EventId;

    fn ctx<'a>(
        schedule: &'a MultiplierSchedule,
        badges: &'a [BadgeDef],
        levels: &'a LevelLadder,
    ) -> AwardContext<'a> {
        AwardContext { schedule, badges, levels, map_requirement: 100 }
    }

    fn empty_ladder() -> LevelLadder {
        LevelLadder::default()
    }

    fn store_with_member() -> Store {
        let mut store = Store::new();
        store.insert_member(Member::root_for_test(MemberId(1)));
        store
    }

    #[test]
    fn award_applies_multiplier_and_appends_transaction() {
        let mut store = store_with_member();
        let schedule = MultiplierSchedule::default();
        let levels = empty_ladder();
        store
            .points_accounts
            .insert(MemberId(1), PointsAccount::new(MemberId(1)));
        store.points_accounts.get_mut(&MemberId(1)).unwrap().multiplier = dec!(1.25);

        let result = award_points(
            &mut store,
            ctx(&schedule, &[], &levels),
            MemberId(1),
            PointSource::Purchase,
            100,
            50,
            EventRef::Purchase(EventId::from("e1")),
            Utc::now(),
        )
        .expect("test: award");

        assert_eq!(result.lp_granted, 125);
        assert_eq!(result.map_granted, 63, "62.5 rounds to 63");
        let account = &store.points_accounts[&MemberId(1)];
        assert_eq!(account.lifetime_points, 125);
        assert_eq!(account.monthly_points, 63);
        assert_eq!(store.point_transactions.len(), 1);
        assert_eq!(store.point_transactions[0].multiplier, dec!(1.25));
    }

    #[test]
    fn account_totals_replayable_from_transactions() {
        let mut store = store_with_member();
        let schedule = MultiplierSchedule::default();
        let levels = empty_ladder();
        for i in 0..5u64 {
            award_points(
                &mut store,
                ctx(&schedule, &[], &levels),
                MemberId(1),
                PointSource::Manual,
                10 * i,
                5 * i,
                EventRef::Manual,
                Utc::now(),
            )
            .expect("test: award");
        }
        let account = &store.points_accounts[&MemberId(1)];
        let lp_sum: u64 = store
            .point_transactions
            .iter()
            .filter(|t| t.member == MemberId(1) && !t.reversed)
            .map(|t| t.lp)
            .sum();
        assert_eq!(account.lifetime_points, lp_sum);
    }

    #[test]
    fn multiplier_schedule_steps() {
        let schedule = MultiplierSchedule::default();
        assert_eq!(schedule.multiplier_for(0), dec!(1.0));
        assert_eq!(schedule.multiplier_for(2), dec!(1.0));
        assert_eq!(schedule.multiplier_for(3), dec!(1.1));
        assert_eq!(schedule.multiplier_for(7), dec!(1.25));
        assert_eq!(schedule.multiplier_for(24), dec!(1.5));
    }

    #[test]
    fn badge_granted_once_and_awards_points() {
        let mut store = store_with_member();
        let schedule = MultiplierSchedule::default();
        let levels = empty_ladder();
        let badges = vec![BadgeDef {
            code: BadgeCode::from("course-starter"),
            name: "Course Starter".into(),
            lp_award: 200,
            map_award: 0,
            criterion: BadgeCriterion::CoursesCompleted(1),
        }];
        store.members.get_mut(&MemberId(1)).unwrap().completed_courses = 1;

        let first = award_points(
            &mut store,
            ctx(&schedule, &badges, &levels),
            MemberId(1),
            PointSource::CourseCompletion,
            10,
            10,
            EventRef::Manual,
            Utc::now(),
        )
        .expect("test: first award");
        assert_eq!(first.badges_granted, vec![BadgeCode::from("course-starter")]);

        let second = award_points(
            &mut store,
            ctx(&schedule, &badges, &levels),
            MemberId(1),
            PointSource::Manual,
            10,
            10,
            EventRef::Manual,
            Utc::now(),
        )
        .expect("test: second award");
        assert!(second.badges_granted.is_empty(), "held badge never re-granted");

        // 10 + 200 (badge) + 10 lifetime points.
        assert_eq!(store.points_accounts[&MemberId(1)].lifetime_points, 220);
        let badge_txns: Vec<_> = store
            .point_transactions
            .iter()
            .filter(|t| t.source == PointSource::Badge)
            .collect();
        assert_eq!(badge_txns.len(), 1);
    }

    #[test]
    fn level_advances_at_most_one_rung() {
        let mut store = store_with_member();
        let root = store.members[&MemberId(1)].clone();
        for i in 2..=4u64 {
            let m = Member::new(MemberId(i), format!("m{i}"), Some(&root), Utc::now());
            let mut account = PointsAccount::new(m.id);
            account.monthly_points = 500;
            store.points_accounts.insert(m.id, account);
            store.insert_member(m);
        }
        // Backdate the root so age requirements pass.
        store.members.get_mut(&MemberId(1)).unwrap().joined_at =
            Utc::now() - chrono::Duration::days(400);

        let schedule = MultiplierSchedule::default();
        let levels = LevelLadder {
            levels: vec![
                LevelDef {
                    level: ProLevel::Professional,
                    lifetime_points: 100,
                    min_account_age_days: 30,
                    direct_referrals: 3,
                    active_referrals: 1,
                    completed_courses: 0,
                    downline_at_level: None,
                    bonus_cash: Kwacha(dec!(100)),
                    bonus_lp: 50,
                    referrer_award_lp: 10,
                },
                LevelDef {
                    level: ProLevel::Consultant,
                    lifetime_points: 150,
                    min_account_age_days: 30,
                    direct_referrals: 3,
                    active_referrals: 1,
                    completed_courses: 0,
                    downline_at_level: None,
                    bonus_cash: Kwacha(dec!(500)),
                    bonus_lp: 100,
                    referrer_award_lp: 20,
                },
            ],
        };

        // One award large enough to satisfy both rungs' LP requirements.
        let result = award_points(
            &mut store,
            ctx(&schedule, &[], &levels),
            MemberId(1),
            PointSource::Manual,
            500,
            0,
            EventRef::Manual,
            Utc::now(),
        )
        .expect("test: award");

        let promotion = result.level_up.expect("promotion fired");
        assert_eq!(promotion.to, ProLevel::Professional, "one rung only");
        assert_eq!(store.members[&MemberId(1)].pro_level, ProLevel::Professional);
        assert!(promotion.notified_referrer.is_none(), "root has no referrer");

        // The milestone cash landed on the ledger.
        let bonus_entries: Vec<_> = store
            .ledger
            .iter()
            .filter(|e| e.category == LedgerCategory::LevelBonus)
            .collect();
        assert_eq!(bonus_entries.len(), 1);
        assert_eq!(bonus_entries[0].amount, Kwacha(dec!(100)));
    }

    #[test]
    fn downline_advance_awards_referrer() {
        let mut store = store_with_member();
        let root = store.members[&MemberId(1)].clone();
        let mut child = Member::new(MemberId(2), "child", Some(&root), Utc::now());
        child.joined_at = Utc::now() - chrono::Duration::days(100);
        store.insert_member(child);

        let schedule = MultiplierSchedule::default();
        let levels = LevelLadder {
            levels: vec![LevelDef {
                level: ProLevel::Professional,
                lifetime_points: 50,
                min_account_age_days: 0,
                direct_referrals: 0,
                active_referrals: 0,
                completed_courses: 0,
                downline_at_level: None,
                bonus_cash: Kwacha::zero(),
                bonus_lp: 0,
                referrer_award_lp: 25,
            }],
        };

        let result = award_points(
            &mut store,
            ctx(&schedule, &[], &levels),
            MemberId(2),
            PointSource::Manual,
            100,
            0,
            EventRef::Manual,
            Utc::now(),
        )
        .expect("test: award");

        let promotion = result.level_up.expect("promotion fired");
        assert_eq!(promotion.notified_referrer, Some(MemberId(1)));
        assert_eq!(store.points_accounts[&MemberId(1)].lifetime_points, 25);
        assert!(store
            .point_transactions
            .iter()
            .any(|t| t.member == MemberId(1) && t.source == PointSource::DownlineAdvance));
    }

    #[test]
    fn monthly_reset_archives_and_rolls_streak() {
        let mut store = store_with_member();
        let schedule = MultiplierSchedule::default();
        let mut account = PointsAccount::new(MemberId(1));
        account.monthly_points = 150;
        store.points_accounts.insert(MemberId(1), account);

        let month = Period::new(2026, 8);
        let outcome =
            reset_member_month(&mut store, &schedule, 100, MemberId(1), month, Utc::now())
                .expect("test: reset");
        assert_eq!(
            outcome,
            ResetOutcome::Archived { qualified: true, streak: 1, multiplier: dec!(1.0) }
        );

        let account = &store.points_accounts[&MemberId(1)];
        assert_eq!(account.monthly_points, 0);
        assert_eq!(account.previous_month_points, 150);
        assert_eq!(account.current_streak, 1);
        assert_eq!(account.rolling_average, 150);
        assert!(store.points_archives.contains_key(&(MemberId(1), month)));
    }

    #[test]
    fn monthly_reset_is_rerunnable() {
        let mut store = store_with_member();
        let schedule = MultiplierSchedule::default();
        let mut account = PointsAccount::new(MemberId(1));
        account.monthly_points = 150;
        store.points_accounts.insert(MemberId(1), account);

        let month = Period::new(2026, 8);
        reset_member_month(&mut store, &schedule, 100, MemberId(1), month, Utc::now())
            .expect("test: first");
        let rerun = reset_member_month(&mut store, &schedule, 100, MemberId(1), month, Utc::now())
            .expect("test: rerun");
        assert_eq!(rerun, ResetOutcome::AlreadyArchived);

        let account = &store.points_accounts[&MemberId(1)];
        assert_eq!(account.current_streak, 1, "streak not double-incremented");
        assert_eq!(store.points_archives.len(), 1, "no duplicate archive");
    }

    #[test]
    fn unqualified_month_resets_streak_and_multiplier() {
        let mut store = store_with_member();
        let schedule = MultiplierSchedule::default();
        let mut account = PointsAccount::new(MemberId(1));
        account.current_streak = 5;
        account.multiplier = dec!(1.1);
        account.monthly_points = 10;
        store.points_accounts.insert(MemberId(1), account);

        let outcome = reset_member_month(
            &mut store,
            &schedule,
            100,
            MemberId(1),
            Period::new(2026, 8),
            Utc::now(),
        )
        .expect("test: reset");
        assert_eq!(
            outcome,
            ResetOutcome::Archived { qualified: false, streak: 0, multiplier: dec!(1.0) }
        );
        let account = &store.points_accounts[&MemberId(1)];
        assert_eq!(account.current_streak, 0);
        assert_eq!(account.longest_streak, 5, "longest streak preserved");
        assert_eq!(account.multiplier, dec!(1.0));
    }

    #[test]
    fn rolling_average_spans_three_months() {
        let mut store = store_with_member();
        let schedule = MultiplierSchedule::default();
        store
            .points_accounts
            .insert(MemberId(1), PointsAccount::new(MemberId(1)));

        let months = [Period::new(2026, 6), Period::new(2026, 7), Period::new(2026, 8)];
        for (i, &month) in months.iter().enumerate() {
            store.points_accounts.get_mut(&MemberId(1)).unwrap().monthly_points =
                (i as u64 + 1) * 100;
            reset_member_month(&mut store, &schedule, 100, MemberId(1), month, Utc::now())
                .expect("test: reset");
        }
        // (100 + 200 + 300) / 3
        assert_eq!(store.points_accounts[&MemberId(1)].rolling_average, 200);
    }

    #[test]
    fn reset_without_account_is_noop() {
        let mut store = store_with_member();
        let schedule = MultiplierSchedule::default();
        let outcome = reset_member_month(
            &mut store,
            &schedule,
            100,
            MemberId(1),
            Period::new(2026, 8),
            Utc::now(),
        )
        .expect("test: reset");
        assert_eq!(outcome, ResetOutcome::NoAccount);
        assert!(store.points_archives.is_empty());
    }
}
