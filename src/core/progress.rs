//! Progress scoring.
//!
//! Two independent scores exist. The per-membership score is goal based: every diary
//! is worth an equal share of the challenge window and every bonus goal adds or
//! subtracts a fixed number of points. It is deliberately not clamped, so it may
//! leave `[0, 100]`. The estimated score is purely time based and clamped; it is only
//! used for challenges the viewer has not joined yet.

use crate::{
    config::app::RulesConfig,
    core::membership::{get_live_challenge, get_membership},
    entities::{BonusGoal, Diary, bonus_goal, diary},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::prelude::*;

/// Every term of a membership's progress score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressBreakdown {
    /// Days in the challenge window, both ends included
    pub total_days: i64,
    /// Diaries written
    pub daily_completed: u64,
    /// Bonus goals completed
    pub bonus_done: u64,
    /// Bonus goals whose window closed without completion
    pub bonus_failed: u64,
    /// Share earned through diaries
    pub daily_progress: f64,
    /// Points earned (or lost) through bonus goals
    pub bonus_progress: f64,
    /// `daily_progress + bonus_progress`
    pub total: f64,
}

/// Whole days elapsed from `start` to `end`, plus one for the first day.
///
/// Partial days are floored, so a window that starts at noon and ends at midnight
/// a week later counts 7 days, not 8.
///
/// # Errors
/// Returns [`Error::Domain`] when the window is empty or reversed.
pub fn total_days(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64> {
    const SECONDS_PER_DAY: i64 = 86_400;
    let days = (end - start).num_seconds().div_euclid(SECONDS_PER_DAY) + 1;
    if days <= 0 {
        return Err(Error::Domain {
            message: format!("challenge window {start} .. {end} has {days} days"),
        });
    }
    Ok(days)
}

/// Share of the window earned by `completed` diaries.
#[must_use]
pub fn daily_progress(total_days: i64, completed: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)] // day and diary counts are tiny
    let (completed, total) = (completed as f64, total_days as f64);
    100.0 * completed / total
}

/// Points from bonus goals; negative when more goals failed than were done.
#[must_use]
pub fn bonus_progress(done: u64, failed: u64, points: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)] // goal counts are tiny
    let net = done as f64 - failed as f64;
    net * points
}

/// Scores one membership at instant `now`.
pub async fn calculate_progress<C>(
    db: &C,
    rules: &RulesConfig,
    membership_id: i64,
    now: DateTime<Utc>,
) -> Result<ProgressBreakdown>
where
    C: ConnectionTrait,
{
    let membership = get_membership(db, membership_id).await?;
    let challenge = get_live_challenge(db, membership.challenge_id).await?;
    let total_days = total_days(challenge.start_at, challenge.end_at)?;

    let daily_completed = Diary::find()
        .filter(diary::Column::MembershipId.eq(membership_id))
        .count(db)
        .await?;
    let bonus_done = BonusGoal::find()
        .filter(bonus_goal::Column::MembershipId.eq(membership_id))
        .filter(bonus_goal::Column::IsDone.eq(true))
        .count(db)
        .await?;
    let bonus_failed = BonusGoal::find()
        .filter(bonus_goal::Column::MembershipId.eq(membership_id))
        .filter(bonus_goal::Column::IsDone.eq(false))
        .filter(bonus_goal::Column::WindowEnd.lte(now))
        .count(db)
        .await?;

    let daily = daily_progress(total_days, daily_completed);
    let bonus = bonus_progress(bonus_done, bonus_failed, rules.bonus_goal_points);

    Ok(ProgressBreakdown {
        total_days,
        daily_completed,
        bonus_done,
        bonus_failed,
        daily_progress: daily,
        bonus_progress: bonus,
        total: daily + bonus,
    })
}

/// Time-elapsed estimate clamped to `[0, 100]`, for challenges without a membership.
///
/// # Errors
/// Returns [`Error::Domain`] when the window is empty or reversed.
pub fn estimate_progress(start: DateTime<Utc>, end: DateTime<Utc>, today: NaiveDate) -> Result<f64> {
    let total = total_days(start, end)?;
    let elapsed = (today - start.date_naive()).num_days();
    #[allow(clippy::cast_precision_loss)] // day counts are tiny
    let ratio = elapsed as f64 / total as f64 * 100.0;
    Ok(ratio.clamp(0.0, 100.0))
}
