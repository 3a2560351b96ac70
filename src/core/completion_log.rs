//! Completion log: the final standings a member opens once after a challenge ends.
//!
//! Opening it the first time draws a reward with the completion-log weights, whose
//! avatar weight grows with the number of members and the length of the challenge.

use crate::{
    config::AppConfig,
    core::{
        membership::{get_live_challenge, get_memberships_by_challenge, get_own_membership},
        progress::{ProgressBreakdown, calculate_progress, total_days},
        reward::{RewardOutcome, draw_reward},
    },
    entities::{ChallengeStatus, Membership, challenge, membership},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::{TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

/// One row of the final standings.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    /// The member
    pub membership: membership::Model,
    /// Their final score
    pub progress: ProgressBreakdown,
}

/// What the caller sees when opening the completion log.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionLog {
    /// The finished challenge
    pub challenge: challenge::Model,
    /// Every member, best score first
    pub standings: Vec<Standing>,
    /// Reward drawn for opening the log
    pub reward: RewardOutcome,
}

/// Opens the completion log of a finished challenge for the caller's membership.
///
/// # Errors
/// [`Error::Authorization`] when the membership is not the caller's,
/// [`Error::Policy`] before the challenge is complete and [`Error::Conflict`] when the
/// log was already opened.
pub async fn view_completion_log<R>(
    db: &DatabaseConnection,
    config: &AppConfig,
    membership_id: i64,
    caller: i64,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<CompletionLog>
where
    R: Rng + ?Sized,
{
    let txn = db.begin().await?;
    let membership = get_own_membership(&txn, membership_id, caller).await?;
    let challenge = get_live_challenge(&txn, membership.challenge_id).await?;
    if challenge.status != ChallengeStatus::Complete {
        return Err(Error::Policy {
            message: "the completion log opens once the challenge is complete".to_string(),
        });
    }

    let marked = Membership::update_many()
        .col_expr(membership::Column::ViewedCompletionLog, Expr::value(true))
        .filter(membership::Column::Id.eq(membership_id))
        .filter(membership::Column::ViewedCompletionLog.eq(false))
        .exec(&txn)
        .await?;
    if marked.rows_affected == 0 {
        return Err(Error::Conflict {
            message: "completion log was already viewed".to_string(),
        });
    }

    let members = get_memberships_by_challenge(&txn, challenge.id).await?;
    let mut standings = Vec::with_capacity(members.len());
    for member in members {
        let progress = calculate_progress(&txn, &config.rules, member.id, now).await?;
        standings.push(Standing {
            membership: member,
            progress,
        });
    }
    standings.sort_by(|a, b| b.progress.total.total_cmp(&a.progress.total));

    let member_count = u64::try_from(standings.len()).unwrap_or(u64::MAX);
    let days = total_days(challenge.start_at, challenge.end_at)?;
    let bonus = config.rewards.completion_log.bonus(member_count, days);
    let reward = draw_reward(
        &txn,
        &config.rewards.completion_log.weights(),
        bonus,
        &membership,
        now,
        rng,
    )
    .await?;
    txn.commit().await?;

    info!(
        membership_id,
        challenge_id = challenge.id,
        reward = ?reward.kind,
        "Completion log viewed"
    );
    Ok(CompletionLog {
        challenge,
        standings,
        reward,
    })
}
