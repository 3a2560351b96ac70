//! Challenge state machine.
//!
//! ```text
//! PENDING --(owner start | scheduled promotion, start date <= today)--> PROGRESS
//! PROGRESS --(end date passed, owner close | scheduled completion)----> COMPLETE
//! ```
//!
//! Every transition is a conditional `UPDATE ... WHERE status = <from>` inside one
//! transaction, so an owner's explicit start racing the scheduled job promotes the
//! challenge exactly once. Starting a challenge prunes every membership that has not
//! accepted its invite and seeds one inventory entry per remaining member and catalog
//! item.

use crate::{
    config::{AppConfig, app::RulesConfig},
    core::{
        catalog::get_all_items,
        membership::{
            count_active_challenges, count_members, find_membership_for_user,
            get_live_challenge, get_memberships_by_challenge,
        },
        progress::estimate_progress,
    },
    entities::{
        Challenge, ChallengeStatus, InventoryEntry, InviteStatus, Membership, challenge,
        inventory_entry, membership,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Days, NaiveTime, Utc};
use rand::{Rng, seq::SliceRandom};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// One invited user and the invite state they start in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invitee {
    /// Invited user
    pub user_id: i64,
    /// `Pending`, or `Accepted` for members who agreed up front
    pub invite_status: InviteStatus,
}

/// Input of [`create_challenge`].
#[derive(Debug, Clone)]
pub struct NewChallenge {
    /// Display name
    pub name: String,
    /// Header emoji
    pub header_emoji: String,
    /// Window start
    pub start_at: DateTime<Utc>,
    /// Window end
    pub end_at: DateTime<Utc>,
    /// Everyone invited besides the creator
    pub invitees: Vec<Invitee>,
}

/// A freshly created challenge with its memberships, owner first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedChallenge {
    /// The challenge row
    pub challenge: challenge::Model,
    /// Owner membership followed by one membership per invitee
    pub memberships: Vec<membership::Model>,
}

/// Answer given to an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteDecision {
    /// Join the challenge
    Accept,
    /// Refuse; the membership is removed
    Decline,
}

/// Result of [`respond_to_invite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteResponse {
    /// The membership now counts as accepted
    Accepted(membership::Model),
    /// The membership was deleted
    Declined {
        /// Id of the removed membership
        membership_id: i64,
    },
}

impl InviteResponse {
    /// Invite status the caller ended up with.
    #[must_use]
    pub const fn status(&self) -> InviteStatus {
        match self {
            Self::Accepted(_) => InviteStatus::Accepted,
            Self::Declined { .. } => InviteStatus::Declined,
        }
    }
}

/// Result of a start, explicit or scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// Challenge after the transition
    pub challenge: challenge::Model,
    /// Memberships that remained (all accepted)
    pub members: Vec<membership::Model>,
    /// Memberships removed because they never accepted
    pub pruned: u64,
    /// Inventory entries created
    pub inventory_entries: usize,
}

/// Result of [`join_by_link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The new pending membership
    pub membership: membership::Model,
    /// How many challenges the caller is actively part of
    pub active_challenge_count: u64,
}

/// Result of [`delete_or_leave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LeaveOutcome {
    /// The challenge was soft-deleted and all memberships removed
    ChallengeDeleted {
        /// Deleted challenge
        challenge_id: i64,
    },
    /// Only the caller's membership was removed
    MembershipRemoved {
        /// Removed membership
        membership_id: i64,
    },
}

impl LeaveOutcome {
    /// Short user-facing description.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ChallengeDeleted { .. } => "Challenge deleted",
            Self::MembershipRemoved { .. } => "Left the challenge",
        }
    }
}

/// What an invited user sees before answering.
#[derive(Debug, Clone, PartialEq)]
pub struct InvitePreview {
    /// The challenge
    pub challenge: challenge::Model,
    /// Memberships currently attached
    pub member_count: u64,
    /// Clamped time-elapsed estimate
    pub estimated_progress: f64,
}

fn validation(message: impl Into<String>) -> Error {
    Error::Validation {
        message: message.into(),
    }
}

fn policy(message: impl Into<String>) -> Error {
    Error::Policy {
        message: message.into(),
    }
}

async fn ensure_below_active_cap<C>(db: &C, rules: &RulesConfig, user_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let active = count_active_challenges(db, user_id).await?;
    if active >= rules.max_active_challenges {
        return Err(validation(format!(
            "user {user_id} already takes part in {active} challenges (max {})",
            rules.max_active_challenges
        )));
    }
    Ok(())
}

fn membership_row(
    challenge_id: i64,
    user_id: i64,
    is_owner: bool,
    invite_status: InviteStatus,
    now: DateTime<Utc>,
) -> membership::ActiveModel {
    membership::ActiveModel {
        challenge_id: Set(challenge_id),
        user_id: Set(user_id),
        is_owner: Set(is_owner),
        invite_status: Set(invite_status),
        comment: Set(String::new()),
        viewed_completion_log: Set(false),
        joined_at: Set(now),
        ..Default::default()
    }
}

/// Creates a `PENDING` challenge owned by `creator`, plus one membership per invitee.
///
/// # Errors
/// [`Error::Validation`] for an empty name, a reversed window, duplicate or declined
/// invitees, more members than allowed, or when the creator (or an invitee who
/// accepted up front) is already at the active-challenge cap.
pub async fn create_challenge(
    db: &DatabaseConnection,
    rules: &RulesConfig,
    creator: i64,
    new: NewChallenge,
    now: DateTime<Utc>,
) -> Result<CreatedChallenge> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        return Err(validation("Challenge name cannot be empty"));
    }
    if new.end_at.date_naive() < new.start_at.date_naive() {
        return Err(validation("Challenge must not end before it starts"));
    }

    let mut seen = HashSet::from([creator]);
    for invitee in &new.invitees {
        if !seen.insert(invitee.user_id) {
            return Err(validation(format!(
                "user {} is listed more than once",
                invitee.user_id
            )));
        }
        if invitee.invite_status == InviteStatus::Declined {
            return Err(validation(format!(
                "user {} cannot be invited as declined",
                invitee.user_id
            )));
        }
    }
    if seen.len() > rules.max_members {
        return Err(validation(format!(
            "a challenge holds at most {} members",
            rules.max_members
        )));
    }

    let txn = db.begin().await?;

    ensure_below_active_cap(&txn, rules, creator).await?;
    for invitee in &new.invitees {
        if invitee.invite_status == InviteStatus::Accepted {
            ensure_below_active_cap(&txn, rules, invitee.user_id).await?;
        }
    }

    let challenge = challenge::ActiveModel {
        name: Set(name),
        header_emoji: Set(new.header_emoji),
        start_at: Set(new.start_at),
        end_at: Set(new.end_at),
        status: Set(ChallengeStatus::Pending),
        created_by: Set(creator),
        created_at: Set(now),
        is_deleted: Set(false),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut memberships = Vec::with_capacity(new.invitees.len() + 1);
    memberships.push(
        membership_row(challenge.id, creator, true, InviteStatus::Accepted, now)
            .insert(&txn)
            .await?,
    );
    for invitee in &new.invitees {
        memberships.push(
            membership_row(challenge.id, invitee.user_id, false, invitee.invite_status, now)
                .insert(&txn)
                .await?,
        );
    }

    txn.commit().await?;

    info!(
        challenge_id = challenge.id,
        creator,
        members = memberships.len(),
        "Challenge created"
    );
    Ok(CreatedChallenge {
        challenge,
        memberships,
    })
}

/// Accepts or declines the caller's pending invite to a challenge.
///
/// Declining deletes the membership. Accepting re-checks the active-challenge cap
/// after the membership flips to accepted and before the transaction commits, so
/// concurrent accepts cannot push a user past the cap.
///
/// # Errors
/// [`Error::NotFound`] when the caller has no membership (including a second
/// decline), [`Error::Conflict`] when the invite was already answered,
/// [`Error::Policy`] when the challenge already started and [`Error::Validation`]
/// when the cap is reached.
pub async fn respond_to_invite(
    db: &DatabaseConnection,
    rules: &RulesConfig,
    challenge_id: i64,
    user_id: i64,
    decision: InviteDecision,
) -> Result<InviteResponse> {
    let txn = db.begin().await?;

    let challenge = get_live_challenge(&txn, challenge_id).await?;
    let membership = find_membership_for_user(&txn, challenge_id, user_id)
        .await?
        .ok_or_else(|| {
            Error::not_found("membership", format!("challenge {challenge_id} / user {user_id}"))
        })?;
    if membership.invite_status != InviteStatus::Pending {
        return Err(Error::Conflict {
            message: "invite was already answered".to_string(),
        });
    }

    match decision {
        InviteDecision::Decline => {
            let membership_id = membership.id;
            membership.delete(&txn).await?;
            txn.commit().await?;
            info!(challenge_id, user_id, "Invite declined");
            Ok(InviteResponse::Declined { membership_id })
        }
        InviteDecision::Accept => {
            if challenge.status != ChallengeStatus::Pending {
                return Err(policy("challenge has already started"));
            }
            let updated = Membership::update_many()
                .col_expr(
                    membership::Column::InviteStatus,
                    Expr::value(InviteStatus::Accepted),
                )
                .filter(membership::Column::Id.eq(membership.id))
                .filter(membership::Column::InviteStatus.eq(InviteStatus::Pending))
                .exec(&txn)
                .await?;
            if updated.rows_affected == 0 {
                return Err(Error::Conflict {
                    message: "invite was already answered".to_string(),
                });
            }

            let active = count_active_challenges(&txn, user_id).await?;
            if active > rules.max_active_challenges {
                // Dropping the transaction rolls the accept back
                return Err(validation(format!(
                    "user {user_id} already takes part in {} challenges (max {})",
                    active - 1,
                    rules.max_active_challenges
                )));
            }

            let accepted = Membership::find_by_id(membership.id)
                .one(&txn)
                .await?
                .ok_or_else(|| Error::not_found("membership", membership.id))?;
            txn.commit().await?;
            info!(challenge_id, user_id, "Invite accepted");
            Ok(InviteResponse::Accepted(accepted))
        }
    }
}

/// Moves a pending challenge to `PROGRESS` inside the caller's transaction.
///
/// When `started_at` is earlier than the planned start, the window is moved to begin
/// at `started_at`.
async fn promote_in_txn<C, R>(
    txn: &C,
    config: &AppConfig,
    challenge: &challenge::Model,
    started_at: Option<DateTime<Utc>>,
    rng: &mut R,
) -> Result<StartReport>
where
    C: ConnectionTrait,
    R: Rng + ?Sized,
{
    let mut transition = Challenge::update_many()
        .col_expr(
            challenge::Column::Status,
            Expr::value(ChallengeStatus::Progress),
        )
        .filter(challenge::Column::Id.eq(challenge.id))
        .filter(challenge::Column::Status.eq(ChallengeStatus::Pending))
        .filter(challenge::Column::IsDeleted.eq(false));
    if let Some(started_at) = started_at.filter(|at| *at < challenge.start_at) {
        transition = transition.col_expr(challenge::Column::StartAt, Expr::value(started_at));
    }
    if transition.exec(txn).await?.rows_affected == 0 {
        return Err(Error::Conflict {
            message: format!("challenge {} is not pending", challenge.id),
        });
    }

    let pruned = Membership::delete_many()
        .filter(membership::Column::ChallengeId.eq(challenge.id))
        .filter(membership::Column::InviteStatus.ne(InviteStatus::Accepted))
        .exec(txn)
        .await?
        .rows_affected;

    let members = get_memberships_by_challenge(txn, challenge.id).await?;
    let items = get_all_items(txn).await?;

    let entries: Vec<inventory_entry::ActiveModel> = members
        .iter()
        .flat_map(|member| {
            items.iter().map(move |item| inventory_entry::ActiveModel {
                membership_id: Set(member.id),
                item_id: Set(item.id),
                count: Set(0),
                ..Default::default()
            })
        })
        .collect();
    let inventory_entries = entries.len();
    if !entries.is_empty() {
        InventoryEntry::insert_many(entries).exec(txn).await?;
    }

    let mut members_after = Vec::with_capacity(members.len());
    for member in members {
        match config.flavor_comments.choose(rng) {
            Some(comment) => {
                let mut active: membership::ActiveModel = member.into();
                active.comment = Set(comment.clone());
                members_after.push(active.update(txn).await?);
            }
            None => members_after.push(member),
        }
    }

    let challenge = Challenge::find_by_id(challenge.id)
        .one(txn)
        .await?
        .ok_or_else(|| Error::not_found("challenge", challenge.id))?;

    Ok(StartReport {
        challenge,
        members: members_after,
        pruned,
        inventory_entries,
    })
}

/// Owner-initiated start of a pending challenge.
///
/// # Errors
/// [`Error::Authorization`] when the caller is not the owner, [`Error::Conflict`] when
/// the challenge is no longer pending.
pub async fn start_challenge<R>(
    db: &DatabaseConnection,
    config: &AppConfig,
    challenge_id: i64,
    caller: i64,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<StartReport>
where
    R: Rng + ?Sized,
{
    let txn = db.begin().await?;
    let challenge = get_live_challenge(&txn, challenge_id).await?;
    let is_owner = find_membership_for_user(&txn, challenge_id, caller)
        .await?
        .is_some_and(|m| m.is_owner);
    if !is_owner {
        return Err(Error::Authorization {
            message: "only the owner can start a challenge".to_string(),
        });
    }

    let report = promote_in_txn(&txn, config, &challenge, Some(now), rng).await?;
    txn.commit().await?;

    info!(
        challenge_id,
        pruned = report.pruned,
        inventory_entries = report.inventory_entries,
        "Challenge started by owner"
    );
    Ok(report)
}

/// System-initiated start used by the scheduled job; no owner check.
pub async fn scheduled_promote<R>(
    db: &DatabaseConnection,
    config: &AppConfig,
    challenge_id: i64,
    rng: &mut R,
) -> Result<StartReport>
where
    R: Rng + ?Sized,
{
    let txn = db.begin().await?;
    let challenge = get_live_challenge(&txn, challenge_id).await?;
    let report = promote_in_txn(&txn, config, &challenge, None, rng).await?;
    txn.commit().await?;

    info!(
        challenge_id,
        pruned = report.pruned,
        inventory_entries = report.inventory_entries,
        "Challenge promoted by schedule"
    );
    Ok(report)
}

fn start_of_day(date: chrono::NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Pending, live challenges whose start date is today or earlier (UTC dates).
pub async fn find_promotable(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<challenge::Model>> {
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .ok_or_else(|| Error::Domain {
            message: format!("no day after {now}"),
        })?;
    Challenge::find()
        .filter(challenge::Column::Status.eq(ChallengeStatus::Pending))
        .filter(challenge::Column::IsDeleted.eq(false))
        .filter(challenge::Column::StartAt.lt(start_of_day(tomorrow)))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Running, live challenges whose end date lies before today (UTC dates).
pub async fn find_completable(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<Vec<challenge::Model>> {
    Challenge::find()
        .filter(challenge::Column::Status.eq(ChallengeStatus::Progress))
        .filter(challenge::Column::IsDeleted.eq(false))
        .filter(challenge::Column::EndAt.lt(start_of_day(now.date_naive())))
        .all(db)
        .await
        .map_err(Into::into)
}

async fn complete_in_txn<C>(txn: &C, challenge_id: i64) -> Result<challenge::Model>
where
    C: ConnectionTrait,
{
    let updated = Challenge::update_many()
        .col_expr(
            challenge::Column::Status,
            Expr::value(ChallengeStatus::Complete),
        )
        .filter(challenge::Column::Id.eq(challenge_id))
        .filter(challenge::Column::Status.eq(ChallengeStatus::Progress))
        .filter(challenge::Column::IsDeleted.eq(false))
        .exec(txn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(Error::Conflict {
            message: format!("challenge {challenge_id} is not in progress"),
        });
    }
    Challenge::find_by_id(challenge_id)
        .one(txn)
        .await?
        .ok_or_else(|| Error::not_found("challenge", challenge_id))
}

/// Owner closes a running challenge once its end date has passed.
///
/// # Errors
/// [`Error::Authorization`] for non-owners, [`Error::Policy`] when the challenge is
/// not running or its end date has not passed yet.
pub async fn complete_challenge(
    db: &DatabaseConnection,
    challenge_id: i64,
    caller: i64,
    now: DateTime<Utc>,
) -> Result<challenge::Model> {
    let txn = db.begin().await?;
    let challenge = get_live_challenge(&txn, challenge_id).await?;
    let is_owner = find_membership_for_user(&txn, challenge_id, caller)
        .await?
        .is_some_and(|m| m.is_owner);
    if !is_owner {
        return Err(Error::Authorization {
            message: "only the owner can close a challenge".to_string(),
        });
    }
    if challenge.status != ChallengeStatus::Progress {
        return Err(policy("only running challenges can be closed"));
    }
    if challenge.end_at.date_naive() >= now.date_naive() {
        return Err(policy("challenge has not reached its end date"));
    }

    let closed = complete_in_txn(&txn, challenge_id).await?;
    txn.commit().await?;
    info!(challenge_id, "Challenge closed by owner");
    Ok(closed)
}

/// System-initiated completion used by the scheduled job.
pub async fn scheduled_complete(
    db: &DatabaseConnection,
    challenge_id: i64,
) -> Result<challenge::Model> {
    let txn = db.begin().await?;
    let closed = complete_in_txn(&txn, challenge_id).await?;
    txn.commit().await?;
    info!(challenge_id, "Challenge completed by schedule");
    Ok(closed)
}

/// Owner deletes the challenge; anyone else leaves it.
///
/// Deleting soft-deletes the challenge and removes every membership. A non-owner's
/// leave removes only their membership, and soft-deletes the challenge as well when
/// nobody is left.
pub async fn delete_or_leave(
    db: &DatabaseConnection,
    challenge_id: i64,
    caller: i64,
    now: DateTime<Utc>,
) -> Result<LeaveOutcome> {
    let txn = db.begin().await?;
    let challenge = get_live_challenge(&txn, challenge_id).await?;
    let membership = find_membership_for_user(&txn, challenge_id, caller)
        .await?
        .ok_or_else(|| {
            Error::not_found("membership", format!("challenge {challenge_id} / user {caller}"))
        })?;

    let outcome = if membership.is_owner {
        soft_delete(&txn, challenge, now).await?;
        LeaveOutcome::ChallengeDeleted { challenge_id }
    } else {
        let membership_id = membership.id;
        membership.delete(&txn).await?;
        if count_members(&txn, challenge_id).await? == 0 {
            warn!(challenge_id, "Last member left an ownerless challenge");
            soft_delete(&txn, challenge, now).await?;
        }
        LeaveOutcome::MembershipRemoved { membership_id }
    };

    txn.commit().await?;
    info!(challenge_id, caller, ?outcome, "Delete or leave");
    Ok(outcome)
}

async fn soft_delete<C>(txn: &C, challenge: challenge::Model, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    Membership::delete_many()
        .filter(membership::Column::ChallengeId.eq(challenge.id))
        .exec(txn)
        .await?;
    let mut active: challenge::ActiveModel = challenge.into();
    active.is_deleted = Set(true);
    active.deleted_at = Set(Some(now));
    active.update(txn).await?;
    Ok(())
}

/// Joins a pending challenge through a shared link, as a pending non-owner member.
///
/// # Errors
/// [`Error::Policy`] once the challenge left `PENDING`, [`Error::Conflict`] when the
/// caller already has a membership, [`Error::Validation`] when the challenge is full.
pub async fn join_by_link(
    db: &DatabaseConnection,
    rules: &RulesConfig,
    challenge_id: i64,
    caller: i64,
    now: DateTime<Utc>,
) -> Result<JoinOutcome> {
    let txn = db.begin().await?;
    let challenge = get_live_challenge(&txn, challenge_id).await?;
    if challenge.status != ChallengeStatus::Pending {
        return Err(policy("challenge can only be joined before it starts"));
    }
    if find_membership_for_user(&txn, challenge_id, caller)
        .await?
        .is_some()
    {
        return Err(Error::Conflict {
            message: "already a member of this challenge".to_string(),
        });
    }
    let members = count_members(&txn, challenge_id).await?;
    if usize::try_from(members).map_or(true, |n| n >= rules.max_members) {
        return Err(validation(format!(
            "a challenge holds at most {} members",
            rules.max_members
        )));
    }

    let membership = membership_row(challenge_id, caller, false, InviteStatus::Pending, now)
        .insert(&txn)
        .await
        .map_err(|e| Error::conflict_on_unique(e, "already a member of this challenge"))?;
    let active_challenge_count = count_active_challenges(&txn, caller).await?;
    txn.commit().await?;

    info!(challenge_id, caller, "Joined by link");
    Ok(JoinOutcome {
        membership,
        active_challenge_count,
    })
}

/// Challenge summary shown with an invitation.
pub async fn invite_preview(
    db: &DatabaseConnection,
    challenge_id: i64,
    now: DateTime<Utc>,
) -> Result<InvitePreview> {
    let challenge = get_live_challenge(db, challenge_id).await?;
    let member_count = count_members(db, challenge_id).await?;
    let estimated_progress =
        estimate_progress(challenge.start_at, challenge.end_at, now.date_naive())?;
    Ok(InvitePreview {
        challenge,
        member_count,
        estimated_progress,
    })
}
