//! Membership and challenge lookups shared by every component.
//!
//! These helpers replace relationship navigation with explicit queries keyed by
//! foreign id and return owned models. They are generic over [`ConnectionTrait`] so
//! they run equally on a plain connection or inside a caller's transaction.

use crate::{
    entities::{
        Challenge, ChallengeStatus, InviteStatus, Membership, challenge, membership,
    },
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Fetches a challenge that has not been soft-deleted.
pub async fn get_live_challenge<C>(db: &C, challenge_id: i64) -> Result<challenge::Model>
where
    C: ConnectionTrait,
{
    Challenge::find_by_id(challenge_id)
        .filter(challenge::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("challenge", challenge_id))
}

/// Fetches a membership by id.
pub async fn get_membership<C>(db: &C, membership_id: i64) -> Result<membership::Model>
where
    C: ConnectionTrait,
{
    Membership::find_by_id(membership_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("membership", membership_id))
}

/// Fetches a membership and checks that `user_id` is the one holding it.
pub async fn get_own_membership<C>(
    db: &C,
    membership_id: i64,
    user_id: i64,
) -> Result<membership::Model>
where
    C: ConnectionTrait,
{
    let membership = get_membership(db, membership_id).await?;
    if membership.user_id != user_id {
        return Err(Error::Authorization {
            message: format!("membership {membership_id} belongs to another user"),
        });
    }
    Ok(membership)
}

/// Lists every membership of a challenge, owner first.
pub async fn get_memberships_by_challenge<C>(
    db: &C,
    challenge_id: i64,
) -> Result<Vec<membership::Model>>
where
    C: ConnectionTrait,
{
    Membership::find()
        .filter(membership::Column::ChallengeId.eq(challenge_id))
        .order_by_desc(membership::Column::IsOwner)
        .order_by_asc(membership::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds the membership a user holds in a challenge, if any.
pub async fn find_membership_for_user<C>(
    db: &C,
    challenge_id: i64,
    user_id: i64,
) -> Result<Option<membership::Model>>
where
    C: ConnectionTrait,
{
    Membership::find()
        .filter(membership::Column::ChallengeId.eq(challenge_id))
        .filter(membership::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Counts memberships of a challenge regardless of invite state.
pub async fn count_members<C>(db: &C, challenge_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    Membership::find()
        .filter(membership::Column::ChallengeId.eq(challenge_id))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Counts the challenges a user actively takes part in.
///
/// A challenge is active for a user when the user's invite is accepted and the
/// challenge is neither deleted nor finished.
pub async fn count_active_challenges<C>(db: &C, user_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    Membership::find()
        .inner_join(Challenge)
        .filter(membership::Column::UserId.eq(user_id))
        .filter(membership::Column::InviteStatus.eq(InviteStatus::Accepted))
        .filter(challenge::Column::IsDeleted.eq(false))
        .filter(
            challenge::Column::Status.is_in([ChallengeStatus::Pending, ChallengeStatus::Progress]),
        )
        .count(db)
        .await
        .map_err(Into::into)
}

/// Replaces the status comment on the caller's own membership.
pub async fn update_member_comment(
    db: &DatabaseConnection,
    membership_id: i64,
    user_id: i64,
    comment: String,
) -> Result<membership::Model> {
    let membership = get_own_membership(db, membership_id, user_id).await?;
    let mut active: membership::ActiveModel = membership.into();
    active.comment = Set(comment.trim().to_string());
    active.update(db).await.map_err(Into::into)
}
