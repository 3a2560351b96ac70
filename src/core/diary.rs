//! Diary submission: the once-per-day completion record of a membership.
//!
//! A diary counts for the [`DayWindow`] containing the submission instant. The
//! `(membership_id, day_key)` unique index makes the one-per-day rule hold even when
//! two submissions race; the existence check up front only gives the common case a
//! clean error.

use crate::{
    config::AppConfig,
    core::{
        day_window::DayWindow,
        membership::{find_membership_for_user, get_live_challenge, get_membership, get_own_membership},
        reward::{RewardOutcome, draw_reward},
    },
    entities::{
        ChallengeStatus, DailyGoal, Diary, DiaryReaction, InviteStatus, daily_goal, diary,
        diary_reaction,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// One goal reported with a diary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalEntry {
    /// Goal text
    pub text: String,
    /// Whether it was achieved
    pub done: bool,
}

/// Input of [`create_diary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDiary {
    /// Proof image reference issued by the upload service
    pub proof_image: String,
    /// Free text
    pub comment: String,
    /// Goals of the day
    pub goals: Vec<GoalEntry>,
}

/// Everything a diary submission created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryReceipt {
    /// Stored diary
    pub diary: diary::Model,
    /// Goals stored with it, in submission order
    pub goals: Vec<daily_goal::Model>,
    /// Reward drawn for the submission
    pub reward: RewardOutcome,
}

/// A diary with its goals and reactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryDetail {
    /// The diary
    pub diary: diary::Model,
    /// Goals submitted with it
    pub goals: Vec<daily_goal::Model>,
    /// Reactions, oldest first
    pub reactions: Vec<diary_reaction::Model>,
}

/// Inserts the diary row; a second row for the same day is a [`Error::Conflict`].
async fn insert_diary<C>(
    db: &C,
    membership_id: i64,
    day: NaiveDate,
    proof_image: String,
    comment: String,
    now: DateTime<Utc>,
) -> Result<diary::Model>
where
    C: ConnectionTrait,
{
    diary::ActiveModel {
        membership_id: Set(membership_id),
        day_key: Set(day),
        proof_image: Set(proof_image),
        comment: Set(comment),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| Error::conflict_on_unique(e, format!("a diary for {day} already exists")))
}

/// Records today's diary for the caller's membership and draws the diary reward.
///
/// # Errors
/// [`Error::Authorization`] when the membership is not the caller's,
/// [`Error::Policy`] when the challenge is not running, [`Error::Validation`] for a
/// blank goal and [`Error::Conflict`] when a diary already exists in the current
/// day window.
pub async fn create_diary<R>(
    db: &DatabaseConnection,
    config: &AppConfig,
    membership_id: i64,
    caller: i64,
    new: NewDiary,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<DiaryReceipt>
where
    R: Rng + ?Sized,
{
    if new.goals.iter().any(|goal| goal.text.trim().is_empty()) {
        return Err(Error::Validation {
            message: "goal text cannot be empty".to_string(),
        });
    }

    let window = DayWindow::containing(now);
    let txn = db.begin().await?;

    let membership = get_own_membership(&txn, membership_id, caller).await?;
    let challenge = get_live_challenge(&txn, membership.challenge_id).await?;
    if challenge.status != ChallengeStatus::Progress {
        return Err(Error::Policy {
            message: "diaries can only be written while the challenge runs".to_string(),
        });
    }

    let existing = Diary::find()
        .filter(diary::Column::MembershipId.eq(membership_id))
        .filter(diary::Column::DayKey.eq(window.day))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(Error::Conflict {
            message: format!("a diary for {} already exists", window.day),
        });
    }

    let diary = insert_diary(&txn, membership_id, window.day, new.proof_image, new.comment, now)
        .await?;

    let mut goals = Vec::with_capacity(new.goals.len());
    for goal in new.goals {
        let stored = daily_goal::ActiveModel {
            membership_id: Set(membership_id),
            diary_id: Set(Some(diary.id)),
            text: Set(goal.text.trim().to_string()),
            is_done: Set(goal.done),
            day_key: Set(window.day),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        goals.push(stored);
    }

    let reward = draw_reward(&txn, &config.rewards.diary, 0.0, &membership, now, rng).await?;
    txn.commit().await?;

    info!(
        membership_id,
        day = %window.day,
        goals = goals.len(),
        reward = ?reward.kind,
        "Diary recorded"
    );
    Ok(DiaryReceipt {
        diary,
        goals,
        reward,
    })
}

/// Leaves an emoji on a diary. Any accepted member of the same challenge may react.
pub async fn react_to_diary(
    db: &DatabaseConnection,
    diary_id: i64,
    caller: i64,
    emoji: &str,
    now: DateTime<Utc>,
) -> Result<diary_reaction::Model> {
    let emoji = emoji.trim();
    if emoji.is_empty() {
        return Err(Error::Validation {
            message: "reaction cannot be empty".to_string(),
        });
    }

    let diary = Diary::find_by_id(diary_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("diary", diary_id))?;
    let author = get_membership(db, diary.membership_id).await?;
    let reactor = find_membership_for_user(db, author.challenge_id, caller)
        .await?
        .filter(|m| m.invite_status == InviteStatus::Accepted)
        .ok_or_else(|| Error::Authorization {
            message: format!("user {caller} is not a member of this challenge"),
        })?;

    let reaction = diary_reaction::ActiveModel {
        diary_id: Set(diary.id),
        membership_id: Set(reactor.id),
        emoji: Set(emoji.to_string()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(diary_id, membership_id = reactor.id, "Diary reaction added");
    Ok(reaction)
}

/// Loads a diary together with its goals and reactions.
pub async fn get_diary_detail(db: &DatabaseConnection, diary_id: i64) -> Result<DiaryDetail> {
    let diary = Diary::find_by_id(diary_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("diary", diary_id))?;
    let goals = DailyGoal::find()
        .filter(daily_goal::Column::DiaryId.eq(diary_id))
        .order_by_asc(daily_goal::Column::Id)
        .all(db)
        .await?;
    let reactions = DiaryReaction::find()
        .filter(diary_reaction::Column::DiaryId.eq(diary_id))
        .order_by_asc(diary_reaction::Column::CreatedAt)
        .order_by_asc(diary_reaction::Column::Id)
        .all(db)
        .await?;
    Ok(DiaryDetail {
        diary,
        goals,
        reactions,
    })
}

/// Diaries of one membership, newest day first.
pub async fn get_diaries_by_membership(
    db: &DatabaseConnection,
    membership_id: i64,
) -> Result<Vec<diary::Model>> {
    Diary::find()
        .filter(diary::Column::MembershipId.eq(membership_id))
        .order_by_desc(diary::Column::DayKey)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::reward::RewardKind;
    use crate::test_utils::*;
    use chrono::TimeDelta;
    use rand::{SeedableRng, rngs::StdRng};

    fn sample_diary() -> NewDiary {
        NewDiary {
            proof_image: "uploads/proof.jpg".to_string(),
            comment: "ran 5k".to_string(),
            goals: vec![
                GoalEntry {
                    text: "run".to_string(),
                    done: true,
                },
                GoalEntry {
                    text: "stretch".to_string(),
                    done: false,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_create_diary_links_goals() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let started = setup_started_challenge(&db, &config, 1, &[]).await?;
        let member = &started.memberships[0];
        let mut rng = StdRng::seed_from_u64(9);

        let receipt = create_diary(
            &db,
            &config,
            member.id,
            1,
            sample_diary(),
            at(2024, 1, 2, 10),
            &mut rng,
        )
        .await?;

        assert_eq!(receipt.diary.day_key, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(receipt.goals.len(), 2);
        assert!(receipt.goals.iter().all(|g| g.diary_id == Some(receipt.diary.id)));
        assert_eq!(receipt.goals[0].text, "run");
        assert!(receipt.goals[0].is_done);
        assert_eq!(
            receipt.reward.reward_id.is_some(),
            receipt.reward.kind != RewardKind::Nothing
        );

        let detail = get_diary_detail(&db, receipt.diary.id).await?;
        assert_eq!(detail.goals, receipt.goals);
        assert!(detail.reactions.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_second_diary_in_window_conflicts_until_window_ends() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let started = setup_started_challenge(&db, &config, 1, &[]).await?;
        let member = &started.memberships[0];
        let mut rng = StdRng::seed_from_u64(9);
        let first = at(2024, 1, 2, 19);

        create_diary(&db, &config, member.id, 1, sample_diary(), first, &mut rng).await?;

        // 18:59:59 the next day is still inside the same window
        let same_window = first + TimeDelta::hours(24) - TimeDelta::seconds(1);
        let result =
            create_diary(&db, &config, member.id, 1, sample_diary(), same_window, &mut rng).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        let next_window = first + TimeDelta::hours(24);
        create_diary(&db, &config, member.id, 1, sample_diary(), next_window, &mut rng).await?;
        assert_eq!(get_diaries_by_membership(&db, member.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_diaries_store_one() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let started = setup_started_challenge(&db, &config, 1, &[]).await?;
        let member = &started.memberships[0];
        let now = at(2024, 1, 3, 8);
        let mut rng_a = StdRng::seed_from_u64(1);
        let mut rng_b = StdRng::seed_from_u64(2);

        let (a, b) = tokio::join!(
            create_diary(&db, &config, member.id, 1, sample_diary(), now, &mut rng_a),
            create_diary(&db, &config, member.id, 1, sample_diary(), now, &mut rng_b),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(get_diaries_by_membership(&db, member.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_diary_row_maps_to_conflict() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let started = setup_started_challenge(&db, &config, 1, &[]).await?;
        let member = &started.memberships[0];
        let first = write_test_diary(&db, &config, member, at(2024, 1, 3, 8)).await?;

        // Skips the existence check and hits the unique index directly
        let result = insert_diary(
            &db,
            member.id,
            first.day_key,
            "second.jpg".to_string(),
            String::new(),
            at(2024, 1, 3, 9),
        )
        .await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        let other_day = first.day_key.succ_opt().unwrap();
        insert_diary(
            &db,
            member.id,
            other_day,
            "next.jpg".to_string(),
            String::new(),
            at(2024, 1, 4, 9),
        )
        .await?;
        assert_eq!(get_diaries_by_membership(&db, member.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_diary_checks_caller_and_status() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let mut rng = StdRng::seed_from_u64(9);
        let now = at(2024, 1, 2, 10);

        let started = setup_started_challenge(&db, &config, 1, &[2]).await?;
        let owner = &started.memberships[0];
        let result = create_diary(&db, &config, owner.id, 2, sample_diary(), now, &mut rng).await;
        assert!(matches!(result, Err(Error::Authorization { .. })));

        let mut blank = sample_diary();
        blank.goals[0].text = "  ".to_string();
        let result = create_diary(&db, &config, owner.id, 1, blank, now, &mut rng).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let pending = create_test_challenge(&db, &config, 3, &[]).await?;
        let result = create_diary(
            &db,
            &config,
            pending.memberships[0].id,
            3,
            sample_diary(),
            now,
            &mut rng,
        )
        .await;
        assert!(matches!(result, Err(Error::Policy { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_react_to_diary() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let started = setup_started_challenge(&db, &config, 1, &[2]).await?;
        let owner = &started.memberships[0];
        let diary = write_test_diary(&db, &config, owner, at(2024, 1, 2, 10)).await?;
        let now = at(2024, 1, 2, 11);

        let reaction = react_to_diary(&db, diary.id, 2, "🔥", now).await?;
        assert_eq!(reaction.emoji, "🔥");

        let outsider = react_to_diary(&db, diary.id, 99, "🔥", now).await;
        assert!(matches!(outsider, Err(Error::Authorization { .. })));
        let empty = react_to_diary(&db, diary.id, 2, " ", now).await;
        assert!(matches!(empty, Err(Error::Validation { .. })));

        let detail = get_diary_detail(&db, diary.id).await?;
        assert_eq!(detail.reactions, vec![reaction]);
        Ok(())
    }
}
