//! Daily and bonus goal queries, and bonus goal completion.

use crate::{
    core::membership::get_own_membership,
    entities::{BonusGoal, DailyGoal, bonus_goal, daily_goal},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{QueryOrder, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

/// Daily goals of a membership, optionally limited to one day.
pub async fn get_daily_goals(
    db: &DatabaseConnection,
    membership_id: i64,
    day: Option<NaiveDate>,
) -> Result<Vec<daily_goal::Model>> {
    let mut query = DailyGoal::find().filter(daily_goal::Column::MembershipId.eq(membership_id));
    if let Some(day) = day {
        query = query.filter(daily_goal::Column::DayKey.eq(day));
    }
    query
        .order_by_asc(daily_goal::Column::DayKey)
        .order_by_asc(daily_goal::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Bonus goals of a membership, oldest window first.
pub async fn get_bonus_goals(
    db: &DatabaseConnection,
    membership_id: i64,
) -> Result<Vec<bonus_goal::Model>> {
    BonusGoal::find()
        .filter(bonus_goal::Column::MembershipId.eq(membership_id))
        .order_by_asc(bonus_goal::Column::WindowStart)
        .order_by_asc(bonus_goal::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks a bonus goal done with its proof, while its window is open.
///
/// # Errors
/// [`Error::Authorization`] when the goal belongs to another user's membership,
/// [`Error::Conflict`] when it is already done, [`Error::Policy`] outside
/// `[window_start, window_end)`.
pub async fn complete_bonus_goal(
    db: &DatabaseConnection,
    goal_id: i64,
    caller: i64,
    proof_image: String,
    now: DateTime<Utc>,
) -> Result<bonus_goal::Model> {
    let txn = db.begin().await?;
    let goal = BonusGoal::find_by_id(goal_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("bonus goal", goal_id))?;
    get_own_membership(&txn, goal.membership_id, caller).await?;

    if goal.is_done {
        return Err(Error::Conflict {
            message: format!("bonus goal {goal_id} is already done"),
        });
    }
    if now < goal.window_start || now >= goal.window_end {
        return Err(Error::Policy {
            message: format!("bonus goal {goal_id} is outside its window"),
        });
    }

    let updated = BonusGoal::update_many()
        .col_expr(bonus_goal::Column::IsDone, Expr::value(true))
        .col_expr(bonus_goal::Column::ProofImage, Expr::value(Some(proof_image)))
        .filter(bonus_goal::Column::Id.eq(goal_id))
        .filter(bonus_goal::Column::IsDone.eq(false))
        .exec(&txn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(Error::Conflict {
            message: format!("bonus goal {goal_id} is already done"),
        });
    }

    let goal = BonusGoal::find_by_id(goal_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("bonus goal", goal_id))?;
    txn.commit().await?;

    info!(goal_id, membership_id = goal.membership_id, "Bonus goal completed");
    Ok(goal)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::TimeDelta;
    use sea_orm::Set;

    async fn open_goal(db: &DatabaseConnection, membership_id: i64) -> Result<bonus_goal::Model> {
        bonus_goal::ActiveModel {
            membership_id: Set(membership_id),
            text: Set("cold shower".to_string()),
            is_done: Set(false),
            window_start: Set(at(2024, 1, 3, 0)),
            window_end: Set(at(2024, 1, 4, 0)),
            proof_image: Set(None),
            created_at: Set(at(2024, 1, 3, 0)),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(Into::into)
    }

    #[tokio::test]
    async fn test_complete_bonus_goal_inside_window() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let started = setup_started_challenge(&db, &config, 1, &[2]).await?;
        let member = &started.memberships[0];
        let goal = open_goal(&db, member.id).await?;

        let denied =
            complete_bonus_goal(&db, goal.id, 2, "p.jpg".to_string(), at(2024, 1, 3, 5)).await;
        assert!(matches!(denied, Err(Error::Authorization { .. })));

        let done = complete_bonus_goal(&db, goal.id, 1, "p.jpg".to_string(), at(2024, 1, 3, 5))
            .await?;
        assert!(done.is_done);
        assert_eq!(done.proof_image.as_deref(), Some("p.jpg"));

        let again =
            complete_bonus_goal(&db, goal.id, 1, "p.jpg".to_string(), at(2024, 1, 3, 6)).await;
        assert!(matches!(again, Err(Error::Conflict { .. })));

        assert_eq!(get_bonus_goals(&db, member.id).await?, vec![done]);
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_bonus_goal_outside_window() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let started = setup_started_challenge(&db, &config, 1, &[]).await?;
        let goal = open_goal(&db, started.memberships[0].id).await?;

        let early = complete_bonus_goal(
            &db,
            goal.id,
            1,
            "p.jpg".to_string(),
            goal.window_start - TimeDelta::seconds(1),
        )
        .await;
        assert!(matches!(early, Err(Error::Policy { .. })));

        let late = complete_bonus_goal(&db, goal.id, 1, "p.jpg".to_string(), goal.window_end).await;
        assert!(matches!(late, Err(Error::Policy { .. })));
        assert!(goal.is_failed_at(goal.window_end));
        Ok(())
    }

    #[tokio::test]
    async fn test_get_daily_goals_by_day() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let started = setup_started_challenge(&db, &config, 1, &[]).await?;
        let member = &started.memberships[0];
        let first = write_test_diary(&db, &config, member, at(2024, 1, 2, 9)).await?;
        write_test_diary(&db, &config, member, at(2024, 1, 3, 9)).await?;

        let all = get_daily_goals(&db, member.id, None).await?;
        let day_one = get_daily_goals(&db, member.id, Some(first.day_key)).await?;
        assert_eq!(all.len(), day_one.len() * 2);
        assert!(day_one.iter().all(|g| g.diary_id == Some(first.id)));
        Ok(())
    }
}
