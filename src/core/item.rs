//! Item exchange: one member spends an item from their inventory on another member.
//!
//! Spending is a single conditional `UPDATE ... SET count = count - 1 WHERE count > 0`,
//! so concurrent spends of the last item cannot both succeed and counts never go
//! negative. A `steal_goal` item additionally copies one random daily goal of the
//! sender into a bonus goal of the target.

use crate::{
    config::AppConfig,
    core::{
        catalog::get_equipped_avatar,
        membership::{find_membership_for_user, get_live_challenge, get_membership, get_own_membership},
    },
    entities::{
        ChallengeStatus, DailyGoal, ExchangeLog, InventoryEntry, Item, ItemEffect, bonus_goal,
        daily_goal, exchange_log, inventory_entry, item,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, TimeDelta, Utc};
use rand::{Rng, seq::SliceRandom};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{debug, info};

/// Result of a successful [`use_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUseReceipt {
    /// The exchange log row written
    pub exchange: exchange_log::Model,
    /// Item that was spent
    pub item: item::Model,
    /// Items of this kind the sender has left
    pub remaining: i32,
    /// Bonus goal created on the target by a `steal_goal` item
    pub stolen_goal: Option<bonus_goal::Model>,
    /// Avatar the sender currently wears, shown alongside the exchange
    pub acting_avatar_id: Option<i64>,
}

/// Inventory of a membership, ordered by item id.
pub async fn get_inventory<C>(db: &C, membership_id: i64) -> Result<Vec<inventory_entry::Model>>
where
    C: ConnectionTrait,
{
    InventoryEntry::find()
        .filter(inventory_entry::Column::MembershipId.eq(membership_id))
        .order_by_asc(inventory_entry::Column::ItemId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Spends one `item_id` from the caller's membership in the target's challenge on
/// `target_membership_id`.
///
/// # Errors
/// - [`Error::NotFound`] for an unknown target, item or inventory entry, or a
///   `steal_goal` item while the sender has no daily goals
/// - [`Error::Policy`] when the challenge is not running or ends within
///   `item_cutoff_hours`
/// - [`Error::Authorization`] when the caller is not in the target's challenge
/// - [`Error::SelfTarget`] when the target is the caller
/// - [`Error::InsufficientInventory`] when the entry holds no items
pub async fn use_item<R>(
    db: &DatabaseConnection,
    config: &AppConfig,
    item_id: i64,
    caller: i64,
    target_membership_id: i64,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<ItemUseReceipt>
where
    R: Rng + ?Sized,
{
    let target = get_membership(db, target_membership_id).await?;
    let challenge = get_live_challenge(db, target.challenge_id).await?;
    if challenge.status != ChallengeStatus::Progress {
        return Err(Error::Policy {
            message: "items can only be used while the challenge runs".to_string(),
        });
    }
    if challenge.end_at - now < TimeDelta::hours(config.rules.item_cutoff_hours) {
        return Err(Error::Policy {
            message: format!(
                "items cannot be used within {} hours of the challenge end",
                config.rules.item_cutoff_hours
            ),
        });
    }

    let sender = find_membership_for_user(db, challenge.id, caller)
        .await?
        .ok_or_else(|| Error::Authorization {
            message: format!("user {caller} is not a member of this challenge"),
        })?;
    if sender.id == target.id {
        return Err(Error::SelfTarget);
    }
    let item = Item::find_by_id(item_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("item", item_id))?;

    let txn = db.begin().await?;

    let entry = InventoryEntry::find()
        .filter(inventory_entry::Column::MembershipId.eq(sender.id))
        .filter(inventory_entry::Column::ItemId.eq(item.id))
        .one(&txn)
        .await?
        .ok_or_else(|| {
            Error::not_found(
                "inventory entry",
                format!("membership {} / item {}", sender.id, item.id),
            )
        })?;

    // Pick the goal before spending so a sender without goals keeps the item
    let goal_to_steal = if item.effect == ItemEffect::StealGoal {
        let goals = DailyGoal::find()
            .filter(daily_goal::Column::MembershipId.eq(sender.id))
            .all(&txn)
            .await?;
        let goal = goals
            .choose(rng)
            .cloned()
            .ok_or_else(|| Error::not_found("daily goal", format!("membership {}", sender.id)))?;
        Some(goal)
    } else {
        None
    };

    let spent = InventoryEntry::update_many()
        .col_expr(
            inventory_entry::Column::Count,
            Expr::col(inventory_entry::Column::Count).sub(1),
        )
        .filter(inventory_entry::Column::Id.eq(entry.id))
        .filter(inventory_entry::Column::Count.gt(0))
        .exec(&txn)
        .await?;
    if spent.rows_affected == 0 {
        return Err(Error::InsufficientInventory {
            membership_id: sender.id,
            item_id: item.id,
        });
    }

    let exchange = exchange_log::ActiveModel {
        sender_membership_id: Set(sender.id),
        recipient_membership_id: Set(target.id),
        item_id: Set(item.id),
        is_viewed: Set(false),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let stolen_goal = match goal_to_steal {
        Some(goal) => {
            let window_end = now + TimeDelta::hours(config.rules.stolen_goal_window_hours);
            let created = bonus_goal::ActiveModel {
                membership_id: Set(target.id),
                text: Set(goal.text),
                is_done: Set(false),
                window_start: Set(now),
                window_end: Set(window_end),
                proof_image: Set(None),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            debug!(
                from = sender.id,
                to = target.id,
                goal_id = created.id,
                "Copied daily goal into bonus goal"
            );
            Some(created)
        }
        None => None,
    };

    let remaining = InventoryEntry::find_by_id(entry.id)
        .one(&txn)
        .await?
        .map_or(0, |e| e.count);
    let acting_avatar_id = get_equipped_avatar(&txn, caller).await?;

    txn.commit().await?;

    info!(
        sender = sender.id,
        recipient = target.id,
        item_id = item.id,
        remaining,
        "Item used"
    );
    Ok(ItemUseReceipt {
        exchange,
        item,
        remaining,
        stolen_goal,
        acting_avatar_id,
    })
}

/// Returns the exchanges the caller received and has not seen, and marks them seen.
pub async fn take_unviewed_exchanges(
    db: &DatabaseConnection,
    membership_id: i64,
    caller: i64,
) -> Result<Vec<exchange_log::Model>> {
    let txn = db.begin().await?;
    get_own_membership(&txn, membership_id, caller).await?;

    let unviewed = ExchangeLog::find()
        .filter(exchange_log::Column::RecipientMembershipId.eq(membership_id))
        .filter(exchange_log::Column::IsViewed.eq(false))
        .order_by_asc(exchange_log::Column::CreatedAt)
        .order_by_asc(exchange_log::Column::Id)
        .all(&txn)
        .await?;
    if !unviewed.is_empty() {
        ExchangeLog::update_many()
            .col_expr(exchange_log::Column::IsViewed, Expr::value(true))
            .filter(exchange_log::Column::Id.is_in(unviewed.iter().map(|e| e.id)))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;
    Ok(unviewed)
}
