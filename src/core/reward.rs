//! Weighted reward draw.
//!
//! A draw first picks a category (avatar, item or nothing) with [`select_reward`] and
//! then turns it into a concrete grant with [`grant_reward`]. The avatar weight can
//! be boosted by a call-site specific bonus before the weights are normalized.

use crate::{
    config::app::RewardWeights,
    core::catalog::{get_all_items, get_unowned_avatars},
    entities::{AvatarGrant, InventoryEntry, avatar_grant, inventory_entry, membership},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rand::{
    Rng,
    distributions::{Distribution, WeightedIndex},
    seq::SliceRandom,
};
use sea_orm::{
    Set,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;
use tracing::{debug, info};

/// Category of a reward draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RewardKind {
    /// A cosmetic avatar the user did not own yet
    Avatar,
    /// One consumable item added to the membership's inventory
    Item,
    /// No reward
    Nothing,
}

/// What a draw actually granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardOutcome {
    /// Granted category
    pub kind: RewardKind,
    /// Avatar or item id for `Avatar` / `Item`
    pub reward_id: Option<i64>,
}

impl RewardOutcome {
    /// The empty outcome.
    #[must_use]
    pub const fn nothing() -> Self {
        Self {
            kind: RewardKind::Nothing,
            reward_id: None,
        }
    }
}

/// Picks one option with probability proportional to its weight.
///
/// # Errors
/// Returns [`Error::Validation`] when the list is empty, a weight is negative or
/// not finite, or all weights are zero.
pub fn choose_weighted<T, R>(options: &[(T, f64)], rng: &mut R) -> Result<T>
where
    T: Copy,
    R: Rng + ?Sized,
{
    let index = WeightedIndex::new(options.iter().map(|(_, weight)| *weight)).map_err(|e| {
        Error::Validation {
            message: format!("invalid reward weights: {e}"),
        }
    })?;
    Ok(options[index.sample(rng)].0)
}

/// Draws a reward category; `avatar_bonus` is added to the avatar weight first.
pub fn select_reward<R>(weights: &RewardWeights, avatar_bonus: f64, rng: &mut R) -> Result<RewardKind>
where
    R: Rng + ?Sized,
{
    let avatar = (weights.avatar + avatar_bonus).max(0.0);
    choose_weighted(
        &[
            (RewardKind::Avatar, avatar),
            (RewardKind::Item, weights.item),
            (RewardKind::Nothing, weights.nothing),
        ],
        rng,
    )
}

/// Grants `avatar_id` to `user_id`; `false` when the user already owns it.
async fn insert_avatar_grant<C>(
    db: &C,
    user_id: i64,
    avatar_id: i64,
    now: DateTime<Utc>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let inserted = AvatarGrant::insert(avatar_grant::ActiveModel {
        user_id: Set(user_id),
        avatar_id: Set(avatar_id),
        is_equipped: Set(false),
        granted_at: Set(now),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([avatar_grant::Column::UserId, avatar_grant::Column::AvatarId])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(db)
    .await?;
    Ok(inserted > 0)
}

/// Turns a drawn category into a concrete grant for `membership`.
///
/// An avatar draw silently becomes [`RewardKind::Nothing`] when the user already owns
/// every avatar. An item draw fails with [`Error::NotFound`] when the membership has
/// no inventory entry for the drawn item, which means the inventory was never seeded.
pub async fn grant_reward<C, R>(
    db: &C,
    kind: RewardKind,
    membership: &membership::Model,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<RewardOutcome>
where
    C: ConnectionTrait,
    R: Rng + ?Sized,
{
    match kind {
        RewardKind::Nothing => Ok(RewardOutcome::nothing()),
        RewardKind::Avatar => {
            let candidates = get_unowned_avatars(db, membership.user_id).await?;
            let Some(avatar) = candidates.choose(rng) else {
                debug!(
                    user_id = membership.user_id,
                    "User owns every avatar, avatar reward becomes nothing"
                );
                return Ok(RewardOutcome::nothing());
            };
            if !insert_avatar_grant(db, membership.user_id, avatar.id, now).await? {
                debug!(
                    user_id = membership.user_id,
                    avatar_id = avatar.id,
                    "Avatar was granted concurrently, reward becomes nothing"
                );
                return Ok(RewardOutcome::nothing());
            }
            info!(user_id = membership.user_id, avatar_id = avatar.id, "Granted avatar");
            Ok(RewardOutcome {
                kind,
                reward_id: Some(avatar.id),
            })
        }
        RewardKind::Item => {
            let items = get_all_items(db).await?;
            let item = items
                .choose(rng)
                .ok_or_else(|| Error::not_found("item", "catalog is empty"))?;
            let updated = InventoryEntry::update_many()
                .col_expr(
                    inventory_entry::Column::Count,
                    Expr::col(inventory_entry::Column::Count).add(1),
                )
                .filter(inventory_entry::Column::MembershipId.eq(membership.id))
                .filter(inventory_entry::Column::ItemId.eq(item.id))
                .exec(db)
                .await?;
            if updated.rows_affected == 0 {
                return Err(Error::not_found(
                    "inventory entry",
                    format!("membership {} / item {}", membership.id, item.id),
                ));
            }
            info!(membership_id = membership.id, item_id = item.id, "Granted item");
            Ok(RewardOutcome {
                kind,
                reward_id: Some(item.id),
            })
        }
    }
}

/// [`select_reward`] followed by [`grant_reward`].
pub async fn draw_reward<C, R>(
    db: &C,
    weights: &RewardWeights,
    avatar_bonus: f64,
    membership: &membership::Model,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<RewardOutcome>
where
    C: ConnectionTrait,
    R: Rng + ?Sized,
{
    let kind = select_reward(weights, avatar_bonus, rng)?;
    grant_reward(db, kind, membership, now, rng).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::catalog::get_unowned_avatars;
    use crate::core::item::get_inventory;
    use crate::test_utils::*;
    use rand::{SeedableRng, rngs::StdRng};
    use sea_orm::EntityTrait;

    #[test]
    fn test_choose_weighted_converges_to_proportions() {
        let mut rng = StdRng::seed_from_u64(7);
        let weights = RewardWeights {
            avatar: 10.0,
            item: 30.0,
            nothing: 60.0,
        };
        let draws = 100_000;
        let (mut avatar, mut item, mut nothing) = (0_u32, 0_u32, 0_u32);
        for _ in 0..draws {
            match select_reward(&weights, 0.0, &mut rng).unwrap() {
                RewardKind::Avatar => avatar += 1,
                RewardKind::Item => item += 1,
                RewardKind::Nothing => nothing += 1,
            }
        }
        let share = |n: u32| f64::from(n) / f64::from(draws);
        assert!((share(avatar) - 0.10).abs() < 0.01, "avatar {}", share(avatar));
        assert!((share(item) - 0.30).abs() < 0.01, "item {}", share(item));
        assert!((share(nothing) - 0.60).abs() < 0.01, "nothing {}", share(nothing));
    }

    #[test]
    fn test_avatar_bonus_is_added_before_normalization() {
        let mut rng = StdRng::seed_from_u64(11);
        let weights = RewardWeights {
            avatar: 0.0,
            item: 0.0,
            nothing: 0.0,
        };
        // Only the bonus carries weight, so every draw is an avatar
        for _ in 0..100 {
            assert_eq!(select_reward(&weights, 5.0, &mut rng).unwrap(), RewardKind::Avatar);
        }
    }

    #[test]
    fn test_choose_weighted_rejects_all_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = choose_weighted(&[("a", 0.0), ("b", 0.0)], &mut rng);
        assert!(matches!(result, Err(Error::Validation { .. })));
        let empty: [(u8, f64); 0] = [];
        assert!(choose_weighted(&empty, &mut rng).is_err());
    }

    #[tokio::test]
    async fn test_item_grant_increments_inventory() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let started = setup_started_challenge(&db, &config, 1, &[]).await?;
        let member = &started.memberships[0];
        let mut rng = StdRng::seed_from_u64(3);

        let outcome = grant_reward(&db, RewardKind::Item, member, at(2024, 1, 2, 0), &mut rng).await?;
        assert_eq!(outcome.kind, RewardKind::Item);
        let item_id = outcome.reward_id.unwrap();

        let inventory = get_inventory(&db, member.id).await?;
        let total: i32 = inventory.iter().map(|e| e.count).sum();
        assert_eq!(total, 1);
        assert_eq!(inventory.iter().find(|e| e.item_id == item_id).unwrap().count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_item_grant_without_inventory_is_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        // Not started, so no inventory was seeded
        let created = create_test_challenge(&db, &config, 1, &[]).await?;
        let mut rng = StdRng::seed_from_u64(3);

        let result = grant_reward(
            &db,
            RewardKind::Item,
            &created.memberships[0],
            at(2024, 1, 2, 0),
            &mut rng,
        )
        .await;
        assert!(matches!(result, Err(Error::NotFound { entity: "inventory entry", .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_avatar_grant_degrades_to_nothing_when_all_owned() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let created = create_test_challenge(&db, &config, 1, &[]).await?;
        let member = &created.memberships[0];
        let mut rng = StdRng::seed_from_u64(5);
        let now = at(2024, 1, 2, 0);

        let mut granted = Vec::new();
        for _ in 0..config.avatars.len() {
            let outcome = grant_reward(&db, RewardKind::Avatar, member, now, &mut rng).await?;
            assert_eq!(outcome.kind, RewardKind::Avatar);
            granted.push(outcome.reward_id.unwrap());
        }
        granted.sort_unstable();
        granted.dedup();
        assert_eq!(granted.len(), config.avatars.len());

        let outcome = grant_reward(&db, RewardKind::Avatar, member, now, &mut rng).await?;
        assert_eq!(outcome, RewardOutcome::nothing());
        assert_eq!(
            AvatarGrant::find().all(&db).await?.len(),
            config.avatars.len()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_granting_an_owned_avatar_is_a_no_op() -> Result<()> {
        let db = setup_test_db().await?;
        let now = at(2024, 1, 2, 0);
        let avatar = get_unowned_avatars(&db, 1).await?.remove(0);

        assert!(insert_avatar_grant(&db, 1, avatar.id, now).await?);
        // A racing draw that picked the same avatar
        assert!(!insert_avatar_grant(&db, 1, avatar.id, now).await?);
        assert_eq!(AvatarGrant::find().all(&db).await?.len(), 1);
        Ok(())
    }
}
