//! Item and avatar catalogs.
//!
//! Both catalogs are seeded from `config.toml` on startup and treated as read-only by
//! the rest of the engine.

use crate::{
    config::AppConfig,
    entities::{Avatar, AvatarGrant, Item, avatar, avatar_grant, item},
    errors::Result,
};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use tracing::info;

/// Inserts every configured item and avatar whose name is not in the database yet.
///
/// Existing rows are left untouched, so the function is safe to run on every start.
/// Returns how many items and avatars were inserted.
pub async fn seed_catalog(db: &DatabaseConnection, config: &AppConfig) -> Result<(usize, usize)> {
    let mut items_added = 0;
    for entry in &config.items {
        let exists = Item::find()
            .filter(item::Column::Name.eq(entry.name.as_str()))
            .one(db)
            .await?
            .is_some();
        if !exists {
            item::ActiveModel {
                name: Set(entry.name.clone()),
                effect: Set(entry.effect),
                ..Default::default()
            }
            .insert(db)
            .await?;
            items_added += 1;
        }
    }

    let mut avatars_added = 0;
    for entry in &config.avatars {
        let exists = Avatar::find()
            .filter(avatar::Column::Name.eq(entry.name.as_str()))
            .one(db)
            .await?
            .is_some();
        if !exists {
            avatar::ActiveModel {
                name: Set(entry.name.clone()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            avatars_added += 1;
        }
    }

    info!(items_added, avatars_added, "Catalog seeded");
    Ok((items_added, avatars_added))
}

/// Every catalog item, ordered by id.
pub async fn get_all_items<C>(db: &C) -> Result<Vec<item::Model>>
where
    C: ConnectionTrait,
{
    Item::find()
        .order_by_asc(item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Catalog avatars `user_id` does not own yet.
pub async fn get_unowned_avatars<C>(db: &C, user_id: i64) -> Result<Vec<avatar::Model>>
where
    C: ConnectionTrait,
{
    let owned: Vec<i64> = AvatarGrant::find()
        .select_only()
        .column(avatar_grant::Column::AvatarId)
        .filter(avatar_grant::Column::UserId.eq(user_id))
        .into_tuple()
        .all(db)
        .await?;

    Avatar::find()
        .filter(avatar::Column::Id.is_not_in(owned))
        .order_by_asc(avatar::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The avatar `user_id` currently wears, if any.
pub async fn get_equipped_avatar<C>(db: &C, user_id: i64) -> Result<Option<i64>>
where
    C: ConnectionTrait,
{
    Ok(AvatarGrant::find()
        .filter(avatar_grant::Column::UserId.eq(user_id))
        .filter(avatar_grant::Column::IsEquipped.eq(true))
        .one(db)
        .await?
        .map(|grant| grant.avatar_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_seed_catalog_is_idempotent() -> Result<()> {
        // setup_test_db already seeds once
        let db = setup_test_db().await?;
        let config = test_config();

        let (items, avatars) = seed_catalog(&db, &config).await?;
        assert_eq!((items, avatars), (0, 0));
        assert_eq!(get_all_items(&db).await?.len(), config.items.len());
        Ok(())
    }

    #[tokio::test]
    async fn test_unowned_avatars_excludes_grants() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        let all = get_unowned_avatars(&db, 1).await?;
        assert_eq!(all.len(), config.avatars.len());

        avatar_grant::ActiveModel {
            user_id: Set(1),
            avatar_id: Set(all[0].id),
            is_equipped: Set(true),
            granted_at: Set(at(2024, 1, 1, 0)),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let remaining = get_unowned_avatars(&db, 1).await?;
        assert_eq!(remaining.len(), all.len() - 1);
        assert!(remaining.iter().all(|a| a.id != all[0].id));
        // Other users are unaffected
        assert_eq!(get_unowned_avatars(&db, 2).await?.len(), all.len());
        assert_eq!(get_equipped_avatar(&db, 1).await?, Some(all[0].id));
        assert_eq!(get_equipped_avatar(&db, 2).await?, None);
        Ok(())
    }
}
