//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. Composite unique indexes, which the
//! entity attributes cannot express, are added right after: they are what makes
//! "one membership per user per challenge", "one diary per membership per day" and
//! "one inventory entry per membership per item" hold under concurrent requests.

use crate::entities::{
    Avatar, AvatarGrant, BonusGoal, Challenge, DailyGoal, Diary, DiaryReaction, ExchangeLog,
    InventoryEntry, Item, Membership, SystemState, avatar_grant, diary, inventory_entry,
    membership,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::path::Path;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/challenge_buddy.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// For file-backed `SQLite` URLs the parent directory is created first.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let url = get_database_url();
    if let Some(dir) = sqlite_parent_dir(&url) {
        std::fs::create_dir_all(dir)?;
    }
    Database::connect(&url).await.map_err(Into::into)
}

fn sqlite_parent_dir(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split('?').next()?;
    Path::new(path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("ux_memberships_challenge_user")
            .table(Membership)
            .col(membership::Column::ChallengeId)
            .col(membership::Column::UserId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_diaries_membership_day")
            .table(Diary)
            .col(diary::Column::MembershipId)
            .col(diary::Column::DayKey)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_inventory_membership_item")
            .table(InventoryEntry)
            .col(inventory_entry::Column::MembershipId)
            .col(inventory_entry::Column::ItemId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_avatar_grants_user_avatar")
            .table(AvatarGrant)
            .col(avatar_grant::Column::UserId)
            .col(avatar_grant::Column::AvatarId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

/// Creates all tables and unique indexes if they do not exist yet.
///
/// Parents are created before children so foreign keys always point at an existing table.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(Challenge),
        schema.create_table_from_entity(Membership),
        schema.create_table_from_entity(Item),
        schema.create_table_from_entity(Avatar),
        schema.create_table_from_entity(Diary),
        schema.create_table_from_entity(DiaryReaction),
        schema.create_table_from_entity(DailyGoal),
        schema.create_table_from_entity(BonusGoal),
        schema.create_table_from_entity(InventoryEntry),
        schema.create_table_from_entity(ExchangeLog),
        schema.create_table_from_entity(AvatarGrant),
        schema.create_table_from_entity(SystemState),
    ];

    for mut table in tables {
        let statement = table.if_not_exists().to_owned();
        db.execute(builder.build(&statement)).await?;
    }

    for index in unique_indexes() {
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}
