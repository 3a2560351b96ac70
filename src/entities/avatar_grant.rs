//! Avatar grant entity - records that a user owns an avatar.
//!
//! Grants are created by the reward draw; equipping is handled elsewhere and only
//! read here.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Avatar grant database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "avatar_grants")]
pub struct Model {
    /// Unique identifier for the grant
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Granted avatar
    pub avatar_id: i64,
    /// Whether the user currently wears this avatar
    pub is_equipped: bool,
    /// When the avatar was granted
    pub granted_at: DateTimeUtc,
}

/// Defines relationships between `AvatarGrant` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each grant refers to one catalog avatar
    #[sea_orm(
        belongs_to = "super::avatar::Entity",
        from = "Column::AvatarId",
        to = "super::avatar::Column::Id"
    )]
    Avatar,
}

impl Related<super::avatar::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Avatar.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
