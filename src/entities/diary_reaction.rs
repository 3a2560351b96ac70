//! Diary reaction entity - an emoji one member leaves on another member's diary.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Diary reaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "diary_reactions")]
pub struct Model {
    /// Unique identifier for the reaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Diary being reacted to
    pub diary_id: i64,
    /// Membership of the reacting user
    pub membership_id: i64,
    /// The emoji itself
    pub emoji: String,
    /// When the reaction was left
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `DiaryReaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each reaction belongs to one diary
    #[sea_orm(
        belongs_to = "super::diary::Entity",
        from = "Column::DiaryId",
        to = "super::diary::Column::Id",
        on_delete = "Cascade"
    )]
    Diary,
    /// Each reaction is left by one membership
    #[sea_orm(
        belongs_to = "super::membership::Entity",
        from = "Column::MembershipId",
        to = "super::membership::Column::Id",
        on_delete = "Cascade"
    )]
    Membership,
}

impl Related<super::diary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Diary.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
