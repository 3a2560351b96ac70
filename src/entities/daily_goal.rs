//! Daily goal entity - a goal scoped to the day it was written.
//!
//! Daily goals are submitted together with a diary and keep a link to it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Daily goal database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_goals")]
pub struct Model {
    /// Unique identifier for the goal
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning membership
    pub membership_id: i64,
    /// Diary the goal was submitted with
    pub diary_id: Option<i64>,
    /// Goal text
    pub text: String,
    /// Whether the member reported it done
    pub is_done: bool,
    /// Day window the goal belongs to
    pub day_key: Date,
    /// When the goal was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `DailyGoal` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each goal belongs to one membership
    #[sea_orm(
        belongs_to = "super::membership::Entity",
        from = "Column::MembershipId",
        to = "super::membership::Column::Id",
        on_delete = "Cascade"
    )]
    Membership,
    /// Each goal may be attached to one diary
    #[sea_orm(
        belongs_to = "super::diary::Entity",
        from = "Column::DiaryId",
        to = "super::diary::Column::Id",
        on_delete = "Cascade"
    )]
    Diary,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Membership.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
