//! Membership entity - one user's participation in one challenge.
//!
//! Carries the owner flag, the invite state, a free-text status comment and whether
//! the member has already opened the completion log. A user holds at most one
//! membership per challenge; the composite unique index lives in
//! [`crate::config::database::create_tables`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Answer to a challenge invitation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum InviteStatus {
    /// Invited, no answer yet
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Member takes part
    #[sea_orm(string_value = "ACCEPTED")]
    Accepted,
    /// Member refused; rows in this state are deleted immediately
    #[sea_orm(string_value = "DECLINED")]
    Declined,
}

/// Membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "memberships")]
pub struct Model {
    /// Unique identifier for the membership
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Challenge this membership belongs to
    pub challenge_id: i64,
    /// Participating user
    pub user_id: i64,
    /// Exactly one membership per challenge is the owner
    pub is_owner: bool,
    /// Invitation answer
    pub invite_status: InviteStatus,
    /// Status message shown next to the member
    pub comment: String,
    /// Whether the completion log reward has been claimed
    pub viewed_completion_log: bool,
    /// When the membership row was created
    pub joined_at: DateTimeUtc,
}

/// Defines relationships between Membership and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership belongs to one challenge
    #[sea_orm(
        belongs_to = "super::challenge::Entity",
        from = "Column::ChallengeId",
        to = "super::challenge::Column::Id",
        on_delete = "Cascade"
    )]
    Challenge,
    /// One membership writes many diaries
    #[sea_orm(has_many = "super::diary::Entity")]
    Diaries,
    /// One membership has many daily goals
    #[sea_orm(has_many = "super::daily_goal::Entity")]
    DailyGoals,
    /// One membership has many bonus goals
    #[sea_orm(has_many = "super::bonus_goal::Entity")]
    BonusGoals,
    /// One membership holds one inventory entry per catalog item
    #[sea_orm(has_many = "super::inventory_entry::Entity")]
    Inventory,
}

impl Related<super::challenge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Challenge.def()
    }
}

impl Related<super::diary::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Diaries.def()
    }
}

impl Related<super::daily_goal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DailyGoals.def()
    }
}

impl Related<super::bonus_goal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BonusGoals.def()
    }
}

impl Related<super::inventory_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
