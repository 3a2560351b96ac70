//! Bonus goal entity - a goal outside the daily cadence with its own active window.
//!
//! A bonus goal that is still not done once `window_end` has passed counts as failed
//! when progress is scored.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bonus goal database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bonus_goals")]
pub struct Model {
    /// Unique identifier for the goal
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning membership
    pub membership_id: i64,
    /// Goal text
    pub text: String,
    /// Whether the goal was completed inside its window
    pub is_done: bool,
    /// Window start (inclusive)
    pub window_start: DateTimeUtc,
    /// Window end (exclusive)
    pub window_end: DateTimeUtc,
    /// Proof image submitted on completion
    pub proof_image: Option<String>,
    /// When the goal was created
    pub created_at: DateTimeUtc,
}

impl Model {
    /// A goal is failed once its window has closed without completion.
    #[must_use]
    pub fn is_failed_at(&self, now: DateTimeUtc) -> bool {
        !self.is_done && self.window_end <= now
    }
}

/// Defines relationships between `BonusGoal` and other entities
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
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Membership.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
