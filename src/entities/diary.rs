//! Diary entity - the once-per-day proof of completion a member submits.
//!
//! `day_key` is the calendar date on which the diary's day window closes; the
//! (membership, day) pair is unique so concurrent duplicate submissions cannot both land.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Diary (completion record) database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "diaries")]
pub struct Model {
    /// Unique identifier for the diary
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Membership that wrote the diary
    pub membership_id: i64,
    /// Day window this diary counts for
    pub day_key: Date,
    /// Uploaded proof image reference
    pub proof_image: String,
    /// Free text written with the proof
    pub comment: String,
    /// Submission time
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Diary and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each diary belongs to one membership
    #[sea_orm(
        belongs_to = "super::membership::Entity",
        from = "Column::MembershipId",
        to = "super::membership::Column::Id",
        on_delete = "Cascade"
    )]
    Membership,
    /// Reactions left by other members
    #[sea_orm(has_many = "super::diary_reaction::Entity")]
    Reactions,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Membership.def()
    }
}

impl Related<super::diary_reaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
