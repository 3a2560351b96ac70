//! Challenge entity - the shared, time-boxed commitment a team pursues together.
//!
//! A challenge is created `PENDING`, promoted to `PROGRESS` when it starts and
//! closed as `COMPLETE` once its end date has passed. Challenges with members are
//! soft-deleted (`is_deleted` + `deleted_at`) rather than removed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a challenge.
///
/// `Failed` is part of the stored model but nothing transitions into it yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ChallengeStatus {
    /// Created, collecting invites
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Running; diaries and items are accepted
    #[sea_orm(string_value = "PROGRESS")]
    Progress,
    /// Closed after the end date
    #[sea_orm(string_value = "COMPLETE")]
    Complete,
    /// Reserved terminal state
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

impl ChallengeStatus {
    /// Whether no further transition may leave this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Challenge database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "challenges")]
pub struct Model {
    /// Unique identifier for the challenge
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Emoji shown in the challenge header
    pub header_emoji: String,
    /// First instant of the challenge window
    pub start_at: DateTimeUtc,
    /// Last instant of the challenge window
    pub end_at: DateTimeUtc,
    /// Current lifecycle state
    pub status: ChallengeStatus,
    /// User who created the challenge
    pub created_by: i64,
    /// When the challenge was created
    pub created_at: DateTimeUtc,
    /// Soft delete flag
    pub is_deleted: bool,
    /// When the challenge was soft-deleted
    pub deleted_at: Option<DateTimeUtc>,
}

/// Defines relationships between Challenge and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One challenge has many memberships
    #[sea_orm(has_many = "super::membership::Entity")]
    Memberships,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
