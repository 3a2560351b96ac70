//! Item entity - catalog of consumable items members can spend on each other.
//!
//! The catalog is seeded from `config.toml`; the engine only reads it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What happens to the target when an item is used.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ItemEffect {
    /// Copies one of the sender's daily goals onto the target as a bonus goal
    #[sea_orm(string_value = "steal_goal")]
    StealGoal,
    /// Only recorded in the exchange log
    #[sea_orm(string_value = "nudge")]
    Nudge,
}

/// Item catalog database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    /// Unique identifier for the item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique within the catalog
    #[sea_orm(unique)]
    pub name: String,
    /// Side effect applied on use
    pub effect: ItemEffect,
}

/// Items have no outgoing relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
