//! Avatar entity - catalog of cosmetics the reward draw can grant.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Avatar catalog database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "avatars")]
pub struct Model {
    /// Unique identifier for the avatar
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique within the catalog
    #[sea_orm(unique)]
    pub name: String,
}

/// Avatars have no outgoing relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
