//! Inventory entry entity - how many of one item a membership holds.
//!
//! Entries are seeded with a zero count for every accepted member and every catalog
//! item when a challenge starts. Counts only change through single-statement
//! conditional updates so they never drop below zero.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Inventory entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_entries")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning membership
    pub membership_id: i64,
    /// Catalog item
    pub item_id: i64,
    /// Items held
    pub count: i32,
}

/// Defines relationships between `InventoryEntry` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one membership
    #[sea_orm(
        belongs_to = "super::membership::Entity",
        from = "Column::MembershipId",
        to = "super::membership::Column::Id",
        on_delete = "Cascade"
    )]
    Membership,
    /// Each entry counts one catalog item
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Membership.def()
    }
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
