//! Exchange log entity - immutable record of one member spending an item on another.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Exchange log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "exchange_logs")]
pub struct Model {
    /// Unique identifier for the log row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Membership that spent the item
    pub sender_membership_id: i64,
    /// Membership the item was used on
    pub recipient_membership_id: i64,
    /// Item that was spent
    pub item_id: i64,
    /// Whether the recipient has seen this exchange
    pub is_viewed: bool,
    /// When the item was used
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `ExchangeLog` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Sending membership
    #[sea_orm(
        belongs_to = "super::membership::Entity",
        from = "Column::SenderMembershipId",
        to = "super::membership::Column::Id",
        on_delete = "Cascade"
    )]
    Sender,
    /// Receiving membership
    #[sea_orm(
        belongs_to = "super::membership::Entity",
        from = "Column::RecipientMembershipId",
        to = "super::membership::Column::Id",
        on_delete = "Cascade"
    )]
    Recipient,
    /// Spent item
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
}

impl ActiveModelBehavior for ActiveModel {}
