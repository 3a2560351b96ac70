//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod avatar;
pub mod avatar_grant;
pub mod bonus_goal;
pub mod challenge;
pub mod daily_goal;
pub mod diary;
pub mod diary_reaction;
pub mod exchange_log;
pub mod inventory_entry;
pub mod item;
pub mod membership;
pub mod system_state;

// Re-export specific types to avoid conflicts
pub use avatar::{Entity as Avatar, Model as AvatarModel};
pub use avatar_grant::{Entity as AvatarGrant, Model as AvatarGrantModel};
pub use bonus_goal::{Entity as BonusGoal, Model as BonusGoalModel};
pub use challenge::{ChallengeStatus, Entity as Challenge, Model as ChallengeModel};
pub use daily_goal::{Entity as DailyGoal, Model as DailyGoalModel};
pub use diary::{Entity as Diary, Model as DiaryModel};
pub use diary_reaction::{Entity as DiaryReaction, Model as DiaryReactionModel};
pub use exchange_log::{Entity as ExchangeLog, Model as ExchangeLogModel};
pub use inventory_entry::{Entity as InventoryEntry, Model as InventoryEntryModel};
pub use item::{Entity as Item, ItemEffect, Model as ItemModel};
pub use membership::{Entity as Membership, InviteStatus, Model as MembershipModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
