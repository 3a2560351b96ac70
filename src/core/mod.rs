//! Core business logic - framework-agnostic challenge lifecycle, scoring and rewards.
//!
//! Every operation is a free `async fn` over a `sea-orm` connection. Operations that
//! depend on the clock take `now` explicitly and operations that draw randomness take
//! the random source explicitly, so both can be pinned in tests.

/// Item and avatar catalogs
pub mod catalog;
/// Completion log viewing and its reward draw
pub mod completion_log;
/// The shifted local day used for diary uniqueness
pub mod day_window;
/// Diary submission and reactions
pub mod diary;
/// Bonus and daily goal operations
pub mod goal;
/// Item exchange between members
pub mod item;
/// Challenge state machine
pub mod lifecycle;
/// Membership lookups shared by every component
pub mod membership;
/// Progress scoring
pub mod progress;
/// Weighted reward draw
pub mod reward;
/// Scheduled promotion and completion runs
pub mod transition;
