//! Application configuration loading from config.toml
//!
//! This module provides the [`AppConfig`] the engine is built with: membership caps,
//! scoring constants, reward weight profiles, the scheduler cadence and the item and
//! avatar catalogs that are seeded into the database on startup. Every section has
//! defaults, so an empty file is a valid configuration.

use crate::entities::ItemEffect;
use crate::errors::{Error, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "CHALLENGE_BUDDY_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Caps and constants for the lifecycle and progress rules
    pub rules: RulesConfig,
    /// Reward weight profiles per call site
    pub rewards: RewardsConfig,
    /// Scheduled transition job cadence
    pub scheduler: SchedulerConfig,
    /// Consumable item catalog
    pub items: Vec<ItemConfig>,
    /// Cosmetic avatar catalog
    pub avatars: Vec<AvatarConfig>,
    /// Status comments randomly handed out when a challenge starts
    pub flavor_comments: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: RulesConfig::default(),
            rewards: RewardsConfig::default(),
            scheduler: SchedulerConfig::default(),
            items: vec![
                ItemConfig {
                    name: "goal thief".to_string(),
                    effect: ItemEffect::StealGoal,
                },
                ItemConfig {
                    name: "poke".to_string(),
                    effect: ItemEffect::Nudge,
                },
            ],
            avatars: Vec::new(),
            flavor_comments: vec![
                "Let's do this!".to_string(),
                "One day at a time.".to_string(),
                "No days off.".to_string(),
            ],
        }
    }
}

/// Caps and scoring constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Most memberships a single challenge may hold, owner included
    pub max_members: usize,
    /// Most accepted, unfinished challenges a user may take part in at once
    pub max_active_challenges: u64,
    /// Items cannot be used when the target challenge ends within this many hours
    pub item_cutoff_hours: i64,
    /// Points gained per done bonus goal and lost per failed one
    pub bonus_goal_points: f64,
    /// Length of the window a stolen goal has to be completed in
    pub stolen_goal_window_hours: i64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            max_members: 6,
            max_active_challenges: 3,
            item_cutoff_hours: 24,
            bonus_goal_points: 5.0,
            stolen_goal_window_hours: 24,
        }
    }
}

/// Relative weights for one reward draw
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RewardWeights {
    /// Weight of granting an avatar
    pub avatar: f64,
    /// Weight of granting an item
    pub item: f64,
    /// Weight of granting nothing
    pub nothing: f64,
}

/// Weight profile used when the completion log is opened
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompletionLogRewardConfig {
    /// Base weight of granting an avatar
    pub avatar: f64,
    /// Base weight of granting an item
    pub item: f64,
    /// Base weight of granting nothing
    pub nothing: f64,
    /// Avatar bonus per member in the challenge
    pub bonus_per_member: f64,
    /// Avatar bonus per day of the challenge window
    pub bonus_per_day: f64,
}

impl Default for CompletionLogRewardConfig {
    fn default() -> Self {
        Self {
            avatar: 5.0,
            item: 95.0,
            nothing: 0.0,
            bonus_per_member: 5.0,
            bonus_per_day: 1.0,
        }
    }
}

impl CompletionLogRewardConfig {
    /// Base weights before the member/duration bonus is applied.
    #[must_use]
    pub const fn weights(&self) -> RewardWeights {
        RewardWeights {
            avatar: self.avatar,
            item: self.item,
            nothing: self.nothing,
        }
    }

    /// Avatar bonus for a challenge with `member_count` members lasting `total_days`.
    #[must_use]
    pub fn bonus(&self, member_count: u64, total_days: i64) -> f64 {
        #[allow(clippy::cast_precision_loss)] // member and day counts are tiny
        let (members, days) = (member_count as f64, total_days as f64);
        self.bonus_per_member * members + self.bonus_per_day * days
    }
}

/// Reward weight profiles per call site
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RewardsConfig {
    /// Draw performed after a diary is written
    pub diary: RewardWeights,
    /// Draw performed when the completion log is opened
    pub completion_log: CompletionLogRewardConfig,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            diary: RewardWeights {
                avatar: 5.0,
                item: 45.0,
                nothing: 50.0,
            },
            completion_log: CompletionLogRewardConfig::default(),
        }
    }
}

/// When the scheduled transition job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Whether the job runs at all
    pub enabled: bool,
    /// Local hour (0-23) of the daily run
    pub hour: u32,
    /// Fixed UTC offset of the scheduler's timezone, in hours
    pub utc_offset_hours: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 6,
            utc_offset_hours: 9,
        }
    }
}

impl SchedulerConfig {
    /// The scheduler's fixed timezone.
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the offset is out of range.
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            config_error(&format!(
                "scheduler.utc_offset_hours {} is out of range",
                self.utc_offset_hours
            ))
        })
    }
}

/// One consumable item in the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct ItemConfig {
    /// Item name
    pub name: String,
    /// Effect applied on use
    pub effect: ItemEffect,
}

/// One avatar in the catalog
#[derive(Debug, Clone, Deserialize)]
pub struct AvatarConfig {
    /// Avatar name
    pub name: String,
}

impl AppConfig {
    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.rules.max_members == 0 {
            return Err(config_error("rules.max_members must be at least 1"));
        }
        if self.scheduler.hour > 23 {
            return Err(config_error("scheduler.hour must be between 0 and 23"));
        }
        if !(-23..=23).contains(&self.scheduler.utc_offset_hours) {
            return Err(config_error(
                "scheduler.utc_offset_hours must be between -23 and 23",
            ));
        }
        check_weights("rewards.diary", &self.rewards.diary)?;
        check_weights(
            "rewards.completion_log",
            &self.rewards.completion_log.weights(),
        )?;
        Ok(())
    }
}

fn check_weights(section: &str, weights: &RewardWeights) -> Result<()> {
    let all = [weights.avatar, weights.item, weights.nothing];
    if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(config_error(&format!(
            "{section} weights must be finite and non-negative"
        )));
    }
    if all.iter().sum::<f64>() <= 0.0 {
        return Err(config_error(&format!(
            "{section} weights must not all be zero"
        )));
    }
    Ok(())
}

fn config_error(message: &str) -> Error {
    Error::Config {
        message: message.to_string(),
    }
}

/// Loads and validates configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    let config: AppConfig = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from `$CHALLENGE_BUDDY_CONFIG` or `./config.toml`.
///
/// A missing default file is not an error; the built-in defaults are used instead.
pub fn load_default_config() -> Result<AppConfig> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return load_config(path);
    }
    if Path::new("config.toml").exists() {
        load_config("config.toml")
    } else {
        tracing::warn!("No config.toml found, using built-in defaults");
        Ok(AppConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            flavor_comments = ["go go go"]

            [rules]
            max_members = 4
            max_active_challenges = 2
            item_cutoff_hours = 12
            bonus_goal_points = 10.0
            stolen_goal_window_hours = 48

            [rewards.diary]
            avatar = 1.0
            item = 2.0
            nothing = 3.0

            [rewards.completion_log]
            avatar = 10.0
            item = 90.0
            nothing = 0.0
            bonus_per_member = 2.5

            [scheduler]
            hour = 4
            utc_offset_hours = 0

            [[items]]
            name = "goal thief"
            effect = "steal_goal"

            [[items]]
            name = "poke"
            effect = "nudge"

            [[avatars]]
            name = "cat"
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.rules.max_members, 4);
        assert_eq!(config.rules.max_active_challenges, 2);
        assert_eq!(config.rules.bonus_goal_points, 10.0);
        assert_eq!(config.rewards.diary.nothing, 3.0);
        assert_eq!(config.rewards.completion_log.item, 90.0);
        assert_eq!(config.rewards.completion_log.bonus_per_member, 2.5);
        // Unset fields of a partially given section keep their default
        assert_eq!(config.rewards.completion_log.bonus_per_day, 1.0);
        assert_eq!(config.scheduler.hour, 4);
        assert!(config.scheduler.enabled);
        assert_eq!(config.items.len(), 2);
        assert_eq!(config.items[0].effect, ItemEffect::StealGoal);
        assert_eq!(config.avatars[0].name, "cat");
        assert_eq!(config.flavor_comments, vec!["go go go".to_string()]);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.rules.max_members, 6);
        assert_eq!(config.rules.max_active_challenges, 3);
        assert_eq!(config.rules.item_cutoff_hours, 24);
        assert_eq!(config.rewards.diary.avatar, 5.0);
        assert_eq!(config.scheduler.hour, 6);
        assert_eq!(config.scheduler.utc_offset_hours, 9);
    }

    #[test]
    fn test_validate_rejects_zero_weights() {
        let mut config = AppConfig::default();
        config.rewards.diary = RewardWeights {
            avatar: 0.0,
            item: 0.0,
            nothing: 0.0,
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_hour() {
        let mut config = AppConfig::default();
        config.scheduler.hour = 24;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_scheduler_offset() {
        let scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.offset().unwrap().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_unknown_item_effect_is_rejected() {
        let toml_str = r#"
            [[items]]
            name = "mystery"
            effect = "explode"
        "#;
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }
}
