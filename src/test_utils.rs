//! Shared test utilities for `ChallengeBuddy`.
//!
//! This module provides common helper functions for setting up test databases
//! and building challenges in a known state with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    config::{
        AppConfig,
        app::{AvatarConfig, RulesConfig},
    },
    core::{
        catalog::seed_catalog,
        diary::{GoalEntry, NewDiary, create_diary},
        lifecycle::{
            CreatedChallenge, InviteDecision, Invitee, NewChallenge, create_challenge,
            respond_to_invite, start_challenge,
        },
        membership::get_memberships_by_challenge,
    },
    entities::{InviteStatus, challenge, diary, membership},
    errors::Result,
};
use chrono::{DateTime, TimeZone, Utc};
use rand::{SeedableRng, rngs::StdRng};
use sea_orm::DatabaseConnection;

/// A challenge that has been started, with its remaining memberships (owner first).
#[derive(Debug, Clone)]
pub struct StartedChallenge {
    /// The running challenge
    pub challenge: challenge::Model,
    /// Accepted memberships, owner first
    pub memberships: Vec<membership::Model>,
}

/// Configuration used by tests: defaults plus two avatars.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        avatars: vec![
            AvatarConfig {
                name: "cat".to_string(),
            },
            AvatarConfig {
                name: "dog".to_string(),
            },
        ],
        ..AppConfig::default()
    }
}

/// Creates an in-memory `SQLite` database with all tables initialized and the
/// [`test_config`] catalog seeded.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    seed_catalog(&db, &test_config()).await?;
    Ok(db)
}

/// UTC instant at the start of the given hour.
#[must_use]
pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap()
}

/// Creates a pending challenge running 2024-01-01 to 2024-01-08 owned by `owner`.
///
/// # Defaults
/// * every invitee starts with a pending invite
/// * created on 2023-12-20
pub async fn create_test_challenge(
    db: &DatabaseConnection,
    config: &AppConfig,
    owner: i64,
    invitees: &[i64],
) -> Result<CreatedChallenge> {
    create_challenge(
        db,
        &config.rules,
        owner,
        NewChallenge {
            name: "Test challenge".to_string(),
            header_emoji: "🔥".to_string(),
            start_at: at(2024, 1, 1, 0),
            end_at: at(2024, 1, 8, 0),
            invitees: invitees
                .iter()
                .map(|&user_id| Invitee {
                    user_id,
                    invite_status: InviteStatus::Pending,
                })
                .collect(),
        },
        at(2023, 12, 20, 0),
    )
    .await
}

/// Creates a test challenge, has every invitee accept and starts it on 2024-01-01.
pub async fn setup_started_challenge(
    db: &DatabaseConnection,
    config: &AppConfig,
    owner: i64,
    others: &[i64],
) -> Result<StartedChallenge> {
    let created = create_test_challenge(db, config, owner, others).await?;
    let rules = RulesConfig {
        max_active_challenges: u64::MAX,
        ..config.rules.clone()
    };
    for &user_id in others {
        respond_to_invite(db, &rules, created.challenge.id, user_id, InviteDecision::Accept)
            .await?;
    }
    let mut rng = test_rng();
    let report = start_challenge(
        db,
        config,
        created.challenge.id,
        owner,
        at(2024, 1, 1, 0),
        &mut rng,
    )
    .await?;
    Ok(StartedChallenge {
        challenge: report.challenge,
        memberships: get_memberships_by_challenge(db, created.challenge.id).await?,
    })
}

/// Writes a diary with two goals for `member` at instant `when`.
pub async fn write_test_diary(
    db: &DatabaseConnection,
    config: &AppConfig,
    member: &membership::Model,
    when: DateTime<Utc>,
) -> Result<diary::Model> {
    let mut rng = test_rng();
    let receipt = create_diary(
        db,
        config,
        member.id,
        member.user_id,
        NewDiary {
            proof_image: "uploads/test.jpg".to_string(),
            comment: "done".to_string(),
            goals: vec![
                GoalEntry {
                    text: "drink water".to_string(),
                    done: true,
                },
                GoalEntry {
                    text: "read 10 pages".to_string(),
                    done: false,
                },
            ],
        },
        when,
        &mut rng,
    )
    .await?;
    Ok(receipt.diary)
}

/// Deterministic random source for tests.
#[must_use]
pub fn test_rng() -> StdRng {
    StdRng::seed_from_u64(42)
}
