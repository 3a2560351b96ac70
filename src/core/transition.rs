//! Scheduled transition business logic
//!
//! Promotes pending challenges whose start date has arrived and completes running
//! challenges whose end date has passed. Every challenge is transitioned in its own
//! transaction; a failing challenge is logged and skipped so the rest of the batch
//! still goes through. The date of the last run is kept in the `system_state` table
//! so a restarted process can tell whether today's run was missed.

use crate::{
    config::AppConfig,
    core::lifecycle::{find_completable, find_promotable, scheduled_complete, scheduled_promote},
    entities::{SystemState, system_state},
    errors::{Error, Result},
};
use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use rand::Rng;
use sea_orm::{Set, prelude::*};
use tracing::{error, info, instrument};

const LAST_TRANSITION_KEY: &str = "last_scheduled_transition";

/// A challenge the run could not transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChallenge {
    /// Challenge id
    pub challenge_id: i64,
    /// Rendered error
    pub reason: String,
}

/// Outcome of one scheduled run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionReport {
    /// Local date the run is recorded under
    pub run_date: NaiveDate,
    /// Challenges moved to `PROGRESS`
    pub promoted: Vec<i64>,
    /// Challenges moved to `COMPLETE`
    pub completed: Vec<i64>,
    /// Challenges left as they were because their transition failed
    pub skipped: Vec<SkippedChallenge>,
}

/// Date of the last recorded run, if any.
pub async fn get_last_transition_date(db: &DatabaseConnection) -> Result<Option<NaiveDate>> {
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_TRANSITION_KEY))
        .one(db)
        .await?;

    match state {
        Some(s) => NaiveDate::parse_from_str(&s.value, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| Error::Domain {
                message: format!("Failed to parse last transition date: {e}"),
            }),
        None => Ok(None),
    }
}

async fn set_last_transition_date(
    db: &DatabaseConnection,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<()> {
    let value = date.format("%Y-%m-%d").to_string();
    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_TRANSITION_KEY))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(value);
        active_model.updated_at = Set(now.naive_utc());
        active_model.update(db).await?;
    } else {
        system_state::ActiveModel {
            key: Set(LAST_TRANSITION_KEY.to_string()),
            value: Set(value),
            updated_at: Set(now.naive_utc()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Whether today's run (local to `offset`) is due and has not happened yet.
pub async fn is_transition_due(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    offset: FixedOffset,
    hour: u32,
) -> Result<bool> {
    let local = now.with_timezone(&offset);
    if local.hour() < hour {
        return Ok(false);
    }
    let last = get_last_transition_date(db).await?;
    Ok(last.is_none_or(|date| date < local.date_naive()))
}

/// Runs one batch of promotions and completions at instant `now`.
///
/// Transition errors never abort the batch; only a failure to list the candidates or
/// to record the run date is returned as an error.
#[instrument(skip(db, config, rng))]
pub async fn run_scheduled_transitions<R>(
    db: &DatabaseConnection,
    config: &AppConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<TransitionReport>
where
    R: Rng + ?Sized,
{
    let run_date = now.with_timezone(&config.scheduler.offset()?).date_naive();
    let mut report = TransitionReport {
        run_date,
        promoted: Vec::new(),
        completed: Vec::new(),
        skipped: Vec::new(),
    };

    for challenge in find_promotable(db, now).await? {
        match scheduled_promote(db, config, challenge.id, rng).await {
            Ok(_) => report.promoted.push(challenge.id),
            Err(e) => {
                error!(challenge_id = challenge.id, error = %e, "Scheduled promotion failed");
                report.skipped.push(SkippedChallenge {
                    challenge_id: challenge.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    for challenge in find_completable(db, now).await? {
        match scheduled_complete(db, challenge.id).await {
            Ok(_) => report.completed.push(challenge.id),
            Err(e) => {
                error!(challenge_id = challenge.id, error = %e, "Scheduled completion failed");
                report.skipped.push(SkippedChallenge {
                    challenge_id: challenge.id,
                    reason: e.to_string(),
                });
            }
        }
    }

    set_last_transition_date(db, run_date, now).await?;

    info!(
        promoted = report.promoted.len(),
        completed = report.completed.len(),
        skipped = report.skipped.len(),
        "Scheduled transitions finished"
    );
    Ok(report)
}

/// Renders a run report as a short multi-line summary for logs.
#[must_use]
pub fn format_transition_summary(report: &TransitionReport) -> String {
    let mut lines = vec![format!(
        "Scheduled transitions - {} - promoted {}, completed {}, skipped {}",
        report.run_date.format("%Y-%m-%d"),
        report.promoted.len(),
        report.completed.len(),
        report.skipped.len()
    )];
    lines.extend(
        report
            .skipped
            .iter()
            .map(|s| format!("  challenge {}: {}", s.challenge_id, s.reason)),
    );
    lines.join("\n")
}
