//! Background runner for the daily scheduled transition job.
//!
//! The runner sleeps until the configured local hour, runs one batch of
//! [`run_scheduled_transitions`] and goes back to sleep. On startup it runs right
//! away when today's run was missed. It stops when the shutdown channel flips.

use crate::{
    config::AppConfig,
    core::transition::{format_transition_summary, is_transition_due, run_scheduled_transitions},
    errors::{Error, Result},
};
use chrono::{DateTime, Days, FixedOffset, TimeZone, Utc};
use rand::{SeedableRng, rngs::StdRng};
use sea_orm::DatabaseConnection;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

/// First instant strictly after `now` at `hour`:00 local to `offset`.
///
/// # Errors
/// Returns [`Error::Config`] when `hour` is not a valid hour of the day.
pub fn next_run_after(
    now: DateTime<Utc>,
    hour: u32,
    offset: FixedOffset,
) -> Result<DateTime<Utc>> {
    let local_today = now.with_timezone(&offset).date_naive();
    let at_hour = |date: chrono::NaiveDate| -> Result<DateTime<Utc>> {
        let naive = date.and_hms_opt(hour, 0, 0).ok_or_else(|| Error::Config {
            message: format!("scheduler hour {hour} is invalid"),
        })?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| Error::Config {
                message: format!("no single instant for {naive} at {offset}"),
            })
    };

    let today = at_hour(local_today)?;
    if today > now {
        return Ok(today);
    }
    let tomorrow = local_today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| Error::Domain {
            message: format!("no day after {local_today}"),
        })?;
    at_hour(tomorrow)
}

/// Owns the state of the background transition loop.
pub struct TransitionScheduler {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
}

impl TransitionScheduler {
    /// Creates a scheduler over a shared connection and config.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Runs one batch now and logs the outcome; errors are logged, not returned.
    pub async fn run_once(&self) {
        let mut rng = StdRng::from_entropy();
        match run_scheduled_transitions(self.db.as_ref(), &self.config, Utc::now(), &mut rng).await {
            Ok(report) => info!("{}", format_transition_summary(&report)),
            Err(e) => error!("Scheduled transition run failed: {}", e),
        }
    }

    /// Spawns the loop; it ends once `shutdown` receives `true` or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            if !self.config.scheduler.enabled {
                info!("Scheduled transitions are disabled");
                return;
            }
            let offset = match self.config.scheduler.offset() {
                Ok(offset) => offset,
                Err(e) => {
                    error!("Scheduler not started: {}", e);
                    return;
                }
            };
            let hour = self.config.scheduler.hour;

            match is_transition_due(self.db.as_ref(), Utc::now(), offset, hour).await {
                Ok(true) => {
                    info!("Today's scheduled run was missed, catching up");
                    self.run_once().await;
                }
                Ok(false) => {}
                Err(e) => warn!("Could not read last scheduled run: {}", e),
            }

            loop {
                let now = Utc::now();
                let next = match next_run_after(now, hour, offset) {
                    Ok(next) => next,
                    Err(e) => {
                        error!("Scheduler stopped: {}", e);
                        return;
                    }
                };
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                info!(next_run = %next, "Next scheduled transition run");

                tokio::select! {
                    () = tokio::time::sleep(wait) => self.run_once().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Transition scheduler stopped");
                            return;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::membership::get_live_challenge;
    use crate::entities::ChallengeStatus;
    use crate::test_utils::*;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        // 2024-01-02 03:00 at +09:00
        let next = next_run_after(at(2024, 1, 1, 18), 6, kst()).unwrap();
        assert_eq!(next, at(2024, 1, 1, 21));
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        // Exactly at the run hour the next run is a day later
        let next = next_run_after(at(2024, 1, 1, 21), 6, kst()).unwrap();
        assert_eq!(next, at(2024, 1, 2, 21));
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            next_run_after(at(2024, 12, 31, 23), 6, utc).unwrap(),
            at(2025, 1, 1, 6)
        );
    }

    #[test]
    fn test_next_run_rejects_bad_hour() {
        let result = next_run_after(at(2024, 1, 1, 0), 24, kst());
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_run_once_promotes_due_challenges() -> Result<()> {
        let db = setup_test_db().await?;
        let config = test_config();
        // Starts 2024-01-01, long before the wall clock
        let created = create_test_challenge(&db, &config, 1, &[]).await?;
        let db = Arc::new(db);
        let scheduler = TransitionScheduler::new(Arc::clone(&db), Arc::new(config));

        scheduler.run_once().await;
        let challenge = get_live_challenge(db.as_ref(), created.challenge.id).await?;
        // Its end date has passed as well, so the same run completes it
        assert_eq!(challenge.status, ChallengeStatus::Complete);
        Ok(())
    }

    #[tokio::test]
    async fn test_spawned_scheduler_stops_on_shutdown() -> Result<()> {
        let db = setup_test_db().await?;
        let mut config = test_config();
        config.scheduler.enabled = true;
        let (tx, rx) = watch::channel(false);
        let handle = TransitionScheduler::new(Arc::new(db), Arc::new(config)).spawn(rx);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        Ok(())
    }
}
