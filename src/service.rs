//! Operation surface of the challenge engine.
//!
//! [`ChallengeService`] binds the core functions to a connection and a shared config,
//! takes "now" from the wall clock and draws randomness from a fresh OS-seeded
//! generator per call. Callers that need control over time or randomness use the
//! `core` functions directly.

use crate::{
    config::AppConfig,
    core::{
        completion_log::{CompletionLog, view_completion_log},
        diary::{DiaryDetail, DiaryReceipt, NewDiary, create_diary, get_diary_detail, react_to_diary},
        goal::complete_bonus_goal,
        item::{ItemUseReceipt, take_unviewed_exchanges, use_item},
        lifecycle::{
            CreatedChallenge, InviteDecision, InvitePreview, InviteResponse, JoinOutcome,
            LeaveOutcome, NewChallenge, StartReport, complete_challenge, create_challenge,
            delete_or_leave, invite_preview, join_by_link, respond_to_invite, start_challenge,
        },
        membership::{get_live_challenge, get_own_membership, update_member_comment},
        progress::{ProgressBreakdown, calculate_progress, estimate_progress},
        transition::{TransitionReport, run_scheduled_transitions},
    },
    entities::{bonus_goal, challenge, diary_reaction, exchange_log, membership},
    errors::Result,
};
use chrono::Utc;
use rand::{SeedableRng, rngs::StdRng};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Shared handle to every engine operation.
#[derive(Clone)]
pub struct ChallengeService {
    /// Database connection shared with the scheduler
    pub database: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
}

impl ChallengeService {
    /// Creates a service over an initialized database.
    #[must_use]
    pub const fn new(database: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Self {
        Self { database, config }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.database
    }

    /// The configuration the service was built with.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn rng() -> StdRng {
        StdRng::from_entropy()
    }

    /// Creates a pending challenge owned by `creator`.
    pub async fn create_challenge(&self, creator: i64, new: NewChallenge) -> Result<CreatedChallenge> {
        create_challenge(self.db(), &self.config.rules, creator, new, Utc::now()).await
    }

    /// Accepts or declines the caller's invite.
    pub async fn respond_invite(
        &self,
        challenge_id: i64,
        caller: i64,
        decision: InviteDecision,
    ) -> Result<InviteResponse> {
        respond_to_invite(self.db(), &self.config.rules, challenge_id, caller, decision).await
    }

    /// Owner starts a pending challenge now.
    pub async fn start_challenge(&self, challenge_id: i64, caller: i64) -> Result<StartReport> {
        start_challenge(
            self.db(),
            &self.config,
            challenge_id,
            caller,
            Utc::now(),
            &mut Self::rng(),
        )
        .await
    }

    /// Owner closes a challenge whose end date has passed.
    pub async fn complete_challenge(&self, challenge_id: i64, caller: i64) -> Result<challenge::Model> {
        complete_challenge(self.db(), challenge_id, caller, Utc::now()).await
    }

    /// Owner deletes the challenge, anyone else leaves it.
    pub async fn delete_or_leave(&self, challenge_id: i64, caller: i64) -> Result<LeaveOutcome> {
        delete_or_leave(self.db(), challenge_id, caller, Utc::now()).await
    }

    /// Joins a pending challenge through its shared link.
    pub async fn join_by_link(&self, challenge_id: i64, caller: i64) -> Result<JoinOutcome> {
        join_by_link(
            self.db(),
            &self.config.rules,
            challenge_id,
            caller,
            Utc::now(),
        )
        .await
    }

    /// Summary shown to a user who opens an invite.
    pub async fn invite_preview(&self, challenge_id: i64) -> Result<InvitePreview> {
        invite_preview(self.db(), challenge_id, Utc::now()).await
    }

    /// Goal-based score of the caller's membership.
    pub async fn membership_progress(
        &self,
        membership_id: i64,
        caller: i64,
    ) -> Result<ProgressBreakdown> {
        get_own_membership(self.db(), membership_id, caller).await?;
        calculate_progress(self.db(), &self.config.rules, membership_id, Utc::now()).await
    }

    /// Clamped time-elapsed estimate of a challenge.
    pub async fn estimated_progress(&self, challenge_id: i64) -> Result<f64> {
        let challenge = get_live_challenge(self.db(), challenge_id).await?;
        estimate_progress(challenge.start_at, challenge.end_at, Utc::now().date_naive())
    }

    /// Records today's diary and draws its reward.
    pub async fn create_diary(
        &self,
        membership_id: i64,
        caller: i64,
        new: NewDiary,
    ) -> Result<DiaryReceipt> {
        create_diary(
            self.db(),
            &self.config,
            membership_id,
            caller,
            new,
            Utc::now(),
            &mut Self::rng(),
        )
        .await
    }

    /// Adds the caller's emoji reaction to a diary.
    pub async fn react_to_diary(
        &self,
        diary_id: i64,
        caller: i64,
        emoji: &str,
    ) -> Result<diary_reaction::Model> {
        react_to_diary(self.db(), diary_id, caller, emoji, Utc::now()).await
    }

    /// A diary with its goals and reactions.
    pub async fn diary_detail(&self, diary_id: i64) -> Result<DiaryDetail> {
        get_diary_detail(self.db(), diary_id).await
    }

    /// Spends one item on another member of the same challenge.
    pub async fn use_item(
        &self,
        item_id: i64,
        caller: i64,
        target_membership_id: i64,
    ) -> Result<ItemUseReceipt> {
        use_item(
            self.db(),
            &self.config,
            item_id,
            caller,
            target_membership_id,
            Utc::now(),
            &mut Self::rng(),
        )
        .await
    }

    /// Item uses aimed at the caller's membership not seen yet; marks them viewed.
    pub async fn take_unviewed_exchanges(
        &self,
        membership_id: i64,
        caller: i64,
    ) -> Result<Vec<exchange_log::Model>> {
        take_unviewed_exchanges(self.db(), membership_id, caller).await
    }

    /// Marks a bonus goal done inside its window.
    pub async fn complete_bonus_goal(
        &self,
        goal_id: i64,
        caller: i64,
        proof_image: String,
    ) -> Result<bonus_goal::Model> {
        complete_bonus_goal(self.db(), goal_id, caller, proof_image, Utc::now()).await
    }

    /// Replaces the caller's membership comment.
    pub async fn update_member_comment(
        &self,
        membership_id: i64,
        caller: i64,
        comment: String,
    ) -> Result<membership::Model> {
        update_member_comment(self.db(), membership_id, caller, comment).await
    }

    /// Opens the completion log once and draws its reward.
    pub async fn view_completion_log(&self, membership_id: i64, caller: i64) -> Result<CompletionLog> {
        view_completion_log(
            self.db(),
            &self.config,
            membership_id,
            caller,
            Utc::now(),
            &mut Self::rng(),
        )
        .await
    }

    /// Runs the scheduled transitions immediately.
    pub async fn run_scheduled_transitions(&self) -> Result<TransitionReport> {
        run_scheduled_transitions(self.db(), &self.config, Utc::now(), &mut Self::rng()).await
    }
}
