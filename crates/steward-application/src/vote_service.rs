//! Role-eligibility vote kind handler.
//!
//! One vote per channel: the channel id is the session id. A ballot is
//! exactly one of yes/no or absent — casting the opposite decision switches
//! the vote, never double-counts it. The vote ends at its deadline or when
//! an override role force-stops it; either way the tallies are sealed by the
//! transition guard.

use chrono::{Duration, Utc};
use std::sync::Arc;
use steward_core::chat::ChatClient;
use steward_core::config::VoteConfig;
use steward_core::error::{Result, StewardError};
use steward_core::session::{
    DeadlineScheduler, FinalizeOutcome, FinalizeTrigger, SessionDetail, SessionRecord,
    SessionRegistry, VoteDecision, VoteDetail, VoteOutcome,
};

/// Business rules for the vote session kind.
pub struct VoteService {
    registry: Arc<SessionRegistry>,
    scheduler: Arc<DeadlineScheduler>,
    chat: Arc<dyn ChatClient>,
    config: VoteConfig,
}

impl VoteService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        scheduler: Arc<DeadlineScheduler>,
        chat: Arc<dyn ChatClient>,
        config: VoteConfig,
    ) -> Self {
        Self {
            registry,
            scheduler,
            chat,
            config,
        }
    }

    /// Opens an eligibility vote about `target_id` in a channel.
    ///
    /// Returns the channel id, which is the session id.
    ///
    /// # Errors
    ///
    /// - `AlreadyActive` if the channel already hosts a running vote
    /// - `Collaborator` when the ballot message cannot be posted
    pub async fn create(
        &self,
        channel_id: &str,
        target_id: &str,
        duration_ms: Option<i64>,
    ) -> Result<String> {
        // One live vote per channel. A finalized vote left in the registry
        // (its tallies stay addressable after the deadline) gives way to the
        // new one; an open vote blocks it.
        if let Some(existing) = self.registry.get(channel_id).await {
            if !existing.is_finalized() {
                return Err(StewardError::AlreadyActive {
                    id: channel_id.to_string(),
                });
            }
            self.registry.remove(channel_id).await?;
        }

        let now = Utc::now();
        let duration_ms = duration_ms.unwrap_or(self.config.default_duration_ms);
        let deadline_at = now + Duration::milliseconds(duration_ms);

        let ballot = format!(
            "Eligibility vote for {}. Vote yes or no below. Ends at {}.",
            target_id,
            deadline_at.to_rfc3339()
        );
        let message_id = self.chat.send_message(channel_id, &ballot).await?;

        let record = SessionRecord::vote(
            channel_id,
            VoteDetail {
                target_id: target_id.to_string(),
                message_id,
                yes: Default::default(),
                no: Default::default(),
                outcome: None,
            },
            deadline_at,
            now,
        );
        self.registry.insert(record).await?;
        self.scheduler.arm(channel_id, deadline_at).await;

        tracing::info!(
            target: "vote",
            channel_id = %channel_id,
            target_id = %target_id,
            deadline_at = %deadline_at,
            "Vote started"
        );
        Ok(channel_id.to_string())
    }

    /// Casts (or switches) an actor's ballot and returns the new
    /// (yes, no) tally.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown or non-vote session id
    /// - `Finalized` once the vote has ended
    /// - `AlreadyVoted` when the actor repeats their current decision
    pub async fn cast_vote(
        &self,
        session_id: &str,
        actor_id: &str,
        decision: VoteDecision,
    ) -> Result<(usize, usize)> {
        let now = Utc::now();
        let (tally, message_id) = self
            .registry
            .update(session_id, |record| {
                let SessionDetail::Vote(vote) = &mut record.detail else {
                    return Err(StewardError::not_found("vote", session_id));
                };
                let (chosen, opposite) = match decision {
                    VoteDecision::Yes => (&mut vote.yes, &mut vote.no),
                    VoteDecision::No => (&mut vote.no, &mut vote.yes),
                };
                if chosen.contains(actor_id) {
                    return Err(StewardError::AlreadyVoted {
                        decision: decision.to_string(),
                    });
                }
                // Switching: drop any opposite ballot before recording the
                // new one, so the actor is never counted twice.
                opposite.remove(actor_id);
                chosen.insert(actor_id.to_string());
                let result = (vote.tally(), vote.message_id.clone());
                record.last_activity_at = now;
                Ok(result)
            })
            .await?;

        let (yes, no) = tally;
        let update = format!(
            "Eligibility vote in progress. Votes: {} yes - {} no ({} total).",
            yes,
            no,
            yes + no
        );
        if let Err(err) = self
            .chat
            .edit_message(session_id, &message_id, &update)
            .await
        {
            tracing::warn!(
                target: "vote",
                channel_id = %session_id,
                error = %err,
                "Failed to refresh ballot tallies"
            );
        }

        tracing::debug!(
            target: "vote",
            channel_id = %session_id,
            actor_id = %actor_id,
            %decision,
            yes,
            no,
            "Ballot recorded"
        );
        Ok(tally)
    }

    /// Ends a vote immediately, independent of its deadline.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the actor holds one of the configured override
    ///   roles (the vote stays open)
    /// - `NotFound` for an unknown or non-vote session id
    pub async fn force_stop(&self, session_id: &str, actor_id: &str) -> Result<()> {
        let roles = self.chat.member_role_ids(actor_id).await?;
        let permitted = roles
            .iter()
            .any(|role| self.config.override_roles.contains(role));
        if !permitted {
            return Err(StewardError::forbidden("force-stop this vote"));
        }

        self.seal_and_announce(
            session_id,
            VoteOutcome::ForceStopped {
                stopped_by: actor_id.to_string(),
            },
            FinalizeTrigger::Manual,
        )
        .await
    }

    /// Finalizes a vote at its deadline, sealing the tallies.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown or non-vote session id
    pub async fn finalize(&self, session_id: &str, trigger: FinalizeTrigger) -> Result<()> {
        self.seal_and_announce(session_id, VoteOutcome::Decided, trigger)
            .await
    }

    async fn seal_and_announce(
        &self,
        session_id: &str,
        outcome: VoteOutcome,
        trigger: FinalizeTrigger,
    ) -> Result<()> {
        let record = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| StewardError::not_found("vote", session_id))?;
        if record.as_vote().is_none() {
            return Err(StewardError::not_found("vote", session_id));
        }

        let sealed = self
            .registry
            .finalize_with(session_id, |record| {
                if let SessionDetail::Vote(vote) = &mut record.detail {
                    vote.outcome = Some(outcome);
                }
            })
            .await?;
        let record = match sealed {
            FinalizeOutcome::Performed(record) => record,
            FinalizeOutcome::AlreadyFinalized | FinalizeOutcome::Vetoed => return Ok(()),
        };
        self.scheduler.disarm(session_id).await;

        let vote = record
            .as_vote()
            .ok_or_else(|| StewardError::not_found("vote", session_id))?;
        let (yes, no) = vote.tally();
        let headline = match &vote.outcome {
            Some(VoteOutcome::ForceStopped { stopped_by }) => {
                format!("Vote stopped by {}.", stopped_by)
            }
            _ => "Vote ended.".to_string(),
        };
        let summary = format!(
            "{} Final results: {} yes - {} no ({} total).",
            headline,
            yes,
            no,
            yes + no
        );
        if let Err(err) = self
            .chat
            .edit_message(session_id, &vote.message_id, &summary)
            .await
        {
            tracing::warn!(
                target: "vote",
                channel_id = %session_id,
                error = %err,
                "Failed to publish final tallies"
            );
        }

        tracing::info!(
            target: "vote",
            channel_id = %session_id,
            %trigger,
            yes,
            no,
            "Vote finalized"
        );
        Ok(())
    }
}
