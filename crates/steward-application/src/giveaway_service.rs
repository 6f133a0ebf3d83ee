//! Giveaway kind handler.
//!
//! A giveaway is attached to its announcement message, collects entrants
//! until its absolute deadline, then draws winners uniformly without
//! replacement. The record stays registered after finalization so rerolls
//! can draw from the original entrant set.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use steward_core::chat::ChatClient;
use steward_core::config::GiveawayConfig;
use steward_core::error::{Result, StewardError};
use steward_core::session::{
    DeadlineScheduler, FinalizeOutcome, FinalizeTrigger, GiveawayDetail, SessionDetail,
    SessionRecord, SessionRegistry, sample_without_replacement,
};

/// Result of a [`GiveawayService::toggle_entry`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryToggle {
    Entered,
    Left,
}

/// Business rules for the giveaway session kind.
pub struct GiveawayService {
    registry: Arc<SessionRegistry>,
    scheduler: Arc<DeadlineScheduler>,
    chat: Arc<dyn ChatClient>,
    config: GiveawayConfig,
}

impl GiveawayService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        scheduler: Arc<DeadlineScheduler>,
        chat: Arc<dyn ChatClient>,
        config: GiveawayConfig,
    ) -> Self {
        Self {
            registry,
            scheduler,
            chat,
            config,
        }
    }

    /// Starts a giveaway in a channel and arms its expiry timer.
    ///
    /// Returns the announcement message id, which is the session id.
    ///
    /// # Errors
    ///
    /// - `InvalidDuration` for durations below the configured floor
    /// - `Collaborator` when the announcement cannot be posted
    pub async fn create(
        &self,
        channel_id: &str,
        host_id: &str,
        prize: &str,
        duration_ms: i64,
        winner_count: usize,
        role_requirement: Option<String>,
    ) -> Result<String> {
        if duration_ms < self.config.minimum_duration_ms {
            return Err(StewardError::InvalidDuration {
                requested_ms: duration_ms,
                minimum_ms: self.config.minimum_duration_ms,
            });
        }

        let now = Utc::now();
        let deadline_at = now + Duration::milliseconds(duration_ms);
        let announcement = match &role_requirement {
            Some(role) => format!(
                "Giveaway: {}! Enter below. Ends at {}. Hosted by {}. Required role: {}.",
                prize,
                deadline_at.to_rfc3339(),
                host_id,
                role
            ),
            None => format!(
                "Giveaway: {}! Enter below. Ends at {}. Hosted by {}.",
                prize,
                deadline_at.to_rfc3339(),
                host_id
            ),
        };
        let message_id = self.chat.send_message(channel_id, &announcement).await?;

        let record = SessionRecord::giveaway(
            message_id.clone(),
            GiveawayDetail {
                prize: prize.to_string(),
                host_id: host_id.to_string(),
                channel_id: channel_id.to_string(),
                winner_count: winner_count.max(1),
                role_requirement,
                entrants: Default::default(),
                last_winners: Vec::new(),
            },
            deadline_at,
            now,
        );
        self.registry.insert(record).await?;
        self.scheduler.arm(&message_id, deadline_at).await;

        tracing::info!(
            target: "giveaway",
            message_id = %message_id,
            channel_id = %channel_id,
            prize = %prize,
            winner_count,
            duration_ms,
            "Giveaway started"
        );
        Ok(message_id)
    }

    /// Re-registers a giveaway from a pre-existing announcement message.
    ///
    /// Recovered entrants are an explicit non-goal: the session starts with
    /// an empty entrant set. A deadline that could not be recovered defaults
    /// to one hour from now; one already in the past finalizes on the next
    /// timer dispatch.
    ///
    /// # Errors
    ///
    /// - `AlreadyActive` if the message already carries a session
    pub async fn import(
        &self,
        message_id: &str,
        channel_id: &str,
        host_id: &str,
        prize: &str,
        winner_count: usize,
        deadline_at: Option<DateTime<Utc>>,
    ) -> Result<String> {
        let now = Utc::now();
        let deadline_at = deadline_at.unwrap_or(now + Duration::hours(1));
        let record = SessionRecord::giveaway(
            message_id,
            GiveawayDetail {
                prize: prize.to_string(),
                host_id: host_id.to_string(),
                channel_id: channel_id.to_string(),
                winner_count: winner_count.max(1),
                role_requirement: None,
                entrants: Default::default(),
                last_winners: Vec::new(),
            },
            deadline_at,
            now,
        );
        self.registry.insert(record).await?;
        self.scheduler.arm(message_id, deadline_at).await;

        tracing::info!(
            target: "giveaway",
            message_id = %message_id,
            deadline_at = %deadline_at,
            "Giveaway imported"
        );
        Ok(message_id.to_string())
    }

    /// Toggles an actor's entry: entering when absent, leaving when present.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown or non-giveaway session id
    /// - `MissingRole` when a role requirement is set and the actor lacks it
    /// - `Finalized` once the giveaway has ended
    pub async fn toggle_entry(&self, session_id: &str, actor_id: &str) -> Result<EntryToggle> {
        let record = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| StewardError::not_found("giveaway", session_id))?;
        let giveaway = record
            .as_giveaway()
            .ok_or_else(|| StewardError::not_found("giveaway", session_id))?;

        if let Some(required) = giveaway.role_requirement.clone() {
            let roles = self.chat.member_role_ids(actor_id).await?;
            if !roles.contains(&required) {
                return Err(StewardError::MissingRole { role_id: required });
            }
        }

        let now = Utc::now();
        let toggle = self
            .registry
            .update(session_id, |record| {
                let SessionDetail::Giveaway(giveaway) = &mut record.detail else {
                    return Err(StewardError::not_found("giveaway", session_id));
                };
                let toggle = if giveaway.entrants.remove(actor_id) {
                    EntryToggle::Left
                } else {
                    giveaway.entrants.insert(actor_id.to_string());
                    EntryToggle::Entered
                };
                record.last_activity_at = now;
                Ok(toggle)
            })
            .await?;

        tracing::debug!(
            target: "giveaway",
            message_id = %session_id,
            actor_id = %actor_id,
            ?toggle,
            "Entry toggled"
        );
        Ok(toggle)
    }

    /// Ends a giveaway ahead of its deadline.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown or non-giveaway session id
    pub async fn end(&self, session_id: &str) -> Result<()> {
        self.finalize(session_id, FinalizeTrigger::Manual).await
    }

    /// Finalizes a giveaway: draws winners, announces them, and leaves the
    /// record addressable for rerolls.
    ///
    /// Safe to invoke from every trigger path; only the first call draws and
    /// announces.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown or non-giveaway session id
    pub async fn finalize(&self, session_id: &str, trigger: FinalizeTrigger) -> Result<()> {
        // Kind check up front so a giveaway call can never seal a foreign
        // session.
        let record = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| StewardError::not_found("giveaway", session_id))?;
        if record.as_giveaway().is_none() {
            return Err(StewardError::not_found("giveaway", session_id));
        }

        let outcome = self
            .registry
            .finalize_with(session_id, |record| {
                if let SessionDetail::Giveaway(giveaway) = &mut record.detail {
                    giveaway.last_winners =
                        sample_without_replacement(&giveaway.entrants, giveaway.winner_count);
                }
            })
            .await?;
        let record = match outcome {
            FinalizeOutcome::Performed(record) => record,
            FinalizeOutcome::AlreadyFinalized | FinalizeOutcome::Vetoed => return Ok(()),
        };
        self.scheduler.disarm(session_id).await;

        let giveaway = record
            .as_giveaway()
            .ok_or_else(|| StewardError::not_found("giveaway", session_id))?;
        tracing::info!(
            target: "giveaway",
            message_id = %session_id,
            %trigger,
            entrants = giveaway.entrants.len(),
            winners = giveaway.last_winners.len(),
            "Giveaway finalized"
        );
        self.announce_result(session_id, giveaway, &giveaway.last_winners)
            .await;
        Ok(())
    }

    /// Draws a fresh winner set from the original entrants of a finalized
    /// giveaway and re-announces, without changing the session status.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown or non-giveaway session id
    /// - `NotFinalized` if the giveaway has not ended yet
    pub async fn reroll(&self, session_id: &str) -> Result<Vec<String>> {
        let record = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| StewardError::not_found("giveaway", session_id))?;
        let giveaway = record
            .as_giveaway()
            .ok_or_else(|| StewardError::not_found("giveaway", session_id))?;
        if !record.is_finalized() {
            return Err(StewardError::NotFinalized {
                id: session_id.to_string(),
            });
        }

        let winners = sample_without_replacement(&giveaway.entrants, giveaway.winner_count);
        tracing::info!(
            target: "giveaway",
            message_id = %session_id,
            winners = winners.len(),
            "Giveaway rerolled"
        );
        self.announce_result(session_id, giveaway, &winners).await;
        Ok(winners)
    }

    /// Edits the announcement and congratulates the winners. Announcement
    /// failures are logged and swallowed: the terminal transition is already
    /// durable and must not be blocked by a collaborator hiccup.
    async fn announce_result(
        &self,
        session_id: &str,
        giveaway: &GiveawayDetail,
        winners: &[String],
    ) {
        let (edited, congrats) = if winners.is_empty() {
            (
                "No valid entries, giveaway cancelled.".to_string(),
                None,
            )
        } else {
            let mentions = winners.join(", ");
            (
                format!("Giveaway ended. Winner(s): {}. Prize: {}", mentions, giveaway.prize),
                Some(format!(
                    "Congratulations {}! You won {}.",
                    mentions, giveaway.prize
                )),
            )
        };

        if let Err(err) = self
            .chat
            .edit_message(&giveaway.channel_id, session_id, &edited)
            .await
        {
            tracing::warn!(
                target: "giveaway",
                message_id = %session_id,
                error = %err,
                "Failed to edit giveaway announcement"
            );
        }
        if let Some(congrats) = congrats {
            if let Err(err) = self.chat.send_message(&giveaway.channel_id, &congrats).await {
                tracing::warn!(
                    target: "giveaway",
                    message_id = %session_id,
                    error = %err,
                    "Failed to congratulate winners"
                );
            }
        }
    }
}
