//! Support-ticket kind handler.
//!
//! Tickets live in their own private channel, have no natural deadline, and
//! reach their terminal state through a manual close or the inactivity
//! sweep — both funneled through the registry's transition guard so a close
//! happens at most once no matter how many paths race for it.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use steward_core::chat::{AttributionLookup, ChatClient, TranscriptRenderer};
use steward_core::config::TicketConfig;
use steward_core::error::{Result, StewardError};
use steward_core::session::{
    FinalizeOutcome, FinalizeTrigger, SessionDetail, SessionRecord, SessionRegistry,
    SessionStatus, TicketDetail, TicketSequence,
};
use steward_core::stats::{StaffStats, StatsRepository};

/// Business rules for the ticket session kind.
pub struct TicketService {
    registry: Arc<SessionRegistry>,
    chat: Arc<dyn ChatClient>,
    transcripts: Arc<dyn TranscriptRenderer>,
    attribution: Arc<dyn AttributionLookup>,
    stats: Arc<dyn StatsRepository>,
    sequence: Arc<dyn TicketSequence>,
    config: TicketConfig,
}

impl TicketService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        chat: Arc<dyn ChatClient>,
        transcripts: Arc<dyn TranscriptRenderer>,
        attribution: Arc<dyn AttributionLookup>,
        stats: Arc<dyn StatsRepository>,
        sequence: Arc<dyn TicketSequence>,
        config: TicketConfig,
    ) -> Self {
        Self {
            registry,
            chat,
            transcripts,
            attribution,
            stats,
            sequence,
            config,
        }
    }

    /// Opens a new ticket for `actor_id` in the given category.
    ///
    /// Creates the backing channel, registers the session, and posts the
    /// welcome message. The per-user open-ticket limit is re-validated
    /// atomically at registration time, so concurrent creates cannot push an
    /// actor past the limit.
    ///
    /// # Errors
    ///
    /// - `InvalidCategory` for an unknown category id
    /// - `MaxOpenReached` when the actor is at the open-ticket limit
    /// - `Collaborator` when the channel cannot be created
    pub async fn create(&self, actor_id: &str, category_id: &str) -> Result<String> {
        let category = self
            .config
            .category(category_id)
            .ok_or_else(|| StewardError::InvalidCategory {
                id: category_id.to_string(),
            })?
            .clone();

        // Cheap early check; the authoritative one runs under the registry
        // lock below.
        if self.open_ticket_count(actor_id).await >= self.config.max_open_tickets {
            return Err(StewardError::MaxOpenReached {
                limit: self.config.max_open_tickets,
            });
        }

        let number = self.sequence.next().await?;
        let channel_name = format!("ticket-{}-{:04}", category_id, number);
        let topic = format!("Ticket #{:04} | {} | {}", number, actor_id, category.label);

        let mut allow_access: Vec<String> = vec![actor_id.to_string()];
        for role in self
            .config
            .global_staff_roles
            .iter()
            .chain(category.staff_roles.iter())
        {
            if !allow_access.contains(role) {
                allow_access.push(role.clone());
            }
        }

        let channel_id = self
            .chat
            .create_channel(&channel_name, &topic, &allow_access)
            .await?;

        let now = Utc::now();
        let record = SessionRecord::ticket(
            channel_id.clone(),
            TicketDetail {
                owner_id: actor_id.to_string(),
                category_id: category_id.to_string(),
                number,
                claimed_by: None,
                staff_roles: category.staff_roles.clone(),
                claim_response_ms: None,
                warned_at: None,
            },
            now,
        );

        let owner = actor_id.to_string();
        let limit = self.config.max_open_tickets;
        let registered = self
            .registry
            .insert_when(record, |sessions| {
                let open = sessions
                    .values()
                    .filter(|r| {
                        !r.is_finalized()
                            && r.as_ticket().is_some_and(|t| t.owner_id == owner)
                    })
                    .count();
                if open >= limit {
                    return Err(StewardError::MaxOpenReached { limit });
                }
                Ok(())
            })
            .await;
        if let Err(err) = registered {
            // The channel exists but the session does not; tear it down so
            // the user is not left with an orphan.
            if let Err(cleanup) = self
                .chat
                .delete_channel(&channel_id, "ticket registration failed")
                .await
            {
                tracing::warn!(
                    target: "ticket",
                    channel_id = %channel_id,
                    error = %cleanup,
                    "Failed to delete orphaned ticket channel"
                );
            }
            return Err(err);
        }

        let welcome = format!(
            "Thank you for creating a ticket! Category: {}. \
             Please describe your issue in detail and our staff will assist you shortly. \
             (Ticket #{:04})",
            category.label, number
        );
        if let Err(err) = self.chat.send_message(&channel_id, &welcome).await {
            tracing::warn!(
                target: "ticket",
                channel_id = %channel_id,
                error = %err,
                "Failed to post ticket welcome message"
            );
        }

        tracing::info!(
            target: "ticket",
            channel_id = %channel_id,
            owner_id = %actor_id,
            category = %category_id,
            number,
            "Ticket created"
        );
        Ok(channel_id)
    }

    /// Claims a ticket for a staff member.
    ///
    /// The guard conditions (unclaimed, actor qualifies) are re-validated
    /// under the registry lock after the role lookups, since those suspend.
    /// On success the claim latency is recorded for staff stats and channel
    /// access is revoked for staff roles the claimant does not hold.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown or non-ticket session id
    /// - `AlreadyClaimed` if another staff member got there first
    /// - `Forbidden` if the actor holds no qualifying staff role
    pub async fn claim(&self, session_id: &str, actor_id: &str) -> Result<()> {
        let actor_roles = self.chat.member_role_ids(actor_id).await?;
        let is_admin = self.chat.is_admin(actor_id).await?;
        let now = Utc::now();

        let (response_ms, revoke_roles) = self
            .registry
            .update(session_id, |record| {
                let created_at = record.created_at;
                let SessionDetail::Ticket(ticket) = &mut record.detail else {
                    return Err(StewardError::not_found("ticket", session_id));
                };
                if let Some(by) = &ticket.claimed_by {
                    return Err(StewardError::AlreadyClaimed { by: by.clone() });
                }
                let qualifies = is_admin
                    || actor_roles.iter().any(|role| {
                        ticket.staff_roles.contains(role)
                            || self.config.global_staff_roles.contains(role)
                    });
                if !qualifies {
                    return Err(StewardError::forbidden("claim this ticket"));
                }

                let response_ms = (now - created_at).num_milliseconds();
                ticket.claimed_by = Some(actor_id.to_string());
                ticket.claim_response_ms = Some(response_ms);

                // Exclusivity: every staff role the claimant does not hold
                // loses access to the channel.
                let revoke_roles: Vec<String> = ticket
                    .staff_roles
                    .iter()
                    .chain(self.config.global_staff_roles.iter())
                    .filter(|role| !actor_roles.contains(*role))
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect();

                record.status = SessionStatus::Claimed;
                record.last_activity_at = now;
                Ok((response_ms, revoke_roles))
            })
            .await?;

        if let Err(err) = self.stats.record_claim(actor_id, response_ms).await {
            tracing::warn!(
                target: "ticket",
                staff_id = %actor_id,
                error = %err,
                "Failed to record claim stats"
            );
        }

        for role in &revoke_roles {
            if let Err(err) = self.chat.revoke_channel_access(session_id, role).await {
                tracing::warn!(
                    target: "ticket",
                    channel_id = %session_id,
                    role_id = %role,
                    error = %err,
                    "Failed to revoke channel access after claim"
                );
            }
        }

        let notice = format!("Your ticket has been claimed by {}.", actor_id);
        if let Err(err) = self.chat.send_message(session_id, &notice).await {
            tracing::warn!(
                target: "ticket",
                channel_id = %session_id,
                error = %err,
                "Failed to announce claim"
            );
        }

        tracing::info!(
            target: "ticket",
            channel_id = %session_id,
            staff_id = %actor_id,
            response_ms,
            "Ticket claimed"
        );
        Ok(())
    }

    /// Closes a ticket on behalf of an actor.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown or non-ticket session id
    /// - `Forbidden` unless the actor is the ticket owner, holds a
    ///   qualifying staff role, or is an admin
    pub async fn close(&self, session_id: &str, actor_id: &str, reason: &str) -> Result<()> {
        let record = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| StewardError::not_found("session", session_id))?;
        let ticket = record
            .as_ticket()
            .ok_or_else(|| StewardError::not_found("ticket", session_id))?;

        let permitted = ticket.owner_id == actor_id
            || self.chat.is_admin(actor_id).await?
            || self
                .chat
                .member_role_ids(actor_id)
                .await?
                .iter()
                .any(|role| {
                    ticket.staff_roles.contains(role)
                        || self.config.global_staff_roles.contains(role)
                });
        if !permitted {
            return Err(StewardError::forbidden("close this ticket"));
        }

        self.finalize_and_teardown(
            session_id,
            Some(actor_id),
            reason,
            FinalizeTrigger::Manual,
            |_| true,
        )
        .await
    }

    /// Records participant activity on a ticket and clears any pending
    /// inactivity warning.
    pub async fn record_activity(&self, session_id: &str) -> Result<()> {
        let now = Utc::now();
        self.registry
            .update(session_id, |record| {
                if let SessionDetail::Ticket(ticket) = &mut record.detail {
                    ticket.warned_at = None;
                }
                record.last_activity_at = now;
                Ok(())
            })
            .await
    }

    /// One pass of the inactivity sweep.
    ///
    /// Idle tickets first receive a warning (persisted on the record so a
    /// restart does not lose it); once the grace window after the warning
    /// elapses with no further activity, the ticket is closed through the
    /// regular transition-guard path. The idleness condition is re-validated
    /// atomically at close time, so a reply racing the sweep keeps the
    /// ticket open.
    pub async fn sweep_inactive(&self, now: DateTime<Utc>) {
        for record in self.registry.snapshot().await {
            let SessionDetail::Ticket(ticket) = &record.detail else {
                continue;
            };
            if record.is_finalized() {
                continue;
            }

            match ticket.warned_at {
                None => {
                    if now - record.last_activity_at >= self.config.inactivity_timeout() {
                        self.warn_inactive(&record, now).await;
                    }
                }
                Some(warned_at) if record.last_activity_at > warned_at => {
                    // Activity resumed after the warning (e.g. a claim);
                    // withdraw the warning instead of closing.
                    let cleared = self
                        .registry
                        .update(&record.id, |rec| {
                            if let SessionDetail::Ticket(t) = &mut rec.detail {
                                t.warned_at = None;
                            }
                            Ok(())
                        })
                        .await;
                    if let Err(err) = cleared {
                        tracing::debug!(
                            target: "sweeper",
                            channel_id = %record.id,
                            error = %err,
                            "Could not withdraw inactivity warning"
                        );
                    }
                }
                Some(warned_at) if now - warned_at >= self.config.warning_grace() => {
                    let closed = self
                        .finalize_and_teardown(
                            &record.id,
                            None,
                            "Closed due to inactivity",
                            FinalizeTrigger::Inactivity,
                            // Last look: any activity after the warning
                            // cancels the close.
                            move |rec| rec.last_activity_at <= warned_at,
                        )
                        .await;
                    if let Err(err) = closed {
                        tracing::warn!(
                            target: "sweeper",
                            channel_id = %record.id,
                            error = %err,
                            "Inactivity close failed"
                        );
                    }
                }
                Some(_) => {}
            }
        }
    }

    /// Returns accumulated stats for a staff member.
    pub async fn staff_stats(&self, staff_id: &str) -> Result<StaffStats> {
        self.stats.stats_for(staff_id).await
    }

    /// Records a rating for the staff member who handled a ticket.
    pub async fn rate_staff(&self, staff_id: &str, score: u8) -> Result<()> {
        self.stats.add_rating(staff_id, score).await
    }

    async fn open_ticket_count(&self, actor_id: &str) -> usize {
        self.registry
            .snapshot()
            .await
            .iter()
            .filter(|record| {
                !record.is_finalized()
                    && record.as_ticket().is_some_and(|t| t.owner_id == actor_id)
            })
            .count()
    }

    async fn warn_inactive(&self, record: &SessionRecord, now: DateTime<Utc>) {
        let warning = format!(
            "This ticket has been inactive for {} hours and will be closed in {} hours.",
            self.config.inactivity_timeout().num_hours(),
            self.config.warning_grace().num_hours()
        );
        if let Err(err) = self.chat.send_message(&record.id, &warning).await {
            tracing::warn!(
                target: "sweeper",
                channel_id = %record.id,
                error = %err,
                "Failed to post inactivity warning"
            );
        }
        let marked = self
            .registry
            .update(&record.id, |rec| {
                if let SessionDetail::Ticket(t) = &mut rec.detail {
                    t.warned_at = Some(now);
                }
                Ok(())
            })
            .await;
        if let Err(err) = marked {
            // The ticket may have been closed while the warning was sent.
            tracing::debug!(
                target: "sweeper",
                channel_id = %record.id,
                error = %err,
                "Could not mark ticket as warned"
            );
        } else {
            tracing::info!(
                target: "sweeper",
                channel_id = %record.id,
                "Ticket warned for inactivity"
            );
        }
    }

    /// The single close path: transition guard first, then the closing side
    /// effects, then removal and delayed channel deletion.
    ///
    /// Transcript rendering and both deliveries are best-effort; only the
    /// state transition itself (and the registry removal) can fail the
    /// operation.
    async fn finalize_and_teardown<P>(
        &self,
        session_id: &str,
        closed_by: Option<&str>,
        reason: &str,
        trigger: FinalizeTrigger,
        permit: P,
    ) -> Result<()>
    where
        P: FnOnce(&SessionRecord) -> bool,
    {
        let record = match self.registry.finalize_if(session_id, permit, |_| {}).await? {
            FinalizeOutcome::Performed(record) => record,
            FinalizeOutcome::AlreadyFinalized => return Ok(()),
            FinalizeOutcome::Vetoed => {
                tracing::info!(
                    target: "sweeper",
                    channel_id = %session_id,
                    "Inactivity close cancelled, activity resumed during grace window"
                );
                return Ok(());
            }
        };
        let Some(ticket) = record.as_ticket() else {
            return Err(StewardError::not_found("ticket", session_id));
        };

        let transcript = match self.transcripts.render(session_id).await {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                tracing::warn!(
                    target: "ticket",
                    channel_id = %session_id,
                    error = %err,
                    "Failed to render transcript, closing without one"
                );
                None
            }
        };

        // Attribute system-triggered closes when possible; never required.
        let closed_label = match closed_by {
            Some(actor) => actor.to_string(),
            None => self
                .attribution
                .responsible_actor(session_id)
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| "system".to_string()),
        };

        if let Some(log_channel) = &self.config.log_channel_id {
            let log_line = format!(
                "Ticket #{:04} closed by {}. Reason: {}",
                ticket.number, closed_label, reason
            );
            let delivered = match &transcript {
                Some(artifact) => self.chat.send_file(log_channel, &log_line, artifact).await,
                None => self
                    .chat
                    .send_message(log_channel, &log_line)
                    .await
                    .map(|_| ()),
            };
            if let Err(err) = delivered {
                tracing::warn!(
                    target: "ticket",
                    channel_id = %session_id,
                    error = %err,
                    "Failed to deliver close notice to log channel"
                );
            }
        }

        let owner_notice = format!(
            "Your ticket has been closed. Reason: {}",
            reason
        );
        if let Err(err) = self
            .chat
            .send_direct_message(&ticket.owner_id, &owner_notice, transcript.as_ref())
            .await
        {
            tracing::warn!(
                target: "ticket",
                owner_id = %ticket.owner_id,
                error = %err,
                "Failed to deliver transcript to ticket owner"
            );
        }

        let closing_notice = format!("Ticket closed by {}. Reason: {}", closed_label, reason);
        if let Err(err) = self.chat.send_message(session_id, &closing_notice).await {
            tracing::warn!(
                target: "ticket",
                channel_id = %session_id,
                error = %err,
                "Failed to post closing notice"
            );
        }

        // Leave the channel up briefly so the closing notice is visible.
        // The finalized record stays registered until the channel is gone,
        // so a racing close lands on the guard's no-op instead of NotFound.
        let chat = Arc::clone(&self.chat);
        let registry = Arc::clone(&self.registry);
        let channel_id = session_id.to_string();
        let delete_reason = reason.to_string();
        let delay = Duration::from_secs(self.config.close_delete_delay_secs);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = chat.delete_channel(&channel_id, &delete_reason).await {
                tracing::warn!(
                    target: "ticket",
                    channel_id = %channel_id,
                    error = %err,
                    "Failed to delete closed ticket channel"
                );
            }
            if let Err(err) = registry.remove(&channel_id).await {
                tracing::warn!(
                    target: "ticket",
                    channel_id = %channel_id,
                    error = %err,
                    "Failed to deregister closed ticket"
                );
            }
        });

        tracing::info!(
            target: "ticket",
            channel_id = %session_id,
            closed_by = %closed_label,
            %trigger,
            reason = %reason,
            "Ticket closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        MockAttribution, MockChatClient, MockTranscripts, build_engine, test_config,
    };
    use crate::SessionEngine;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    struct Setup {
        _temp: TempDir,
        chat: Arc<MockChatClient>,
        transcripts: Arc<MockTranscripts>,
        engine: SessionEngine,
    }

    async fn setup() -> Setup {
        let temp = TempDir::new().unwrap();
        let chat = Arc::new(MockChatClient::new());
        let transcripts = Arc::new(MockTranscripts::default());
        let attribution = Arc::new(MockAttribution::default());
        let engine = build_engine(
            temp.path(),
            test_config(),
            Arc::clone(&chat),
            Arc::clone(&transcripts),
            attribution,
        );
        engine.start().await.unwrap();
        Setup {
            _temp: temp,
            chat,
            transcripts,
            engine,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_category() {
        let setup = setup().await;
        let err = setup
            .engine
            .tickets()
            .create("user-1", "nonexistent")
            .await
            .unwrap_err();
        assert!(matches!(err, StewardError::InvalidCategory { .. }));
    }

    #[tokio::test]
    async fn test_create_allocates_sequential_channels() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();

        let first = tickets.create("user-1", "general").await.unwrap();
        let second = tickets.create("user-2", "general").await.unwrap();
        assert_ne!(first, second);

        let created = setup.chat.created_channels.lock().unwrap().clone();
        assert_eq!(created[0].1, "ticket-general-0001");
        assert_eq!(created[1].1, "ticket-general-0002");
        // Owner plus global and category staff roles get access.
        assert!(created[0].2.contains(&"user-1".to_string()));
        assert!(created[0].2.contains(&"role-global".to_string()));
        assert!(created[0].2.contains(&"role-staff".to_string()));

        // The welcome message landed in the new channel.
        assert_eq!(setup.chat.sent_to(&first).len(), 1);

        let record = setup.engine.registry().get(&first).await.unwrap();
        assert_eq!(record.status, SessionStatus::Open);
        assert_eq!(record.as_ticket().unwrap().staff_roles, vec!["role-staff"]);
    }

    #[tokio::test]
    async fn test_max_open_tickets_is_enforced() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();

        tickets.create("user-1", "general").await.unwrap();
        tickets.create("user-1", "appeals").await.unwrap();
        let err = tickets.create("user-1", "general").await.unwrap_err();
        assert!(matches!(err, StewardError::MaxOpenReached { limit: 2 }));

        let open = setup
            .engine
            .registry()
            .snapshot()
            .await
            .iter()
            .filter(|r| r.as_ticket().is_some_and(|t| t.owner_id == "user-1"))
            .count();
        assert_eq!(open, 2);

        // Another user is unaffected.
        tickets.create("user-2", "general").await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_requires_a_staff_role() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();
        let channel = tickets.create("user-1", "general").await.unwrap();

        let err = tickets.claim(&channel, "rando").await.unwrap_err();
        assert!(err.is_forbidden());

        // Admins qualify without any staff role.
        setup.chat.set_admin("admin-1");
        tickets.claim(&channel, "admin-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_records_stats_and_revokes_other_staff_roles() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();
        let channel = tickets.create("user-1", "general").await.unwrap();

        setup.chat.set_roles("staff-1", &["role-staff"]);
        tickets.claim(&channel, "staff-1").await.unwrap();

        let record = setup.engine.registry().get(&channel).await.unwrap();
        assert_eq!(record.status, SessionStatus::Claimed);
        let ticket = record.as_ticket().unwrap();
        assert_eq!(ticket.claimed_by.as_deref(), Some("staff-1"));
        assert!(ticket.claim_response_ms.is_some());

        let stats = tickets.staff_stats("staff-1").await.unwrap();
        assert_eq!(stats.claimed, 1);

        // staff-1 does not hold the global staff role, so it loses access.
        let revoked = setup.chat.revoked.lock().unwrap().clone();
        assert!(revoked.contains(&(channel.clone(), "role-global".to_string())));
        assert!(!revoked.contains(&(channel.clone(), "role-staff".to_string())));
    }

    #[tokio::test]
    async fn test_claim_twice_reports_the_first_claimant() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();
        let channel = tickets.create("user-1", "general").await.unwrap();

        setup.chat.set_roles("staff-1", &["role-staff"]);
        setup.chat.set_roles("staff-2", &["role-staff"]);
        tickets.claim(&channel, "staff-1").await.unwrap();

        let err = tickets.claim(&channel, "staff-2").await.unwrap_err();
        assert!(matches!(err, StewardError::AlreadyClaimed { by } if by == "staff-1"));
    }

    #[tokio::test]
    async fn test_close_requires_owner_staff_or_admin() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();
        let channel = tickets.create("user-1", "general").await.unwrap();

        let err = tickets.close(&channel, "rando", "done").await.unwrap_err();
        assert!(err.is_forbidden());
        assert!(
            !setup
                .engine
                .registry()
                .get(&channel)
                .await
                .unwrap()
                .is_finalized()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_by_owner_runs_full_teardown_once() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();
        let channel = tickets.create("user-1", "general").await.unwrap();

        tickets.close(&channel, "user-1", "resolved").await.unwrap();

        // Transcript rendered and delivered to both the log channel and the
        // owner.
        assert_eq!(setup.transcripts.rendered.lock().unwrap().len(), 1);
        let files = setup.chat.files.lock().unwrap().clone();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "log-chan");
        let dms = setup.chat.dms.lock().unwrap().clone();
        assert_eq!(dms.len(), 1);
        assert_eq!(dms[0].0, "user-1");
        assert!(dms[0].2.is_some());

        // Closing a closed ticket is a quiet no-op.
        tickets.close(&channel, "user-1", "resolved").await.unwrap();
        assert_eq!(setup.transcripts.rendered.lock().unwrap().len(), 1);
        assert_eq!(setup.chat.sent_containing("Ticket closed"), 1);

        // After the grace delay the channel is deleted and the session
        // deregistered.
        tokio::time::sleep(Duration::from_secs(6)).await;
        let deleted = setup.chat.deleted_channels.lock().unwrap().clone();
        assert!(deleted.iter().any(|(id, _)| id == &channel));
        assert!(setup.engine.registry().get(&channel).await.is_none());
        let err = tickets.close(&channel, "user-1", "again").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_close_survives_collaborator_failures() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();

        setup.transcripts.fail.store(true, Ordering::SeqCst);
        setup.chat.fail_dms.store(true, Ordering::SeqCst);

        let channel = tickets.create("user-1", "general").await.unwrap();
        tickets.close(&channel, "user-1", "resolved").await.unwrap();

        let record = setup.engine.registry().get(&channel).await.unwrap();
        assert!(record.is_finalized());
    }

    #[tokio::test]
    async fn test_sweep_warns_then_closes_idle_tickets() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();
        let channel = tickets.create("user-1", "general").await.unwrap();
        let created_at = setup
            .engine
            .registry()
            .get(&channel)
            .await
            .unwrap()
            .created_at;

        // Not idle long enough: nothing happens.
        tickets
            .sweep_inactive(created_at + chrono::Duration::hours(47))
            .await;
        assert!(
            setup
                .engine
                .registry()
                .get(&channel)
                .await
                .unwrap()
                .as_ticket()
                .unwrap()
                .warned_at
                .is_none()
        );

        // Past the inactivity timeout: one warning, persisted on the record.
        let warn_time = created_at + chrono::Duration::hours(49);
        tickets.sweep_inactive(warn_time).await;
        let record = setup.engine.registry().get(&channel).await.unwrap();
        assert_eq!(record.as_ticket().unwrap().warned_at, Some(warn_time));
        assert_eq!(setup.chat.sent_containing("will be closed in"), 1);

        // Sweeping again inside the grace window neither re-warns nor
        // closes.
        tickets
            .sweep_inactive(warn_time + chrono::Duration::hours(1))
            .await;
        assert_eq!(setup.chat.sent_containing("will be closed in"), 1);
        assert!(
            !setup
                .engine
                .registry()
                .get(&channel)
                .await
                .unwrap()
                .is_finalized()
        );

        // Grace expired with no activity: closed through the guard path.
        tickets
            .sweep_inactive(warn_time + chrono::Duration::hours(25))
            .await;
        let record = setup.engine.registry().get(&channel).await.unwrap();
        assert!(record.is_finalized());
        assert_eq!(setup.chat.sent_containing("Closed due to inactivity"), 1);
    }

    #[tokio::test]
    async fn test_sweep_withdraws_warning_after_activity() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();
        let channel = tickets.create("user-1", "general").await.unwrap();
        let created_at = setup
            .engine
            .registry()
            .get(&channel)
            .await
            .unwrap()
            .created_at;

        let warn_time = created_at + chrono::Duration::hours(49);
        tickets.sweep_inactive(warn_time).await;

        // A participant action lands after the warning (without clearing it,
        // as a claim would).
        let reply_time = warn_time + chrono::Duration::hours(2);
        setup
            .engine
            .registry()
            .update(&channel, |record| {
                record.last_activity_at = reply_time;
                Ok(())
            })
            .await
            .unwrap();

        // Grace expired, but the ticket saw activity: warning withdrawn,
        // session stays open.
        tickets
            .sweep_inactive(warn_time + chrono::Duration::hours(25))
            .await;
        let record = setup.engine.registry().get(&channel).await.unwrap();
        assert!(!record.is_finalized());
        assert!(record.as_ticket().unwrap().warned_at.is_none());
    }

    #[tokio::test]
    async fn test_record_activity_clears_pending_warning() {
        let setup = setup().await;
        let tickets = setup.engine.tickets();
        let channel = tickets.create("user-1", "general").await.unwrap();
        let created_at = setup
            .engine
            .registry()
            .get(&channel)
            .await
            .unwrap()
            .created_at;

        tickets
            .sweep_inactive(created_at + chrono::Duration::hours(49))
            .await;
        tickets.record_activity(&channel).await.unwrap();

        let record = setup.engine.registry().get(&channel).await.unwrap();
        assert!(record.as_ticket().unwrap().warned_at.is_none());
    }
}
