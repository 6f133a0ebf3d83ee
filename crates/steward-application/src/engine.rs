//! Engine assembly: wiring, startup recovery, and expiry dispatch.
//!
//! `SessionEngine` owns the registry, the deadline scheduler, and the three
//! kind handlers. Starting it loads the persisted collection, catches up
//! sessions whose deadline passed while the process was down (finalizing
//! them inline, before anything else runs), arms timers for the rest, and
//! then spawns the expiry dispatch loop and the inactivity sweeper.

use crate::giveaway_service::GiveawayService;
use crate::inactivity_sweeper::InactivitySweeper;
use crate::ticket_service::TicketService;
use crate::vote_service::VoteService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use steward_core::chat::{AttributionLookup, ChatClient, TranscriptRenderer};
use steward_core::config::StewardConfig;
use steward_core::error::Result;
use steward_core::session::{
    DeadlineScheduler, FinalizeTrigger, SessionKind, SessionRegistry, SessionRepository,
    TicketSequence,
};
use steward_core::stats::StatsRepository;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

/// Everything the engine needs injected.
pub struct EngineDeps {
    pub repository: Arc<dyn SessionRepository>,
    pub sequence: Arc<dyn TicketSequence>,
    pub stats: Arc<dyn StatsRepository>,
    pub chat: Arc<dyn ChatClient>,
    pub transcripts: Arc<dyn TranscriptRenderer>,
    pub attribution: Arc<dyn AttributionLookup>,
    pub config: StewardConfig,
}

/// Routes elapsed deadlines to the kind handler that owns the session.
struct ExpiryRouter {
    registry: Arc<SessionRegistry>,
    giveaways: Arc<GiveawayService>,
    votes: Arc<VoteService>,
}

impl ExpiryRouter {
    async fn dispatch(&self, session_id: &str, trigger: FinalizeTrigger) {
        let Some(record) = self.registry.get(session_id).await else {
            // Finalized and removed (or manually ended) before the timer
            // fired; nothing to do.
            tracing::debug!(
                target: "engine",
                session_id = %session_id,
                "Expiry for unknown session ignored"
            );
            return;
        };
        let dispatched = match record.kind() {
            SessionKind::Giveaway => self.giveaways.finalize(session_id, trigger).await,
            SessionKind::Vote => self.votes.finalize(session_id, trigger).await,
            SessionKind::Ticket => {
                tracing::warn!(
                    target: "engine",
                    session_id = %session_id,
                    "Ticket session unexpectedly carried a deadline"
                );
                Ok(())
            }
        };
        if let Err(err) = dispatched {
            tracing::error!(
                target: "engine",
                session_id = %session_id,
                %trigger,
                error = %err,
                "Deadline finalization failed"
            );
        }
    }
}

/// The assembled session lifecycle engine.
pub struct SessionEngine {
    registry: Arc<SessionRegistry>,
    scheduler: Arc<DeadlineScheduler>,
    tickets: Arc<TicketService>,
    giveaways: Arc<GiveawayService>,
    votes: Arc<VoteService>,
    sweeper: Arc<InactivitySweeper>,
    router: Arc<ExpiryRouter>,
    expiry_rx: Mutex<Option<UnboundedReceiver<String>>>,
    shutdown: CancellationToken,
}

impl SessionEngine {
    pub fn new(deps: EngineDeps) -> Self {
        let registry = Arc::new(SessionRegistry::new(deps.repository));
        let (scheduler, expiry_rx) = DeadlineScheduler::new();
        let scheduler = Arc::new(scheduler);

        let tickets = Arc::new(TicketService::new(
            Arc::clone(&registry),
            Arc::clone(&deps.chat),
            deps.transcripts,
            deps.attribution,
            deps.stats,
            deps.sequence,
            deps.config.ticket.clone(),
        ));
        let giveaways = Arc::new(GiveawayService::new(
            Arc::clone(&registry),
            Arc::clone(&scheduler),
            Arc::clone(&deps.chat),
            deps.config.giveaway.clone(),
        ));
        let votes = Arc::new(VoteService::new(
            Arc::clone(&registry),
            Arc::clone(&scheduler),
            Arc::clone(&deps.chat),
            deps.config.vote.clone(),
        ));
        let sweeper = Arc::new(InactivitySweeper::new(
            Arc::clone(&tickets),
            Duration::from_secs(deps.config.ticket.sweep_interval_secs),
        ));
        let router = Arc::new(ExpiryRouter {
            registry: Arc::clone(&registry),
            giveaways: Arc::clone(&giveaways),
            votes: Arc::clone(&votes),
        });

        Self {
            registry,
            scheduler,
            tickets,
            giveaways,
            votes,
            sweeper,
            router,
            expiry_rx: Mutex::new(Some(expiry_rx)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Loads persisted sessions, runs deadline recovery, and starts the
    /// background loops.
    ///
    /// Sessions whose deadline passed while the process was down are
    /// finalized here, inline, before this method returns — a deadline never
    /// silently expires just because the process was not around to see it.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted collection cannot be loaded.
    pub async fn start(&self) -> Result<()> {
        let records = self.registry.init().await?;
        let now = Utc::now();

        for record in records {
            if record.is_finalized() {
                continue;
            }
            let Some(deadline_at) = record.deadline_at else {
                continue;
            };
            if deadline_at <= now {
                tracing::info!(
                    target: "engine",
                    session_id = %record.id,
                    deadline_at = %deadline_at,
                    "Deadline passed while offline, finalizing now"
                );
                self.router
                    .dispatch(&record.id, FinalizeTrigger::Startup)
                    .await;
            } else {
                self.scheduler.arm(&record.id, deadline_at).await;
            }
        }

        let rx = self.expiry_rx.lock().await.take();
        if let Some(mut rx) = rx {
            let router = Arc::clone(&self.router);
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        expired = rx.recv() => {
                            let Some(session_id) = expired else { break };
                            router.dispatch(&session_id, FinalizeTrigger::Deadline).await;
                        }
                    }
                }
            });
        }

        self.sweeper.start();
        tracing::info!(target: "engine", "Session engine started");
        Ok(())
    }

    /// Stops the background loops and aborts every armed timer. Session
    /// state needs no flushing — it is persisted on every mutation.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.sweeper.stop();
        self.scheduler.shutdown().await;
        tracing::info!(target: "engine", "Session engine stopped");
    }

    pub fn tickets(&self) -> &Arc<TicketService> {
        &self.tickets
    }

    pub fn giveaways(&self) -> &Arc<GiveawayService> {
        &self.giveaways
    }

    pub fn votes(&self) -> &Arc<VoteService> {
        &self.votes
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

impl SessionEngine {
    /// Assembles an engine on the default file-backed storage and the
    /// default config location.
    ///
    /// # Errors
    ///
    /// Returns an error if storage files or the config cannot be opened.
    pub fn with_default_storage(
        chat: Arc<dyn ChatClient>,
        transcripts: Arc<dyn TranscriptRenderer>,
        attribution: Arc<dyn AttributionLookup>,
    ) -> anyhow::Result<Self> {
        let repository = steward_infrastructure::JsonSessionRepository::default_location()?;
        let sequence = steward_infrastructure::JsonTicketSequence::default_location()?;
        let stats = steward_infrastructure::JsonStatsRepository::default_location()?;
        let config = steward_infrastructure::config_service::load_default_config()?;
        Ok(Self::new(EngineDeps {
            repository: Arc::new(repository),
            sequence: Arc::new(sequence),
            stats: Arc::new(stats),
            chat,
            transcripts,
            attribution,
            config,
        }))
    }
}
