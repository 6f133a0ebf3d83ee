//! Periodic inactivity sweep for tickets.
//!
//! The sweeper only schedules; the idle/warn/close rules live in
//! [`TicketService::sweep_inactive`] so they can be exercised directly with
//! crafted timestamps.

use crate::ticket_service::TicketService;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

/// Drives [`TicketService::sweep_inactive`] on a fixed interval.
pub struct InactivitySweeper {
    tickets: Arc<TicketService>,
    sweep_interval: Duration,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl InactivitySweeper {
    pub fn new(tickets: Arc<TicketService>, sweep_interval: Duration) -> Self {
        Self {
            tickets,
            sweep_interval,
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Starts the background sweep loop. A second call is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!(target: "sweeper", "Sweeper already running, skipping");
            return;
        }

        let sweeper = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(sweeper.sweep_interval);
            // The first tick completes immediately; skip it so startup does
            // not race the engine's recovery pass.
            ticker.tick().await;
            tracing::info!(
                target: "sweeper",
                interval_secs = sweeper.sweep_interval.as_secs(),
                "Inactivity sweeper started"
            );
            loop {
                tokio::select! {
                    _ = sweeper.shutdown.cancelled() => {
                        tracing::info!(target: "sweeper", "Inactivity sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        sweeper.tickets.sweep_inactive(Utc::now()).await;
                    }
                }
            }
        });
    }

    /// Stops the background loop.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}
