//! One-shot deadline timers.
//!
//! The scheduler owns one spawned timer task per armed session. Timers are
//! best-effort: they only exist while the process runs, and the remaining
//! delay is always re-derived from the persisted absolute deadline, so a
//! restart re-arms everything correctly through the engine's recovery pass.
//!
//! An elapsed timer does not finalize anything itself — it only reports the
//! session id on a channel. Routing the expiry to the right kind handler
//! (and through the transition guard) is the engine's job, which is what
//! makes a late-firing timer for an already-finalized session a harmless
//! no-op.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Schedules one deferred expiry notification per session.
pub struct DeadlineScheduler {
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    tx: UnboundedSender<String>,
}

impl DeadlineScheduler {
    /// Creates a scheduler and the receiving end of its expiry channel.
    pub fn new() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                timers: Mutex::new(HashMap::new()),
                tx,
            },
            rx,
        )
    }

    /// Arms (or re-arms) the expiry timer for a session.
    ///
    /// The delay is computed from the absolute deadline at call time; a
    /// deadline already in the past fires immediately. Re-arming replaces
    /// any previously armed timer for the same session.
    pub async fn arm(&self, session_id: &str, deadline_at: DateTime<Utc>) {
        let delay = (deadline_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let tx = self.tx.clone();
        let id = session_id.to_string();
        tracing::debug!(
            target: "deadline_scheduler",
            session_id = %session_id,
            delay_secs = delay.as_secs(),
            "Arming expiry timer"
        );
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver being gone just means the engine shut down first.
            let _ = tx.send(task_id);
        });
        let mut timers = self.timers.lock().await;
        if let Some(previous) = timers.insert(id, handle) {
            previous.abort();
        }
    }

    /// Cancels the armed timer for a session, if any.
    ///
    /// Purely an optimization: a timer that fires after its session was
    /// finalized is already neutralized by the transition guard.
    pub async fn disarm(&self, session_id: &str) {
        let mut timers = self.timers.lock().await;
        if let Some(handle) = timers.remove(session_id) {
            handle.abort();
        }
    }

    /// Number of currently armed timers (including already-elapsed ones not
    /// yet disarmed).
    pub async fn armed(&self) -> usize {
        self.timers.lock().await.len()
    }

    /// Aborts every armed timer. Called on engine teardown.
    pub async fn shutdown(&self) {
        let mut timers = self.timers.lock().await;
        for (_, handle) in timers.drain() {
            handle.abort();
        }
    }
}
