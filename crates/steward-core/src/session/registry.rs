//! In-memory session registry.
//!
//! The registry is the single source of truth while the process runs. Every
//! mutation happens under the write lock and re-serializes the entire
//! collection through the repository before the lock is released, so writers
//! are strictly serialized and in-memory state always matches disk.
//!
//! It also hosts the transition guard: `finalize_with` flips a session's
//! status to `Finalized` synchronously, before any suspending operation, so
//! a second trigger (timer, manual command, inactivity close) interleaving
//! during finalization side effects observes the terminal status and no-ops.

use super::model::{SessionRecord, SessionStatus};
use super::repository::SessionRepository;
use crate::error::{Result, StewardError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of a finalize attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// This call performed the terminal transition; the snapshot reflects the
    /// sealed record and the caller owns the closing side effects.
    Performed(SessionRecord),
    /// Another trigger got there first; the caller must not repeat any side
    /// effect.
    AlreadyFinalized,
    /// The caller's permit declined the transition (e.g. activity resumed
    /// before an inactivity close); the session stays open.
    Vetoed,
}

/// Registry of live sessions keyed by their external identifier.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    repository: Arc<dyn SessionRepository>,
}

impl SessionRegistry {
    pub fn new(repository: Arc<dyn SessionRepository>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            repository,
        }
    }

    /// Loads the persisted collection into memory.
    ///
    /// Called once at process start, before any timer is armed. Returns a
    /// snapshot of everything loaded so the caller can run deadline
    /// recovery.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read.
    pub async fn init(&self) -> Result<Vec<SessionRecord>> {
        let loaded = self.repository.load_all().await?;
        let mut sessions = self.sessions.write().await;
        sessions.clear();
        for record in &loaded {
            sessions.insert(record.id.clone(), record.clone());
        }
        tracing::info!(
            target: "session_registry",
            count = loaded.len(),
            "Loaded persisted sessions"
        );
        Ok(loaded)
    }

    /// Registers a new session and persists the collection.
    ///
    /// # Errors
    ///
    /// - `AlreadyActive` if a session with this id is already registered
    /// - Repository errors if persisting fails (the insert is rolled back)
    pub async fn insert(&self, record: SessionRecord) -> Result<()> {
        self.insert_when(record, |_| Ok(())).await
    }

    /// Registers a new session after re-validating a caller guard against
    /// the current collection, atomically under the write lock.
    ///
    /// Creation flows that check a precondition over other sessions (e.g.
    /// the per-user open-ticket limit) suspend on collaborator calls between
    /// the initial check and the insert; running the guard again here closes
    /// that window.
    ///
    /// # Errors
    ///
    /// - `AlreadyActive` if a session with this id is already registered
    /// - Whatever the guard returns
    /// - Repository errors if persisting fails (the insert is rolled back)
    pub async fn insert_when<G>(&self, record: SessionRecord, guard: G) -> Result<()>
    where
        G: FnOnce(&HashMap<String, SessionRecord>) -> Result<()>,
    {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&record.id) {
            return Err(StewardError::AlreadyActive {
                id: record.id.clone(),
            });
        }
        guard(&sessions)?;
        let id = record.id.clone();
        sessions.insert(id.clone(), record);
        if let Err(err) = self.persist(&sessions).await {
            sessions.remove(&id);
            return Err(err);
        }
        Ok(())
    }

    /// Returns a snapshot of one session.
    pub async fn get(&self, id: &str) -> Option<SessionRecord> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Returns a snapshot of every registered session.
    pub async fn snapshot(&self) -> Vec<SessionRecord> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }

    /// Applies a mutation to one non-finalized session and persists the
    /// collection.
    ///
    /// The closure runs under the write lock with no suspension point
    /// between its guard checks and its mutation, so check-then-act
    /// sequences inside it cannot interleave with other callers. Callers
    /// that await collaborator calls before `update` must re-validate their
    /// guard condition inside the closure.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the id is unknown
    /// - `Finalized` if the session already reached its terminal state
    /// - Whatever the closure returns (the record is restored)
    /// - Repository errors if persisting fails (the record is restored)
    pub async fn update<F, R>(&self, id: &str, mutate: F) -> Result<R>
    where
        F: FnOnce(&mut SessionRecord) -> Result<R>,
    {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(id)
            .ok_or_else(|| StewardError::not_found("session", id))?;
        if record.is_finalized() {
            return Err(StewardError::Finalized { id: id.to_string() });
        }
        let backup = record.clone();
        let result = match mutate(record) {
            Ok(result) => result,
            Err(err) => {
                *record = backup;
                return Err(err);
            }
        };
        if let Err(err) = self.persist(&sessions).await {
            // Re-borrow: the previous mutable borrow ended at persist().
            if let Some(record) = sessions.get_mut(id) {
                *record = backup;
            }
            return Err(err);
        }
        Ok(result)
    }

    /// Performs the at-most-once terminal transition for a session.
    ///
    /// The status flip happens synchronously before the persist await, so a
    /// concurrent trigger resuming inside this method's suspension points
    /// already observes `Finalized`. `seal` runs after the flip, still under
    /// the lock, and must not block — it is meant for recording the outcome
    /// (winners drawn, tallies locked) on the record before it is persisted.
    ///
    /// A persist failure restores the record and surfaces the error so the
    /// transition can be retried by a later trigger; finalization side
    /// effects must only ever run on `Performed`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the id is unknown
    /// - Repository errors if persisting fails (the flip is rolled back)
    pub async fn finalize_with<F>(&self, id: &str, seal: F) -> Result<FinalizeOutcome>
    where
        F: FnOnce(&mut SessionRecord),
    {
        self.finalize_if(id, |_| true, seal).await
    }

    /// Variant of [`SessionRegistry::finalize_with`] whose `permit` closure
    /// re-validates the trigger condition on the live record, atomically
    /// with the flip.
    ///
    /// The inactivity close path uses this to re-check `last_activity_at`
    /// immediately before closing: a reply that lands after the grace check
    /// but before the close makes `permit` return false, the session stays
    /// open, and the caller receives [`FinalizeOutcome::Vetoed`].
    ///
    /// # Errors
    ///
    /// - `NotFound` if the id is unknown
    /// - Repository errors if persisting fails (the flip is rolled back)
    pub async fn finalize_if<P, F>(&self, id: &str, permit: P, seal: F) -> Result<FinalizeOutcome>
    where
        P: FnOnce(&SessionRecord) -> bool,
        F: FnOnce(&mut SessionRecord),
    {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(id)
            .ok_or_else(|| StewardError::not_found("session", id))?;
        if record.is_finalized() {
            tracing::debug!(
                target: "session_registry",
                session_id = %id,
                "Finalize requested on an already-finalized session"
            );
            return Ok(FinalizeOutcome::AlreadyFinalized);
        }
        if !permit(record) {
            return Ok(FinalizeOutcome::Vetoed);
        }
        let backup = record.clone();
        record.status = SessionStatus::Finalized;
        seal(record);
        let snapshot = record.clone();
        if let Err(err) = self.persist(&sessions).await {
            if let Some(record) = sessions.get_mut(id) {
                *record = backup;
            }
            return Err(err);
        }
        tracing::info!(
            target: "session_registry",
            session_id = %id,
            kind = %snapshot.kind(),
            "Session finalized"
        );
        Ok(FinalizeOutcome::Performed(snapshot))
    }

    /// Removes a session and persists the collection.
    ///
    /// Removing an unknown id is not an error — close paths race with each
    /// other by design and the loser should see a clean no-op.
    pub async fn remove(&self, id: &str) -> Result<Option<SessionRecord>> {
        let mut sessions = self.sessions.write().await;
        let Some(removed) = sessions.remove(id) else {
            return Ok(None);
        };
        if let Err(err) = self.persist(&sessions).await {
            sessions.insert(id.to_string(), removed);
            return Err(err);
        }
        Ok(Some(removed))
    }

    /// Serializes the full collection through the repository.
    ///
    /// Runs while the caller still holds the write lock, which is what
    /// serializes concurrent savers.
    async fn persist(&self, sessions: &HashMap<String, SessionRecord>) -> Result<()> {
        let mut records: Vec<SessionRecord> = sessions.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        self.repository.save_all(&records).await
    }
}
