//! Session persistence ports.

use super::model::SessionRecord;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract store for the full session collection.
///
/// The collection is small (tens of records), so the contract is a whole-set
/// read-modify-write: `save_all` replaces everything previously persisted.
/// Implementations must be atomic at the file level — a crash mid-save may
/// lose the newest write but must never leave a truncated, unparseable store.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Round-trip every kind-specific field without loss (participant set
///   order is irrelevant)
/// - Ignore unknown record fields on load, for forward compatibility
/// - Treat a missing store as an empty collection
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Loads every persisted session.
    async fn load_all(&self) -> Result<Vec<SessionRecord>>;

    /// Atomically replaces the persisted collection.
    async fn save_all(&self, sessions: &[SessionRecord]) -> Result<()>;
}

/// Monotonic counter backing human-readable ticket numbers.
#[async_trait]
pub trait TicketSequence: Send + Sync {
    /// Allocates and persists the next ticket number.
    async fn next(&self) -> Result<u32>;
}
