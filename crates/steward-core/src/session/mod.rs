//! Session domain module.
//!
//! Everything the generic lifecycle engine knows about sessions lives here:
//!
//! - `model`: the persisted session record and its kind-specific payloads
//! - `repository`: persistence ports (`SessionRepository`, `TicketSequence`)
//! - `registry`: the in-memory source of truth plus the transition guard
//! - `scheduler`: one-shot absolute-deadline timers
//! - `sampling`: uniform winner selection

mod model;
mod registry;
mod repository;
mod sampling;
mod scheduler;

// Re-export public API
pub use model::{
    FinalizeTrigger, GiveawayDetail, SessionDetail, SessionKind, SessionRecord, SessionStatus,
    TicketDetail, VoteDecision, VoteDetail, VoteOutcome,
};
pub use registry::{FinalizeOutcome, SessionRegistry};
pub use repository::{SessionRepository, TicketSequence};
pub use sampling::sample_without_replacement;
pub use scheduler::DeadlineScheduler;
