//! Application layer for the Steward session engine.
//!
//! Wires the generic lifecycle engine (registry, transition guard, deadline
//! scheduler) to the three kind handlers and the background loops, behind
//! the collaborator ports defined in `steward-core`.

pub mod engine;
pub mod giveaway_service;
pub mod inactivity_sweeper;
pub mod ticket_service;
pub mod vote_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use engine::{EngineDeps, SessionEngine};
pub use giveaway_service::{EntryToggle, GiveawayService};
pub use inactivity_sweeper::InactivitySweeper;
pub use ticket_service::TicketService;
pub use vote_service::VoteService;
