//! Infrastructure layer for the Steward session engine.
//!
//! File-backed implementations of the persistence ports defined in
//! `steward-core`, plus path resolution and config loading.

pub mod config_service;
pub mod json_session_repository;
pub mod json_stats_repository;
pub mod json_ticket_sequence;
pub mod paths;

pub use crate::json_session_repository::JsonSessionRepository;
pub use crate::json_stats_repository::JsonStatsRepository;
pub use crate::json_ticket_sequence::JsonTicketSequence;
