//! Core domain layer for the Steward session engine.
//!
//! Defines the session lifecycle model (records, registry, transition guard,
//! deadline timers), the error taxonomy, configuration types, and the narrow
//! ports behind which the chat platform and other collaborators live.

pub mod chat;
pub mod config;
pub mod error;
pub mod session;
pub mod stats;

// Re-export common error type
pub use error::StewardError;
