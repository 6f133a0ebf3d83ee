//! Error types for the Steward session engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Steward workspace.
///
/// Expected business-rule violations (permission checks, duplicate actions,
/// bad input) are ordinary values of this type, surfaced to the command layer
/// as user-facing messages. Only the infrastructure variants (`Io`,
/// `Serialization`, `Internal`) represent faults.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum StewardError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Actor lacks the role or ownership required for an action
    #[error("Forbidden: {action}")]
    Forbidden { action: String },

    /// Ticket is already claimed by another staff member
    #[error("Ticket already claimed by '{by}'")]
    AlreadyClaimed { by: String },

    /// Actor already cast this exact vote
    #[error("Vote '{decision}' already recorded")]
    AlreadyVoted { decision: String },

    /// A session with this identifier is already active
    #[error("Session '{id}' already exists")]
    AlreadyActive { id: String },

    /// Session has reached its terminal state and accepts no further actions
    #[error("Session '{id}' is already finalized")]
    Finalized { id: String },

    /// Operation requires a finalized session (e.g. giveaway reroll)
    #[error("Session '{id}' has not been finalized yet")]
    NotFinalized { id: String },

    /// Actor has hit the open-ticket limit
    #[error("Open ticket limit of {limit} reached")]
    MaxOpenReached { limit: usize },

    /// Unknown ticket category identifier
    #[error("Unknown ticket category '{id}'")]
    InvalidCategory { id: String },

    /// Requested duration is below the configured floor
    #[error("Invalid duration: {requested_ms}ms (minimum {minimum_ms}ms)")]
    InvalidDuration { requested_ms: i64, minimum_ms: i64 },

    /// Actor lacks a role required to participate
    #[error("Missing required role '{role_id}'")]
    MissingRole { role_id: String },

    /// A chat-platform call failed (network/permission issue outside this subsystem)
    #[error("Collaborator failure: {message}")]
    Collaborator { message: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StewardError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Forbidden error
    pub fn forbidden(action: impl Into<String>) -> Self {
        Self::Forbidden {
            action: action.into(),
        }
    }

    /// Creates a Collaborator error
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator {
            message: message.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a Forbidden error
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Check if this error reports an action that already happened.
    ///
    /// From the caller's perspective these are idempotent no-ops to be
    /// rendered as an informational message, never treated as a fault.
    pub fn is_already_done(&self) -> bool {
        matches!(
            self,
            Self::AlreadyClaimed { .. }
                | Self::AlreadyVoted { .. }
                | Self::AlreadyActive { .. }
                | Self::Finalized { .. }
                | Self::NotFinalized { .. }
        )
    }

    /// Check if this error reports rejected caller input
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::MaxOpenReached { .. }
                | Self::InvalidCategory { .. }
                | Self::InvalidDuration { .. }
                | Self::MissingRole { .. }
        )
    }

    /// Check if this is a Collaborator error
    pub fn is_collaborator(&self) -> bool {
        matches!(self, Self::Collaborator { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for StewardError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for StewardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for StewardError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for StewardError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, StewardError>`.
pub type Result<T> = std::result::Result<T, StewardError>;
