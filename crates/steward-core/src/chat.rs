//! Collaborator ports for the chat platform.
//!
//! The engine never talks to a chat SDK directly. Everything it needs from
//! the platform — channels, messages, role membership, file delivery — goes
//! through these narrow traits so the command layer can plug in the real
//! client and tests can plug in mocks.

use crate::error::Result;
use async_trait::async_trait;

/// A file produced by a collaborator (e.g. an HTML transcript) that can be
/// attached to a message or a DM.
#[derive(Debug, Clone, PartialEq)]
pub struct FileArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Narrow interface over the chat platform client.
///
/// Message content crosses this boundary as plain text; rich rendering
/// (embeds, buttons) is the embedding bot's concern. All identifiers are the
/// platform's own opaque strings.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Creates a channel visible only to the listed subjects (users or
    /// roles). Returns the new channel's identifier.
    async fn create_channel(
        &self,
        name: &str,
        topic: &str,
        allow_access: &[String],
    ) -> Result<String>;

    async fn delete_channel(&self, channel_id: &str, reason: &str) -> Result<()>;

    /// Sends a message and returns its identifier.
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String>;

    async fn edit_message(&self, channel_id: &str, message_id: &str, content: &str)
    -> Result<()>;

    /// Sends a message with a file attached.
    async fn send_file(
        &self,
        channel_id: &str,
        content: &str,
        artifact: &FileArtifact,
    ) -> Result<()>;

    /// Direct-messages an actor, optionally with a file attached.
    async fn send_direct_message(
        &self,
        actor_id: &str,
        content: &str,
        artifact: Option<&FileArtifact>,
    ) -> Result<()>;

    /// Role identifiers the actor currently holds.
    async fn member_role_ids(&self, actor_id: &str) -> Result<Vec<String>>;

    /// Whether the actor holds administrator privileges.
    async fn is_admin(&self, actor_id: &str) -> Result<bool>;

    /// Revokes a subject's (user or role) view/send access to a channel.
    async fn revoke_channel_access(&self, channel_id: &str, subject_id: &str) -> Result<()>;
}

/// Renders the full message history of a channel into a file artifact.
#[async_trait]
pub trait TranscriptRenderer: Send + Sync {
    async fn render(&self, channel_id: &str) -> Result<FileArtifact>;
}

/// Best-effort mapping from a recent moderation-relevant change back to the
/// responsible actor. May legitimately answer `None`; callers must never
/// block a state transition on the result.
#[async_trait]
pub trait AttributionLookup: Send + Sync {
    async fn responsible_actor(&self, channel_id: &str) -> Result<Option<String>>;
}
