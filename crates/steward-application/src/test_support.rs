//! Shared mocks and harness helpers for service tests.

use crate::engine::{EngineDeps, SessionEngine};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use steward_core::chat::{
    AttributionLookup, ChatClient, FileArtifact, TranscriptRenderer,
};
use steward_core::config::{StewardConfig, TicketCategory, TicketConfig};
use steward_core::error::{Result, StewardError};
use steward_infrastructure::{JsonSessionRepository, JsonStatsRepository, JsonTicketSequence};

/// Config with one staffed category, a tight ticket limit, and an override
/// role, so permission paths are easy to exercise.
pub(crate) fn test_config() -> StewardConfig {
    let mut config = StewardConfig::default();
    config.ticket = TicketConfig {
        categories: vec![
            TicketCategory {
                id: "general".to_string(),
                label: "General".to_string(),
                description: "General inquiries".to_string(),
                staff_roles: vec!["role-staff".to_string()],
            },
            TicketCategory {
                id: "appeals".to_string(),
                label: "Appeals".to_string(),
                description: "Ban or mute appeals".to_string(),
                staff_roles: vec!["role-appeals".to_string()],
            },
        ],
        global_staff_roles: vec!["role-global".to_string()],
        max_open_tickets: 2,
        log_channel_id: Some("log-chan".to_string()),
        ..TicketConfig::default()
    };
    config.vote.override_roles = vec!["role-manager".to_string()];
    config
}

/// Assembles an engine over file-backed storage rooted at `dir`.
pub(crate) fn build_engine(
    dir: &Path,
    config: StewardConfig,
    chat: Arc<MockChatClient>,
    transcripts: Arc<MockTranscripts>,
    attribution: Arc<MockAttribution>,
) -> SessionEngine {
    SessionEngine::new(EngineDeps {
        repository: Arc::new(JsonSessionRepository::new(dir.join("sessions.json")).unwrap()),
        sequence: Arc::new(JsonTicketSequence::new(dir.join("ticket-sequence.json")).unwrap()),
        stats: Arc::new(JsonStatsRepository::new(dir.join("staff-stats.json")).unwrap()),
        chat,
        transcripts,
        attribution,
        config,
    })
}

/// Records every platform call so tests can assert on side effects.
#[derive(Default)]
pub(crate) struct MockChatClient {
    pub sent: Mutex<Vec<(String, String)>>,
    pub edits: Mutex<Vec<(String, String, String)>>,
    pub files: Mutex<Vec<(String, String)>>,
    pub dms: Mutex<Vec<(String, String, Option<String>)>>,
    pub created_channels: Mutex<Vec<(String, String, Vec<String>)>>,
    pub deleted_channels: Mutex<Vec<(String, String)>>,
    pub revoked: Mutex<Vec<(String, String)>>,
    roles: Mutex<HashMap<String, Vec<String>>>,
    admins: Mutex<HashSet<String>>,
    pub fail_dms: AtomicBool,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_roles(&self, actor_id: &str, roles: &[&str]) {
        self.roles.lock().unwrap().insert(
            actor_id.to_string(),
            roles.iter().map(|r| r.to_string()).collect(),
        );
    }

    pub fn set_admin(&self, actor_id: &str) {
        self.admins.lock().unwrap().insert(actor_id.to_string());
    }

    /// Contents of every message sent to a channel, in order.
    pub fn sent_to(&self, channel_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(channel, _)| channel == channel_id)
            .map(|(_, content)| content.clone())
            .collect()
    }

    /// Number of sent messages (across all channels) containing `needle`.
    pub fn sent_containing(&self, needle: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, content)| content.contains(needle))
            .count()
    }

    /// Number of message edits (across all channels) containing `needle`.
    pub fn edits_containing(&self, needle: &str) -> usize {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, content)| content.contains(needle))
            .count()
    }
}

#[async_trait::async_trait]
impl ChatClient for MockChatClient {
    async fn create_channel(
        &self,
        name: &str,
        _topic: &str,
        allow_access: &[String],
    ) -> Result<String> {
        let channel_id = format!("chan-{}", uuid::Uuid::new_v4());
        self.created_channels.lock().unwrap().push((
            channel_id.clone(),
            name.to_string(),
            allow_access.to_vec(),
        ));
        Ok(channel_id)
    }

    async fn delete_channel(&self, channel_id: &str, reason: &str) -> Result<()> {
        self.deleted_channels
            .lock()
            .unwrap()
            .push((channel_id.to_string(), reason.to_string()));
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String> {
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), content.to_string()));
        Ok(format!("msg-{}", uuid::Uuid::new_v4()))
    }

    async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<()> {
        self.edits.lock().unwrap().push((
            channel_id.to_string(),
            message_id.to_string(),
            content.to_string(),
        ));
        Ok(())
    }

    async fn send_file(
        &self,
        channel_id: &str,
        _content: &str,
        artifact: &FileArtifact,
    ) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .push((channel_id.to_string(), artifact.file_name.clone()));
        Ok(())
    }

    async fn send_direct_message(
        &self,
        actor_id: &str,
        content: &str,
        artifact: Option<&FileArtifact>,
    ) -> Result<()> {
        if self.fail_dms.load(Ordering::SeqCst) {
            return Err(StewardError::collaborator("user has DMs disabled"));
        }
        self.dms.lock().unwrap().push((
            actor_id.to_string(),
            content.to_string(),
            artifact.map(|a| a.file_name.clone()),
        ));
        Ok(())
    }

    async fn member_role_ids(&self, actor_id: &str) -> Result<Vec<String>> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .get(actor_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn is_admin(&self, actor_id: &str) -> Result<bool> {
        Ok(self.admins.lock().unwrap().contains(actor_id))
    }

    async fn revoke_channel_access(&self, channel_id: &str, subject_id: &str) -> Result<()> {
        self.revoked
            .lock()
            .unwrap()
            .push((channel_id.to_string(), subject_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockTranscripts {
    pub fail: AtomicBool,
    pub rendered: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl TranscriptRenderer for MockTranscripts {
    async fn render(&self, channel_id: &str) -> Result<FileArtifact> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StewardError::collaborator("history fetch failed"));
        }
        self.rendered.lock().unwrap().push(channel_id.to_string());
        Ok(FileArtifact {
            file_name: format!("transcript-{}.html", channel_id),
            bytes: b"<html></html>".to_vec(),
        })
    }
}

#[derive(Default)]
pub(crate) struct MockAttribution {
    pub actor: Mutex<Option<String>>,
}

#[async_trait::async_trait]
impl AttributionLookup for MockAttribution {
    async fn responsible_actor(&self, _channel_id: &str) -> Result<Option<String>> {
        Ok(self.actor.lock().unwrap().clone())
    }
}
