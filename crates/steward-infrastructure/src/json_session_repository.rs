//! JSON file-backed session repository.
//!
//! The whole collection lives in one JSON document and is rewritten on every
//! save. Writes go to a sibling temp file first and are renamed into place,
//! so a crash mid-write can lose at most the newest save, never corrupt the
//! store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use steward_core::error::{Result as StewardResult, StewardError};
use steward_core::session::{SessionRecord, SessionRepository};
use tokio::fs;

/// On-disk document shape. Wrapping the record list in a named field keeps
/// room for future top-level metadata without a format break.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    sessions: Vec<SessionRecord>,
}

/// File-backed implementation of [`SessionRepository`].
pub struct JsonSessionRepository {
    file_path: PathBuf,
}

impl JsonSessionRepository {
    /// Creates a repository writing to the given file, creating the parent
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create session store directory")?;
        }
        Ok(Self { file_path })
    }

    /// Creates a repository at the default location
    /// (`~/.local/share/steward/sessions.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or
    /// created.
    pub fn default_location() -> Result<Self> {
        let file_path = crate::paths::StewardPaths::sessions_file()
            .context("Failed to resolve data directory")?;
        Self::new(file_path)
    }

    fn temp_path(&self) -> PathBuf {
        let mut path = self.file_path.as_os_str().to_owned();
        path.push(".tmp");
        PathBuf::from(path)
    }
}

#[async_trait]
impl SessionRepository for JsonSessionRepository {
    async fn load_all(&self) -> StewardResult<Vec<SessionRecord>> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&self.file_path).await.map_err(|e| {
            StewardError::io(format!(
                "Failed to read session store {:?}: {}",
                self.file_path, e
            ))
        })?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        let document: StoreDocument = serde_json::from_str(&json)?;
        Ok(document.sessions)
    }

    async fn save_all(&self, sessions: &[SessionRecord]) -> StewardResult<()> {
        let document = StoreDocument {
            sessions: sessions.to_vec(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        // Write-then-rename keeps the previous store intact until the new
        // one is fully on disk.
        let temp_path = self.temp_path();
        fs::write(&temp_path, json.as_bytes()).await.map_err(|e| {
            StewardError::io(format!(
                "Failed to write session store {:?}: {}",
                temp_path, e
            ))
        })?;
        fs::rename(&temp_path, &self.file_path).await.map_err(|e| {
            StewardError::io(format!(
                "Failed to replace session store {:?}: {}",
                self.file_path, e
            ))
        })?;
        tracing::debug!(
            target: "session_store",
            count = sessions.len(),
            "Session store rewritten"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use steward_core::session::{
        GiveawayDetail, SessionDetail, SessionStatus, TicketDetail, VoteDetail,
    };
    use tempfile::TempDir;

    fn sample_records() -> Vec<SessionRecord> {
        let now = Utc::now();
        let mut entrants = BTreeSet::new();
        entrants.insert("user-a".to_string());
        entrants.insert("user-b".to_string());
        let mut yes = BTreeSet::new();
        yes.insert("user-c".to_string());

        vec![
            SessionRecord::ticket(
                "chan-1",
                TicketDetail {
                    owner_id: "user-1".to_string(),
                    category_id: "appeals".to_string(),
                    number: 7,
                    claimed_by: Some("staff-1".to_string()),
                    staff_roles: vec!["role-a".to_string(), "role-b".to_string()],
                    claim_response_ms: Some(90_000),
                    warned_at: None,
                },
                now,
            ),
            SessionRecord::giveaway(
                "msg-1",
                GiveawayDetail {
                    prize: "Nitro".to_string(),
                    host_id: "host-1".to_string(),
                    channel_id: "chan-2".to_string(),
                    winner_count: 2,
                    role_requirement: Some("role-premium".to_string()),
                    entrants,
                    last_winners: Vec::new(),
                },
                now + chrono::Duration::hours(2),
                now,
            ),
            SessionRecord::vote(
                "chan-3",
                VoteDetail {
                    target_id: "user-9".to_string(),
                    message_id: "msg-2".to_string(),
                    yes,
                    no: BTreeSet::new(),
                    outcome: None,
                },
                now + chrono::Duration::days(7),
                now,
            ),
        ]
    }

    #[tokio::test]
    async fn test_round_trips_every_kind() {
        let temp_dir = TempDir::new().unwrap();
        let repository =
            JsonSessionRepository::new(temp_dir.path().join("sessions.json")).unwrap();

        let records = sample_records();
        repository.save_all(&records).await.unwrap();
        let loaded = repository.load_all().await.unwrap();
        assert_eq!(loaded, records);
    }

    #[tokio::test]
    async fn test_missing_store_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let repository =
            JsonSessionRepository::new(temp_dir.path().join("sessions.json")).unwrap();
        assert!(repository.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_collection() {
        let temp_dir = TempDir::new().unwrap();
        let repository =
            JsonSessionRepository::new(temp_dir.path().join("sessions.json")).unwrap();

        repository.save_all(&sample_records()).await.unwrap();
        repository.save_all(&sample_records()[..1]).await.unwrap();

        let loaded = repository.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "chan-1");
        // No temp file may be left behind after a completed save.
        assert!(!repository.temp_path().exists());
    }

    #[tokio::test]
    async fn test_unknown_fields_are_ignored_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("sessions.json");
        let repository = JsonSessionRepository::new(&file_path).unwrap();
        repository.save_all(&sample_records()[..1]).await.unwrap();

        // Simulate a newer release having written extra fields.
        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&file_path).unwrap()).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("format_version".to_string(), 2.into());
        value["sessions"][0]
            .as_object_mut()
            .unwrap()
            .insert("escalated_to".to_string(), "staff-9".into());
        std::fs::write(&file_path, serde_json::to_string(&value).unwrap()).unwrap();

        let loaded = repository.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].status, SessionStatus::Open);
        assert!(matches!(loaded[0].detail, SessionDetail::Ticket(_)));
    }

    #[tokio::test]
    async fn test_empty_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("sessions.json");
        std::fs::write(&file_path, "").unwrap();
        let repository = JsonSessionRepository::new(&file_path).unwrap();
        assert!(repository.load_all().await.unwrap().is_empty());
    }
}
