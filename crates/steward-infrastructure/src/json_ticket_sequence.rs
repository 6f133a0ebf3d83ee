//! Persisted monotonic ticket number counter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use steward_core::error::{Result as StewardResult, StewardError};
use steward_core::session::TicketSequence;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SequenceDocument {
    #[serde(default)]
    last_number: u32,
}

/// File-backed implementation of [`TicketSequence`].
pub struct JsonTicketSequence {
    file_path: PathBuf,
    last_number: Mutex<u32>,
}

impl JsonTicketSequence {
    /// Opens (or initializes) the counter at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or an
    /// existing file cannot be parsed.
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create counter directory")?;
        }
        let last_number = if file_path.exists() {
            let json = std::fs::read_to_string(&file_path)
                .context(format!("Failed to read counter file: {:?}", file_path))?;
            if json.trim().is_empty() {
                0
            } else {
                let document: SequenceDocument =
                    serde_json::from_str(&json).context("Failed to deserialize counter")?;
                document.last_number
            }
        } else {
            0
        };
        Ok(Self {
            file_path,
            last_number: Mutex::new(last_number),
        })
    }

    /// Opens the counter at the default location
    /// (`~/.local/share/steward/ticket-sequence.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or the
    /// existing file cannot be parsed.
    pub fn default_location() -> Result<Self> {
        let file_path = crate::paths::StewardPaths::ticket_sequence_file()
            .context("Failed to resolve data directory")?;
        Self::new(file_path)
    }
}

#[async_trait]
impl TicketSequence for JsonTicketSequence {
    async fn next(&self) -> StewardResult<u32> {
        let mut last_number = self.last_number.lock().await;
        let allocated = *last_number + 1;
        let json = serde_json::to_string_pretty(&SequenceDocument {
            last_number: allocated,
        })?;
        fs::write(&self.file_path, json.as_bytes())
            .await
            .map_err(|e| StewardError::io(format!("Failed to write counter: {}", e)))?;
        // Only advance the in-memory counter once the number is durable, so
        // a failed write never burns a ticket number.
        *last_number = allocated;
        Ok(allocated)
    }
}
