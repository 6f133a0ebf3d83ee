//! JSON file-backed staff statistics store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use steward_core::error::{Result as StewardResult, StewardError};
use steward_core::stats::{StaffStats, StatsRepository};
use tokio::fs;
use tokio::sync::Mutex;

/// File-backed implementation of [`StatsRepository`].
///
/// Counters are held in memory (keyed by staff id) and the whole map is
/// rewritten on every mutation, same discipline as the session store.
pub struct JsonStatsRepository {
    file_path: PathBuf,
    stats: Mutex<HashMap<String, StaffStats>>,
}

impl JsonStatsRepository {
    /// Opens (or initializes) the statistics store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or an
    /// existing file cannot be parsed.
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create stats directory")?;
        }
        let stats = if file_path.exists() {
            let json = std::fs::read_to_string(&file_path)
                .context(format!("Failed to read stats file: {:?}", file_path))?;
            if json.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&json).context("Failed to deserialize staff stats")?
            }
        } else {
            HashMap::new()
        };
        Ok(Self {
            file_path,
            stats: Mutex::new(stats),
        })
    }

    /// Opens the store at the default location
    /// (`~/.local/share/steward/staff-stats.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined or the
    /// existing file cannot be parsed.
    pub fn default_location() -> Result<Self> {
        let file_path = crate::paths::StewardPaths::staff_stats_file()
            .context("Failed to resolve data directory")?;
        Self::new(file_path)
    }

    async fn persist(&self, stats: &HashMap<String, StaffStats>) -> StewardResult<()> {
        let json = serde_json::to_string_pretty(stats)?;
        let temp_path = {
            let mut path = self.file_path.as_os_str().to_owned();
            path.push(".tmp");
            PathBuf::from(path)
        };
        fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|e| StewardError::io(format!("Failed to write stats: {}", e)))?;
        fs::rename(&temp_path, &self.file_path)
            .await
            .map_err(|e| StewardError::io(format!("Failed to replace stats: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl StatsRepository for JsonStatsRepository {
    async fn record_claim(&self, staff_id: &str, response_ms: i64) -> StewardResult<()> {
        let mut stats = self.stats.lock().await;
        let entry = stats.entry(staff_id.to_string()).or_default();
        entry.claimed += 1;
        entry.total_response_ms += response_ms;
        self.persist(&stats).await
    }

    async fn add_rating(&self, staff_id: &str, score: u8) -> StewardResult<()> {
        let mut stats = self.stats.lock().await;
        let entry = stats.entry(staff_id.to_string()).or_default();
        entry.rating_total += u64::from(score);
        entry.rating_count += 1;
        self.persist(&stats).await
    }

    async fn stats_for(&self, staff_id: &str) -> StewardResult<StaffStats> {
        let stats = self.stats.lock().await;
        Ok(stats.get(staff_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonStatsRepository::new(temp_dir.path().join("stats.json")).unwrap();

        repository.record_claim("staff-1", 60_000).await.unwrap();
        repository.record_claim("staff-1", 120_000).await.unwrap();
        repository.add_rating("staff-1", 5).await.unwrap();
        repository.add_rating("staff-1", 4).await.unwrap();

        let stats = repository.stats_for("staff-1").await.unwrap();
        assert_eq!(stats.claimed, 2);
        assert_eq!(stats.avg_response_ms(), 90_000);
        assert!((stats.avg_rating() - 4.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_unknown_staff_member_is_zeroed() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonStatsRepository::new(temp_dir.path().join("stats.json")).unwrap();
        let stats = repository.stats_for("nobody").await.unwrap();
        assert_eq!(stats, StaffStats::default());
    }

    #[tokio::test]
    async fn test_counters_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("stats.json");

        let repository = JsonStatsRepository::new(&file_path).unwrap();
        repository.record_claim("staff-1", 30_000).await.unwrap();
        drop(repository);

        let reopened = JsonStatsRepository::new(&file_path).unwrap();
        let stats = reopened.stats_for("staff-1").await.unwrap();
        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.total_response_ms, 30_000);
    }
}
