//! Unified path management for steward files.
//!
//! Configuration lives under the platform config directory, persisted
//! session state under the platform data directory.

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for steward.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/steward/           # Config directory
/// └── config.toml              # Engine configuration
///
/// ~/.local/share/steward/      # Data directory
/// ├── sessions.json            # Persisted session collection
/// ├── ticket-sequence.json     # Monotonic ticket number counter
/// └── staff-stats.json         # Staff performance counters
/// ```
pub struct StewardPaths;

impl StewardPaths {
    /// Returns the steward configuration directory.
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join("steward"))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the steward data directory.
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join("steward"))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the path to the persisted session collection.
    pub fn sessions_file() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("sessions.json"))
    }

    /// Returns the path to the ticket number counter.
    pub fn ticket_sequence_file() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("ticket-sequence.json"))
    }

    /// Returns the path to the staff statistics store.
    pub fn staff_stats_file() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("staff-stats.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_is_under_config_dir() {
        let config_file = StewardPaths::config_file().unwrap();
        assert!(config_file.ends_with("config.toml"));
        assert!(config_file.starts_with(StewardPaths::config_dir().unwrap()));
    }

    #[test]
    fn test_data_files_are_under_data_dir() {
        let data_dir = StewardPaths::data_dir().unwrap();
        assert!(data_dir.ends_with("steward"));
        for file in [
            StewardPaths::sessions_file().unwrap(),
            StewardPaths::ticket_sequence_file().unwrap(),
            StewardPaths::staff_stats_file().unwrap(),
        ] {
            assert!(file.starts_with(&data_dir));
        }
    }
}
