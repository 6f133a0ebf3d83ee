//! Engine configuration loading.

use std::path::Path;
use steward_core::config::StewardConfig;
use steward_core::error::{Result, StewardError};

/// Loads the engine configuration from a TOML file.
///
/// A missing or empty file yields the built-in defaults; a present but
/// unparseable file is an error (silently ignoring a typo'd config would be
/// worse than refusing to start).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: impl AsRef<Path>) -> Result<StewardConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!(
            target: "config",
            path = %path.display(),
            "No config file found, using defaults"
        );
        return Ok(StewardConfig::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        StewardError::config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    if content.trim().is_empty() {
        return Ok(StewardConfig::default());
    }
    Ok(toml::from_str(&content)?)
}

/// Loads the configuration from the default location
/// (`~/.config/steward/config.toml`).
///
/// # Errors
///
/// Returns an error if the config directory cannot be determined or the file
/// cannot be parsed.
pub fn load_default_config() -> Result<StewardConfig> {
    let path = crate::paths::StewardPaths::config_file()
        .map_err(|e| StewardError::config(e.to_string()))?;
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_config(temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config.ticket.max_open_tickets, 3);
    }

    #[test]
    fn test_loads_overrides_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[ticket]
max_open_tickets = 1
global_staff_roles = ["role-mod"]

[vote]
override_roles = ["role-manager"]
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.ticket.max_open_tickets, 1);
        assert_eq!(config.ticket.global_staff_roles, vec!["role-mod"]);
        assert_eq!(config.vote.override_roles, vec!["role-manager"]);
        // Untouched sections keep their defaults.
        assert_eq!(config.giveaway.minimum_duration_ms, 5_000);
    }

    #[test]
    fn test_unparseable_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "ticket = \"not a table\"").unwrap();
        assert!(load_config(&path).is_err());
    }
}
