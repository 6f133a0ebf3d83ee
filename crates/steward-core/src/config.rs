//! Configuration types for the session engine.
//!
//! All durations are stored as plain integers (seconds or milliseconds) so the
//! config file stays hand-editable; accessor methods convert to
//! `chrono::Duration` for the engine.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// One selectable support-ticket category.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TicketCategory {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    /// Staff roles granted access to tickets of this category. Copied onto the
    /// ticket record at creation time, so later edits here do not change
    /// access to already-open tickets.
    #[serde(default)]
    pub staff_roles: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TicketConfig {
    #[serde(default)]
    pub categories: Vec<TicketCategory>,
    /// Roles with access to every ticket regardless of category.
    #[serde(default)]
    pub global_staff_roles: Vec<String>,
    /// Maximum simultaneously open tickets per user.
    #[serde(default = "default_max_open_tickets")]
    pub max_open_tickets: usize,
    /// Idle time before a ticket receives an inactivity warning.
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
    /// Grace window between the warning and the automatic close.
    #[serde(default = "default_warning_grace_secs")]
    pub warning_grace_secs: u64,
    /// How often the inactivity sweeper runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Delay between announcing a close and deleting the backing channel.
    #[serde(default = "default_close_delete_delay_secs")]
    pub close_delete_delay_secs: u64,
    /// Channel receiving close notices and transcripts, if configured.
    #[serde(default)]
    pub log_channel_id: Option<String>,
}

impl TicketConfig {
    /// Looks up a category by its identifier.
    pub fn category(&self, id: &str) -> Option<&TicketCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::seconds(self.inactivity_timeout_secs as i64)
    }

    pub fn warning_grace(&self) -> Duration {
        Duration::seconds(self.warning_grace_secs as i64)
    }
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            global_staff_roles: Vec::new(),
            max_open_tickets: default_max_open_tickets(),
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            warning_grace_secs: default_warning_grace_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            close_delete_delay_secs: default_close_delete_delay_secs(),
            log_channel_id: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GiveawayConfig {
    /// Floor below which a requested giveaway duration is rejected.
    #[serde(default = "default_minimum_duration_ms")]
    pub minimum_duration_ms: i64,
}

impl Default for GiveawayConfig {
    fn default() -> Self {
        Self {
            minimum_duration_ms: default_minimum_duration_ms(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct VoteConfig {
    /// Vote lifetime when the caller does not specify one.
    #[serde(default = "default_vote_duration_ms")]
    pub default_duration_ms: i64,
    /// Roles allowed to force-stop a running vote.
    #[serde(default)]
    pub override_roles: Vec<String>,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_vote_duration_ms(),
            override_roles: Vec::new(),
        }
    }
}

/// Root configuration for the session engine.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct StewardConfig {
    #[serde(default)]
    pub ticket: TicketConfig,
    #[serde(default)]
    pub giveaway: GiveawayConfig,
    #[serde(default)]
    pub vote: VoteConfig,
}

fn default_max_open_tickets() -> usize {
    3
}

fn default_inactivity_timeout_secs() -> u64 {
    48 * 60 * 60
}

fn default_warning_grace_secs() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

fn default_close_delete_delay_secs() -> u64 {
    5
}

fn default_minimum_duration_ms() -> i64 {
    5_000
}

fn default_vote_duration_ms() -> i64 {
    7 * 24 * 60 * 60 * 1_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StewardConfig::default();
        assert_eq!(config.ticket.max_open_tickets, 3);
        assert_eq!(config.ticket.inactivity_timeout_secs, 172_800);
        assert_eq!(config.ticket.warning_grace_secs, 86_400);
        assert_eq!(config.giveaway.minimum_duration_ms, 5_000);
        assert_eq!(config.vote.default_duration_ms, 604_800_000);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let toml_src = r#"
[ticket]
max_open_tickets = 5

[[ticket.categories]]
id = "appeals"
label = "Appeals"
staff_roles = ["role-a"]
"#;
        let config: StewardConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.ticket.max_open_tickets, 5);
        assert_eq!(config.ticket.inactivity_timeout_secs, 172_800);
        assert_eq!(config.ticket.category("appeals").unwrap().label, "Appeals");
        assert!(config.ticket.category("unknown").is_none());
        assert_eq!(config.giveaway.minimum_duration_ms, 5_000);
    }
}
