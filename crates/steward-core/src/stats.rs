//! Staff performance statistics.
//!
//! Claiming a ticket records the claimant and how long the ticket waited for
//! a first response; community ratings accumulate per staff member. Recording
//! is best-effort from the caller's perspective and never blocks a claim.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Accumulated counters for one staff member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffStats {
    /// Tickets claimed.
    #[serde(default)]
    pub claimed: u64,
    /// Sum of response latencies over all claims, in milliseconds.
    #[serde(default)]
    pub total_response_ms: i64,
    /// Sum of rating scores received.
    #[serde(default)]
    pub rating_total: u64,
    /// Number of ratings received.
    #[serde(default)]
    pub rating_count: u64,
}

impl StaffStats {
    /// Average time from ticket creation to claim, in milliseconds.
    pub fn avg_response_ms(&self) -> i64 {
        if self.claimed == 0 {
            0
        } else {
            self.total_response_ms / self.claimed as i64
        }
    }

    /// Average rating score, or 0.0 with no ratings.
    pub fn avg_rating(&self) -> f64 {
        if self.rating_count == 0 {
            0.0
        } else {
            self.rating_total as f64 / self.rating_count as f64
        }
    }
}

/// Persistence port for staff statistics.
#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Records one claim with its response latency.
    async fn record_claim(&self, staff_id: &str, response_ms: i64) -> Result<()>;

    /// Adds one rating score for a staff member.
    async fn add_rating(&self, staff_id: &str, score: u8) -> Result<()>;

    /// Returns accumulated stats for a staff member (zeroed if unknown).
    async fn stats_for(&self, staff_id: &str) -> Result<StaffStats>;
}
