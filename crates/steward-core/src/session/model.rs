//! Session domain model.
//!
//! One `SessionRecord` represents a single ticket, giveaway, or vote: a
//! long-lived, persisted entity created at one point in time, mutated by
//! multiple independent actors, and moved to a terminal state exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The three concrete session variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum SessionKind {
    Ticket,
    Giveaway,
    Vote,
}

/// Monotonic session status. There is no transition out of `Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Claimed,
    Finalized,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}

/// Which path triggered a finalization. Logging/announcement flavor only;
/// all paths funnel through the same transition guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FinalizeTrigger {
    Deadline,
    Manual,
    Inactivity,
    Startup,
}

/// A yes/no ballot choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "lowercase")]
pub enum VoteDecision {
    Yes,
    No,
}

/// Ticket-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDetail {
    /// User the ticket belongs to.
    pub owner_id: String,
    /// Category chosen at creation.
    pub category_id: String,
    /// Sequential human-readable ticket number.
    pub number: u32,
    /// Staff member who claimed the ticket, if any.
    #[serde(default)]
    pub claimed_by: Option<String>,
    /// Staff roles snapshot copied from the category at creation time, so
    /// later category edits do not retroactively change access.
    #[serde(default)]
    pub staff_roles: Vec<String>,
    /// Latency from creation to claim, recorded for staff stats.
    #[serde(default)]
    pub claim_response_ms: Option<i64>,
    /// When the inactivity warning was posted. Cleared again if the ticket
    /// sees activity before the grace window ends.
    #[serde(default)]
    pub warned_at: Option<DateTime<Utc>>,
}

/// Giveaway-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiveawayDetail {
    pub prize: String,
    /// Actor who started the giveaway.
    pub host_id: String,
    /// Channel the announcement message lives in.
    pub channel_id: String,
    pub winner_count: usize,
    /// Role required to enter, if any.
    #[serde(default)]
    pub role_requirement: Option<String>,
    /// Entrant identifiers. Kept after finalization so rerolls draw from the
    /// original set.
    #[serde(default)]
    pub entrants: BTreeSet<String>,
    /// Winners drawn at finalization.
    #[serde(default)]
    pub last_winners: Vec<String>,
}

/// Terminal outcome of a vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    /// The vote ran its full duration.
    Decided,
    /// An override role ended the vote early.
    ForceStopped { stopped_by: String },
}

/// Vote-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteDetail {
    /// Actor the eligibility vote is about.
    pub target_id: String,
    /// Ballot message carrying the live tallies.
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub yes: BTreeSet<String>,
    #[serde(default)]
    pub no: BTreeSet<String>,
    /// Set exactly once, by the transition guard.
    #[serde(default)]
    pub outcome: Option<VoteOutcome>,
}

impl VoteDetail {
    /// Current (yes, no) tallies.
    pub fn tally(&self) -> (usize, usize) {
        (self.yes.len(), self.no.len())
    }
}

/// Kind-specific payload, tagged so the whole collection persists as one
/// flat record list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionDetail {
    Ticket(TicketDetail),
    Giveaway(GiveawayDetail),
    Vote(VoteDetail),
}

/// One persisted session.
///
/// `id` is the external attachment point (channel or message identifier),
/// assigned at creation and immutable. `deadline_at` is always an absolute
/// timestamp — never a remaining duration — so restart recovery can re-derive
/// the remaining delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Absolute auto-finalize deadline; `None` for sessions with no natural
    /// expiry (tickets close by action or inactivity only).
    #[serde(default)]
    pub deadline_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    /// Updated on every participant mutation; drives inactivity sweeps.
    pub last_activity_at: DateTime<Utc>,
    #[serde(flatten)]
    pub detail: SessionDetail,
}

impl SessionRecord {
    /// Creates an open ticket session attached to `channel_id`.
    pub fn ticket(
        channel_id: impl Into<String>,
        detail: TicketDetail,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: channel_id.into(),
            created_at: now,
            deadline_at: None,
            status: SessionStatus::Open,
            last_activity_at: now,
            detail: SessionDetail::Ticket(detail),
        }
    }

    /// Creates an open giveaway session attached to its announcement message.
    pub fn giveaway(
        message_id: impl Into<String>,
        detail: GiveawayDetail,
        deadline_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: message_id.into(),
            created_at: now,
            deadline_at: Some(deadline_at),
            status: SessionStatus::Open,
            last_activity_at: now,
            detail: SessionDetail::Giveaway(detail),
        }
    }

    /// Creates an open vote session attached to its channel.
    pub fn vote(
        channel_id: impl Into<String>,
        detail: VoteDetail,
        deadline_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: channel_id.into(),
            created_at: now,
            deadline_at: Some(deadline_at),
            status: SessionStatus::Open,
            last_activity_at: now,
            detail: SessionDetail::Vote(detail),
        }
    }

    pub fn kind(&self) -> SessionKind {
        match &self.detail {
            SessionDetail::Ticket(_) => SessionKind::Ticket,
            SessionDetail::Giveaway(_) => SessionKind::Giveaway,
            SessionDetail::Vote(_) => SessionKind::Vote,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    /// Records participant activity.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    pub fn as_ticket(&self) -> Option<&TicketDetail> {
        match &self.detail {
            SessionDetail::Ticket(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_ticket_mut(&mut self) -> Option<&mut TicketDetail> {
        match &mut self.detail {
            SessionDetail::Ticket(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_giveaway(&self) -> Option<&GiveawayDetail> {
        match &self.detail {
            SessionDetail::Giveaway(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_giveaway_mut(&mut self) -> Option<&mut GiveawayDetail> {
        match &mut self.detail {
            SessionDetail::Giveaway(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_vote(&self) -> Option<&VoteDetail> {
        match &self.detail {
            SessionDetail::Vote(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vote_mut(&mut self) -> Option<&mut VoteDetail> {
        match &mut self.detail {
            SessionDetail::Vote(v) => Some(v),
            _ => None,
        }
    }
}
