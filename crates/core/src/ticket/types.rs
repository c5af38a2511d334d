//! Core ticket data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Life-cycle status of a ticket.
///
/// State machine flow:
/// ```text
/// Draft -> Submitted -> Approved | Rejected
///
/// Submitted | Processing -> Processing -> Completed
///
/// Rejected -> Submitted (resubmission)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Ticket created, not yet handed to the workflow engine.
    Draft,
    /// A process instance has been started for this ticket.
    Submitted,
    /// Approved by a decision maker.
    Approved,
    /// Rejected by a decision maker. Can be resubmitted.
    Rejected,
    /// An external worker is processing the ticket.
    Processing,
    /// Terminal state.
    Completed,
}

impl TicketStatus {
    /// Returns the status as the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Draft => "draft",
            TicketStatus::Submitted => "submitted",
            TicketStatus::Approved => "approved",
            TicketStatus::Rejected => "rejected",
            TicketStatus::Processing => "processing",
            TicketStatus::Completed => "completed",
        }
    }

    /// Parse a status from its database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(TicketStatus::Draft),
            "submitted" => Some(TicketStatus::Submitted),
            "approved" => Some(TicketStatus::Approved),
            "rejected" => Some(TicketStatus::Rejected),
            "processing" => Some(TicketStatus::Processing),
            "completed" => Some(TicketStatus::Completed),
            _ => None,
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Completed)
    }

    /// Returns true if the ticket can be (re)submitted from this status.
    pub fn can_submit(&self) -> bool {
        matches!(self, TicketStatus::Draft | TicketStatus::Rejected)
    }

    /// Returns true if the ticket is awaiting a decision.
    pub fn awaits_decision(&self) -> bool {
        matches!(self, TicketStatus::Submitted | TicketStatus::Processing)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ticket mirrored between the local store and the workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Unique identifier (UUID).
    pub id: String,

    /// Short summary of the request.
    pub title: String,

    /// Free-form description.
    pub description: String,

    /// Who raised the ticket.
    pub requester: String,

    /// Who the ticket is assigned to, if anyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Current life-cycle status.
    pub status: TicketStatus,

    /// Process instance started in the engine for the current submission
    /// cycle. Empty until the ticket is first submitted; replaced on
    /// resubmission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_instance_id: Option<String>,

    /// When the ticket was created.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp, refreshed on every persisted mutation.
    pub updated_at: DateTime<Utc>,
}
