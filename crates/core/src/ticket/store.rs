//! Ticket storage trait and types.

use thiserror::Error;

use crate::ticket::{Ticket, TicketStatus};

/// Error type for ticket operations.
#[derive(Debug, Error)]
pub enum TicketError {
    /// Ticket not found.
    #[error("ticket not found: {0}")]
    NotFound(String),

    /// The ticket's current status does not allow the requested transition.
    #[error("cannot {operation} ticket {ticket_id}: current status is {status}")]
    InvalidTransition {
        ticket_id: String,
        status: TicketStatus,
        operation: String,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Request to create a new ticket.
#[derive(Debug, Clone)]
pub struct CreateTicketRequest {
    /// Short summary of the request.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Who raised the ticket.
    pub requester: String,
    /// Optional assignee.
    pub assignee: Option<String>,
}

/// Trait for ticket storage backends.
///
/// The store owns persisted ticket rows; status mutations go through the
/// compare-and-set [`transition`](TicketStore::transition) so a concurrent
/// writer cannot silently overwrite a status it never observed.
pub trait TicketStore: Send + Sync {
    /// Create a new ticket in `Draft`.
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: &str) -> Result<Option<Ticket>, TicketError>;

    /// List tickets ordered by creation time, most recent first.
    /// A non-positive limit defaults to 50.
    fn list(&self, limit: i64) -> Result<Vec<Ticket>, TicketError>;

    /// Atomically move a ticket from one of `allowed_from` to `to`,
    /// optionally recording a new process instance reference.
    ///
    /// Fails with [`TicketError::InvalidTransition`] naming the current
    /// status when it is not in `allowed_from`. The first committer wins;
    /// a racing caller observes the already-changed status.
    fn transition(
        &self,
        id: &str,
        allowed_from: &[TicketStatus],
        to: TicketStatus,
        process_instance_id: Option<&str>,
    ) -> Result<Ticket, TicketError>;

    /// Unconditionally set a ticket's status, refreshing `updated_at`.
    fn set_status(&self, id: &str, to: TicketStatus) -> Result<Ticket, TicketError>;
}
