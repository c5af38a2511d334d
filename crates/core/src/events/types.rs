//! Types for ticket event publishing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ticket::Ticket;

/// Event emitted when a ticket is created in draft.
pub const EVENT_TICKET_CREATED: &str = "ticket.created";
/// Event emitted when a ticket enters the workflow.
pub const EVENT_TICKET_SUBMITTED: &str = "ticket.submitted";
/// Event emitted when a decision is recorded.
pub const EVENT_TICKET_DECISION: &str = "ticket.decision";
/// Event emitted when asynchronous processing begins.
pub const EVENT_TICKET_PROCESSING: &str = "ticket.processing";
/// Event emitted when processing finishes.
pub const EVENT_TICKET_COMPLETED: &str = "ticket.completed";

/// Errors that can occur while publishing events.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error("Failed to serialize event: {0}")]
    Serialization(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),
}

/// A ticket lifecycle event.
///
/// The event name doubles as the routing key on topic exchanges, so
/// consumers can bind with patterns like `ticket.*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketEvent {
    pub event: String,
    pub ticket_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
    pub title: String,
    pub requester: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TicketEvent {
    /// Build an event snapshot from a ticket's current state.
    pub fn new(event: &str, ticket: &Ticket) -> Self {
        Self {
            event: event.to_string(),
            ticket_id: ticket.id.clone(),
            status: ticket.status.as_str().to_string(),
            process_id: ticket.process_instance_id.clone(),
            title: ticket.title.clone(),
            requester: ticket.requester.clone(),
            assignee: ticket.assignee.clone(),
            comment: None,
            occurred_at: Utc::now(),
        }
    }

    /// Attach a decision comment to the event.
    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }
}

/// Trait for event publishing backends.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event. The routing key is the event name.
    async fn publish(&self, event: &TicketEvent) -> Result<(), PublishError>;

    /// Release broker resources. Safe to call more than once.
    async fn close(&self);
}

/// Publisher that discards all events.
///
/// Used when no broker is configured or the broker is unreachable at
/// startup, so the rest of the service keeps working.
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: &TicketEvent) -> Result<(), PublishError> {
        Ok(())
    }

    async fn close(&self) {}
}
