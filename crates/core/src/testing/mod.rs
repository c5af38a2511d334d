//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits,
//! allowing full workflow testing without a real engine or broker.
//!
//! # Example
//!
//! ```rust,ignore
//! use ticketd_core::testing::{MockProcessEngine, RecordingPublisher};
//!
//! let engine = MockProcessEngine::new();
//! let publisher = RecordingPublisher::new();
//!
//! // Configure mock behavior
//! engine.push_task(/* external task */);
//! publisher.set_failing(true);
//!
//! // Use in a WorkflowCoordinator...
//! ```

mod mock_engine;
mod recording_publisher;

pub use mock_engine::{MockProcessEngine, RecordedStart};
pub use recording_publisher::RecordingPublisher;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::HashMap;

    use crate::engine::ExternalTask;
    use crate::ticket::CreateTicketRequest;

    /// Create a test ticket request with reasonable defaults.
    pub fn ticket_request(title: &str, requester: &str) -> CreateTicketRequest {
        CreateTicketRequest {
            title: title.to_string(),
            description: format!("{} (test ticket)", title),
            requester: requester.to_string(),
            assignee: None,
        }
    }

    /// Create an external task pointing at the ticket processing activity.
    pub fn processing_task(task_id: &str, ticket_id: &str) -> ExternalTask {
        ExternalTask {
            id: task_id.to_string(),
            process_instance_id: format!("proc-{}", task_id),
            activity_id: "ServiceTask_ProcessTicket".to_string(),
            topic_name: "ticket-processing".to_string(),
            business_key: Some(ticket_id.to_string()),
            variables: HashMap::new(),
        }
    }
}
