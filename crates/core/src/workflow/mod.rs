//! Workflow coordination between tickets, the process engine and events.

mod coordinator;

pub use coordinator::{WorkflowCoordinator, WorkflowError, ACTIVITY_PROCESS_TICKET};
