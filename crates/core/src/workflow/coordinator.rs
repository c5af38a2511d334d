//! Workflow coordinator bridging the ticket store, the process engine and
//! the event publisher.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::engine::{EngineError, ExternalTask, ProcessEngine, StartVariables};
use crate::events::{
    EventPublisher, TicketEvent, EVENT_TICKET_COMPLETED, EVENT_TICKET_CREATED,
    EVENT_TICKET_DECISION, EVENT_TICKET_PROCESSING, EVENT_TICKET_SUBMITTED,
};
use crate::ticket::{CreateTicketRequest, Ticket, TicketError, TicketStatus, TicketStore};

/// Activity id of the asynchronous processing step in the ticket process.
pub const ACTIVITY_PROCESS_TICKET: &str = "ServiceTask_ProcessTicket";

/// Errors from workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Malformed external task: {0}")]
    MalformedTask(String),

    #[error("Unsupported activity: {0}")]
    UnsupportedActivity(String),
}

/// Coordinates ticket state changes with the process engine.
///
/// All status mutations go through the store's compare-and-set
/// [`transition`](TicketStore::transition), so concurrent callers racing on
/// the same ticket see `InvalidTransition` instead of silently clobbering
/// each other.
pub struct WorkflowCoordinator {
    store: Arc<dyn TicketStore>,
    engine: Arc<dyn ProcessEngine>,
    publisher: Arc<dyn EventPublisher>,
    process_key: String,
    /// Per-ticket guards serializing submissions of the same ticket, so a
    /// ticket never starts two process instances even when the engine call
    /// is slow. Different tickets submit concurrently.
    submit_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl WorkflowCoordinator {
    /// Create a new coordinator.
    pub fn new(
        store: Arc<dyn TicketStore>,
        engine: Arc<dyn ProcessEngine>,
        publisher: Arc<dyn EventPublisher>,
        process_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            engine,
            publisher,
            process_key: process_key.into(),
            submit_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get (or create) the submit guard for a ticket.
    async fn submit_guard(&self, ticket_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.submit_locks.lock().await;
        Arc::clone(locks.entry(ticket_id.to_string()).or_default())
    }

    /// Drop a ticket's submit guard once nobody is waiting on it.
    async fn release_submit_guard(&self, ticket_id: &str) {
        let mut locks = self.submit_locks.lock().await;
        if let Some(entry) = locks.get(ticket_id) {
            // A waiter still holds a clone while the count is above one
            if Arc::strong_count(entry) == 1 {
                locks.remove(ticket_id);
            }
        }
    }

    /// Create a ticket in draft status.
    pub async fn create_ticket(
        &self,
        request: CreateTicketRequest,
    ) -> Result<Ticket, WorkflowError> {
        let ticket = self.store.create(request)?;
        info!(ticket_id = %ticket.id, "Created ticket");

        self.emit(TicketEvent::new(EVENT_TICKET_CREATED, &ticket)).await;
        Ok(ticket)
    }

    /// Submit a ticket into the workflow, starting a process instance.
    ///
    /// Only draft and rejected tickets are eligible. The ticket only leaves
    /// its current status once the engine has accepted the instance, so an
    /// engine failure leaves it resubmittable.
    pub async fn submit_ticket(&self, ticket_id: &str) -> Result<Ticket, WorkflowError> {
        let guard = self.submit_guard(ticket_id).await;
        let locked = guard.lock().await;

        let result = self.submit_locked(ticket_id).await;

        drop(locked);
        drop(guard);
        self.release_submit_guard(ticket_id).await;
        result
    }

    async fn submit_locked(&self, ticket_id: &str) -> Result<Ticket, WorkflowError> {
        let ticket = self
            .store
            .get(ticket_id)?
            .ok_or_else(|| TicketError::NotFound(ticket_id.to_string()))?;

        if !ticket.status.can_submit() {
            return Err(TicketError::InvalidTransition {
                ticket_id: ticket_id.to_string(),
                status: ticket.status,
                operation: "submit".to_string(),
            }
            .into());
        }

        let instance_id = self
            .engine
            .start_instance(
                &self.process_key,
                &ticket.id,
                StartVariables {
                    requester: ticket.requester.clone(),
                    title: ticket.title.clone(),
                },
            )
            .await?;

        let ticket = self.store.transition(
            ticket_id,
            &[TicketStatus::Draft, TicketStatus::Rejected],
            TicketStatus::Submitted,
            Some(&instance_id),
        )?;

        info!(
            ticket_id = %ticket.id,
            instance_id = %instance_id,
            "Submitted ticket to workflow"
        );

        self.emit(TicketEvent::new(EVENT_TICKET_SUBMITTED, &ticket)).await;
        Ok(ticket)
    }

    /// Record an approval or rejection for a ticket awaiting decision.
    pub async fn record_decision(
        &self,
        ticket_id: &str,
        approved: bool,
        comment: Option<String>,
    ) -> Result<Ticket, WorkflowError> {
        let target = if approved {
            TicketStatus::Approved
        } else {
            TicketStatus::Rejected
        };

        let ticket = self.store.transition(
            ticket_id,
            &[TicketStatus::Submitted, TicketStatus::Processing],
            target,
            None,
        )?;

        info!(ticket_id = %ticket.id, decision = %target, "Recorded decision");

        self.emit(TicketEvent::new(EVENT_TICKET_DECISION, &ticket).with_comment(comment))
            .await;
        Ok(ticket)
    }

    /// Mark a ticket as completed after asynchronous processing finishes.
    ///
    /// Applied unconditionally: completion reports arrive from the engine
    /// after the fact and are not subject to the decision state machine.
    pub async fn complete_processing(&self, ticket_id: &str) -> Result<Ticket, WorkflowError> {
        let ticket = self.store.set_status(ticket_id, TicketStatus::Completed)?;

        info!(ticket_id = %ticket.id, "Completed ticket processing");

        self.emit(TicketEvent::new(EVENT_TICKET_COMPLETED, &ticket)).await;
        Ok(ticket)
    }

    /// Handle an external task fetched by the polling worker.
    ///
    /// The task's business key carries the ticket id. Re-delivery of a task
    /// already in processing is accepted, so the worker can safely complete
    /// tasks it has seen before.
    pub async fn handle_external_task(&self, task: &ExternalTask) -> Result<(), WorkflowError> {
        match task.activity_id.as_str() {
            ACTIVITY_PROCESS_TICKET => {
                let business_key = task
                    .business_key
                    .as_deref()
                    .ok_or_else(|| {
                        WorkflowError::MalformedTask(format!(
                            "task {} has no business key",
                            task.id
                        ))
                    })?;

                let ticket_id = uuid::Uuid::parse_str(business_key)
                    .map_err(|e| {
                        WorkflowError::MalformedTask(format!(
                            "business key {:?} is not a ticket id: {}",
                            business_key, e
                        ))
                    })?
                    .to_string();

                let ticket = self.store.transition(
                    &ticket_id,
                    &[TicketStatus::Submitted, TicketStatus::Processing],
                    TicketStatus::Processing,
                    None,
                )?;

                info!(ticket_id = %ticket.id, task_id = %task.id, "Ticket processing started");

                self.emit(TicketEvent::new(EVENT_TICKET_PROCESSING, &ticket)).await;
                Ok(())
            }
            other => Err(WorkflowError::UnsupportedActivity(other.to_string())),
        }
    }

    /// Publish an event, logging failures instead of propagating them.
    async fn emit(&self, event: TicketEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(event = %event.event, ticket_id = %event.ticket_id, error = %e, "Failed to publish event");
        }
    }
}
