//! End-to-end workflow tests against mock engine and broker.

use std::sync::Arc;

use ticketd_core::config::WorkerConfig;
use ticketd_core::engine::ProcessEngine;
use ticketd_core::testing::fixtures::{processing_task, ticket_request};
use ticketd_core::testing::{MockProcessEngine, RecordingPublisher};
use ticketd_core::ticket::{SqliteTicketStore, TicketError, TicketStatus, TicketStore};
use ticketd_core::worker::TaskPoller;
use ticketd_core::workflow::{WorkflowCoordinator, WorkflowError};

struct World {
    store: Arc<SqliteTicketStore>,
    engine: Arc<MockProcessEngine>,
    publisher: Arc<RecordingPublisher>,
    coordinator: Arc<WorkflowCoordinator>,
}

fn world() -> World {
    let store = Arc::new(SqliteTicketStore::in_memory().unwrap());
    let engine = Arc::new(MockProcessEngine::new());
    let publisher = Arc::new(RecordingPublisher::new());

    let coordinator = Arc::new(WorkflowCoordinator::new(
        store.clone(),
        engine.clone(),
        publisher.clone(),
        "ticket_approval",
    ));

    World {
        store,
        engine,
        publisher,
        coordinator,
    }
}

#[tokio::test]
async fn full_lifecycle_through_approval() {
    let w = world();

    // Create: draft, no process instance
    let ticket = w
        .coordinator
        .create_ticket(ticket_request("New laptop", "alice"))
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Draft);
    assert!(ticket.process_instance_id.is_none());

    // Submit: workflow starts, instance id recorded
    let submitted = w.coordinator.submit_ticket(&ticket.id).await.unwrap();
    assert_eq!(submitted.status, TicketStatus::Submitted);
    assert!(submitted.process_instance_id.is_some());

    // Worker picks up the processing step
    w.engine.push_task(processing_task("task-1", &ticket.id)).await;
    let engine: Arc<dyn ProcessEngine> = w.engine.clone();
    TaskPoller::poll_once(&engine, &w.coordinator, &WorkerConfig::default(), "worker-1").await;

    let processing = w.store.get(&ticket.id).unwrap().unwrap();
    assert_eq!(processing.status, TicketStatus::Processing);
    assert_eq!(w.engine.completed_tasks().await, vec!["task-1".to_string()]);

    // Manager approves
    let approved = w
        .coordinator
        .record_decision(&ticket.id, true, Some("within budget".to_string()))
        .await
        .unwrap();
    assert_eq!(approved.status, TicketStatus::Approved);

    // Processing wrap-up reports completion
    let completed = w.coordinator.complete_processing(&ticket.id).await.unwrap();
    assert_eq!(completed.status, TicketStatus::Completed);

    // Events in lifecycle order
    assert_eq!(
        w.publisher.event_names().await,
        vec![
            "ticket.created",
            "ticket.submitted",
            "ticket.processing",
            "ticket.decision",
            "ticket.completed",
        ]
    );
}

#[tokio::test]
async fn rejection_allows_resubmission_with_new_instance() {
    let w = world();
    let ticket = w
        .coordinator
        .create_ticket(ticket_request("Standing desk", "bob"))
        .await
        .unwrap();

    let first = w.coordinator.submit_ticket(&ticket.id).await.unwrap();
    w.coordinator
        .record_decision(&ticket.id, false, Some("no budget this quarter".to_string()))
        .await
        .unwrap();

    let second = w.coordinator.submit_ticket(&ticket.id).await.unwrap();

    assert_eq!(second.status, TicketStatus::Submitted);
    assert_ne!(first.process_instance_id, second.process_instance_id);
    assert_eq!(w.engine.started_instances().await.len(), 2);
}

#[tokio::test]
async fn concurrent_submissions_start_exactly_one_instance() {
    let w = world();
    let ticket = w
        .coordinator
        .create_ticket(ticket_request("New laptop", "alice"))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        w.coordinator.submit_ticket(&ticket.id),
        w.coordinator.submit_ticket(&ticket.id),
    );

    let oks = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(oks, 1, "exactly one submission should win");

    let loser = if a.is_err() { a } else { b };
    assert!(matches!(
        loser,
        Err(WorkflowError::Ticket(TicketError::InvalidTransition { .. }))
    ));

    // Only the winner reached the engine
    assert_eq!(w.engine.started_instances().await.len(), 1);

    let stored = w.store.get(&ticket.id).unwrap().unwrap();
    assert_eq!(stored.status, TicketStatus::Submitted);
    assert_eq!(stored.process_instance_id.as_deref(), Some("mock-instance-1"));
}

#[tokio::test]
async fn terminal_tickets_reject_further_transitions() {
    let w = world();
    let ticket = w
        .coordinator
        .create_ticket(ticket_request("New laptop", "alice"))
        .await
        .unwrap();
    w.coordinator.submit_ticket(&ticket.id).await.unwrap();
    w.coordinator
        .record_decision(&ticket.id, true, None)
        .await
        .unwrap();

    // Approved tickets cannot be submitted or decided again
    let resubmit = w.coordinator.submit_ticket(&ticket.id).await;
    assert!(matches!(
        resubmit,
        Err(WorkflowError::Ticket(TicketError::InvalidTransition { .. }))
    ));

    let redecide = w.coordinator.record_decision(&ticket.id, false, None).await;
    assert!(matches!(
        redecide,
        Err(WorkflowError::Ticket(TicketError::InvalidTransition { .. }))
    ));
}

#[tokio::test]
async fn broker_outage_never_blocks_the_workflow() {
    let w = world();
    w.publisher.set_failing(true);

    let ticket = w
        .coordinator
        .create_ticket(ticket_request("New laptop", "alice"))
        .await
        .unwrap();
    w.coordinator.submit_ticket(&ticket.id).await.unwrap();
    w.engine.push_task(processing_task("task-1", &ticket.id)).await;
    let engine: Arc<dyn ProcessEngine> = w.engine.clone();
    TaskPoller::poll_once(&engine, &w.coordinator, &WorkerConfig::default(), "worker-1").await;
    w.coordinator
        .record_decision(&ticket.id, true, None)
        .await
        .unwrap();
    let completed = w.coordinator.complete_processing(&ticket.id).await.unwrap();

    assert_eq!(completed.status, TicketStatus::Completed);
    assert!(w.publisher.published().await.is_empty());
}

#[tokio::test]
async fn redelivered_task_is_handled_idempotently() {
    let w = world();
    let ticket = w
        .coordinator
        .create_ticket(ticket_request("New laptop", "alice"))
        .await
        .unwrap();
    w.coordinator.submit_ticket(&ticket.id).await.unwrap();

    let engine: Arc<dyn ProcessEngine> = w.engine.clone();
    let config = WorkerConfig::default();

    // The engine re-delivers the task, e.g. after a lost completion
    w.engine.push_task(processing_task("task-1", &ticket.id)).await;
    TaskPoller::poll_once(&engine, &w.coordinator, &config, "worker-1").await;
    w.engine.push_task(processing_task("task-1", &ticket.id)).await;
    TaskPoller::poll_once(&engine, &w.coordinator, &config, "worker-1").await;

    let stored = w.store.get(&ticket.id).unwrap().unwrap();
    assert_eq!(stored.status, TicketStatus::Processing);
    // Both deliveries were acknowledged
    assert_eq!(w.engine.completed_tasks().await.len(), 2);
}

#[tokio::test]
async fn listing_reports_most_recent_first() {
    let w = world();

    let mut ids = Vec::new();
    for i in 0..3 {
        let ticket = w
            .coordinator
            .create_ticket(ticket_request(&format!("ticket-{}", i), "alice"))
            .await
            .unwrap();
        ids.push(ticket.id);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let listed = w.store.list(0).unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].id, ids[2]);
}
