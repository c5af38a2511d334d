//! External task polling worker.
//!
//! Polls the process engine for external tasks on a single topic and hands
//! them to the workflow coordinator. Tasks it handled successfully are
//! reported complete, releasing the engine-side lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::engine::{EngineError, ProcessEngine};
use crate::workflow::WorkflowCoordinator;

/// Polls external tasks and drives them through the coordinator.
pub struct TaskPoller {
    config: WorkerConfig,
    engine: Arc<dyn ProcessEngine>,
    coordinator: Arc<WorkflowCoordinator>,
    /// Randomly generated id distinguishing this worker's locks.
    worker_id: String,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl TaskPoller {
    /// Create a new poller with a random worker id.
    pub fn new(
        config: WorkerConfig,
        engine: Arc<dyn ProcessEngine>,
        coordinator: Arc<WorkflowCoordinator>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            engine,
            coordinator,
            worker_id: format!("ticketd-{}", uuid::Uuid::new_v4()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// The id this worker identifies itself with to the engine.
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Whether the polling loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the polling loop (spawns a background task).
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Task poller already running");
            return;
        }

        info!(
            worker_id = %self.worker_id,
            topic = %self.config.topic,
            "Starting task poller"
        );

        let running = Arc::clone(&self.running);
        let engine = Arc::clone(&self.engine);
        let coordinator = Arc::clone(&self.coordinator);
        let config = self.config.clone();
        let worker_id = self.worker_id.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Task polling loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Task polling loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        Self::poll_once(&engine, &coordinator, &config, &worker_id).await;
                    }
                }
            }
            info!("Task polling loop stopped");
        });
    }

    /// Stop the polling loop gracefully.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Task poller not running");
            return;
        }

        info!("Stopping task poller");
        let _ = self.shutdown_tx.send(());
    }

    /// Run a single poll cycle.
    ///
    /// Failures are isolated per task: one bad task neither blocks the
    /// others in the batch nor stops the loop. Tasks the coordinator
    /// rejects are left uncompleted, so the engine re-delivers them once
    /// their lock expires.
    pub async fn poll_once(
        engine: &Arc<dyn ProcessEngine>,
        coordinator: &Arc<WorkflowCoordinator>,
        config: &WorkerConfig,
        worker_id: &str,
    ) {
        let tasks = match engine
            .fetch_and_lock(worker_id, &config.topic, config.lock_duration_ms)
            .await
        {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "Failed to fetch external tasks");
                return;
            }
        };

        if tasks.is_empty() {
            return;
        }

        debug!(count = tasks.len(), "Fetched external tasks");

        for task in &tasks {
            if let Err(e) = coordinator.handle_external_task(task).await {
                warn!(task_id = %task.id, error = %e, "Failed to handle external task");
                continue;
            }

            match engine.complete_task(worker_id, &task.id).await {
                Ok(()) => {
                    debug!(task_id = %task.id, "Completed external task");
                }
                Err(EngineError::TaskNotOwned(reason)) => {
                    // Another worker got there first; the ticket state
                    // change was idempotent so nothing to undo.
                    warn!(task_id = %task.id, %reason, "Lost task lock before completion");
                }
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Failed to complete external task");
                }
            }
        }
    }
}
