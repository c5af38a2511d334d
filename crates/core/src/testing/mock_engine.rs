//! Mock process engine for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::engine::{EngineError, ExternalTask, ProcessEngine, StartVariables};

/// A recorded process instance start for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedStart {
    pub process_key: String,
    pub business_key: String,
    pub variables: StartVariables,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the ProcessEngine trait.
///
/// Provides controllable behavior for testing:
/// - Track started instances and completed tasks for assertions
/// - Queue external tasks to be returned from fetch_and_lock
/// - Simulate failures
pub struct MockProcessEngine {
    /// Recorded start_instance calls.
    starts: Arc<RwLock<Vec<RecordedStart>>>,
    /// Deployment names recorded from deploy_definition calls.
    deployed: Arc<RwLock<Vec<String>>>,
    /// Tasks waiting to be handed out by fetch_and_lock.
    pending_tasks: Arc<RwLock<Vec<ExternalTask>>>,
    /// Ids of tasks reported complete.
    completed: Arc<RwLock<Vec<String>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<EngineError>>>,
    /// Counter for generating unique instance ids.
    instance_counter: Arc<RwLock<u32>>,
    /// Optional delay applied inside start_instance.
    start_delay: Arc<RwLock<Option<Duration>>>,
    /// start_instance calls currently in flight.
    starts_in_flight: Arc<AtomicU32>,
    /// Highest number of start_instance calls observed in flight at once.
    max_concurrent_starts: Arc<AtomicU32>,
}

impl Default for MockProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessEngine {
    /// Create a new mock process engine.
    pub fn new() -> Self {
        Self {
            starts: Arc::new(RwLock::new(Vec::new())),
            deployed: Arc::new(RwLock::new(Vec::new())),
            pending_tasks: Arc::new(RwLock::new(Vec::new())),
            completed: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            instance_counter: Arc::new(RwLock::new(0)),
            start_delay: Arc::new(RwLock::new(None)),
            starts_in_flight: Arc::new(AtomicU32::new(0)),
            max_concurrent_starts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Get all recorded start_instance calls.
    pub async fn started_instances(&self) -> Vec<RecordedStart> {
        self.starts.read().await.clone()
    }

    /// Get the names of deployed definitions.
    pub async fn deployed_definitions(&self) -> Vec<String> {
        self.deployed.read().await.clone()
    }

    /// Get the ids of tasks reported complete.
    pub async fn completed_tasks(&self) -> Vec<String> {
        self.completed.read().await.clone()
    }

    /// Queue a task to be returned by the next fetch_and_lock call.
    pub async fn push_task(&self, task: ExternalTask) {
        self.pending_tasks.write().await.push(task);
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: EngineError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every start_instance call take at least this long.
    pub async fn set_start_delay(&self, delay: Duration) {
        *self.start_delay.write().await = Some(delay);
    }

    /// Highest number of start_instance calls seen running at the same time.
    pub fn max_concurrent_starts(&self) -> u32 {
        self.max_concurrent_starts.load(Ordering::SeqCst)
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<EngineError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl ProcessEngine for MockProcessEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn deploy_definition(&self, name: &str, _bpmn_xml: &str) -> Result<(), EngineError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.deployed.write().await.push(name.to_string());
        Ok(())
    }

    async fn start_instance(
        &self,
        process_key: &str,
        business_key: &str,
        variables: StartVariables,
    ) -> Result<String, EngineError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let in_flight = self.starts_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_starts
            .fetch_max(in_flight, Ordering::SeqCst);

        let delay = *self.start_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.starts_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.starts.write().await.push(RecordedStart {
            process_key: process_key.to_string(),
            business_key: business_key.to_string(),
            variables,
            timestamp: Utc::now(),
        });

        let mut counter = self.instance_counter.write().await;
        *counter += 1;
        Ok(format!("mock-instance-{}", *counter))
    }

    async fn fetch_and_lock(
        &self,
        _worker_id: &str,
        topic: &str,
        _lock_duration_ms: u64,
    ) -> Result<Vec<ExternalTask>, EngineError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let mut pending = self.pending_tasks.write().await;
        let (matching, rest): (Vec<_>, Vec<_>) = pending
            .drain(..)
            .partition(|t| t.topic_name == topic);
        *pending = rest;

        Ok(matching)
    }

    async fn complete_task(&self, _worker_id: &str, task_id: &str) -> Result<(), EngineError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.completed.write().await.push(task_id.to_string());
        Ok(())
    }
}
