//! Types for process engine operations.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when talking to the process engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine rejected request: HTTP {status}")]
    Rejected { status: u16 },

    #[error("Failed to decode engine response: {0}")]
    Decode(String),

    #[error("Task no longer owned by this worker: {0}")]
    TaskNotOwned(String),
}

/// Variables sent when starting a process instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartVariables {
    pub requester: String,
    pub title: String,
}

/// A single typed variable attached to an external task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskVariable {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub value: serde_json::Value,
}

/// An external task fetched and locked from the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalTask {
    pub id: String,
    pub process_instance_id: String,
    pub activity_id: String,
    pub topic_name: String,
    /// Business key of the owning process instance. For ticket processes
    /// this carries the ticket id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, TaskVariable>,
}

/// Trait for process engine backends.
#[async_trait]
pub trait ProcessEngine: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Deploy a BPMN process definition under the given deployment name.
    async fn deploy_definition(&self, name: &str, bpmn_xml: &str) -> Result<(), EngineError>;

    /// Start a process instance by definition key.
    /// Returns the id of the new process instance.
    async fn start_instance(
        &self,
        process_key: &str,
        business_key: &str,
        variables: StartVariables,
    ) -> Result<String, EngineError>;

    /// Fetch and lock pending external tasks for a topic.
    /// Returns an empty vec when no work is available.
    async fn fetch_and_lock(
        &self,
        worker_id: &str,
        topic: &str,
        lock_duration_ms: u64,
    ) -> Result<Vec<ExternalTask>, EngineError>;

    /// Report an external task as completed, releasing its lock.
    async fn complete_task(&self, worker_id: &str, task_id: &str) -> Result<(), EngineError>;
}
