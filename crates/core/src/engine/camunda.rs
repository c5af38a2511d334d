//! Camunda process engine implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{multipart, Client};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::EngineConfig;

use super::{EngineError, ExternalTask, ProcessEngine, StartVariables};

/// Maximum number of external tasks fetched per poll.
const MAX_TASKS: u32 = 5;

/// Camunda REST API client.
pub struct CamundaClient {
    client: Client,
    config: EngineConfig,
}

impl CamundaClient {
    /// Create a new Camunda client.
    pub fn new(config: EngineConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn map_send_error(e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::Unavailable("request timed out".to_string())
        } else {
            EngineError::Unavailable(e.to_string())
        }
    }

    /// POST a JSON body and return the raw response text.
    async fn post_json(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<String, EngineError> {
        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Rejected {
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| EngineError::Decode(e.to_string()))
    }

    /// Wrap plain values in Camunda's `{"value": ...}` envelope.
    fn wrap_variables(vars: &[(&str, serde_json::Value)]) -> serde_json::Value {
        let mut wrapped = serde_json::Map::new();
        for (name, value) in vars {
            wrapped.insert(name.to_string(), json!({ "value": value }));
        }
        serde_json::Value::Object(wrapped)
    }
}

/// Response from starting a process instance.
#[derive(Debug, Deserialize)]
struct StartInstanceResponse {
    id: String,
}

#[async_trait]
impl ProcessEngine for CamundaClient {
    fn name(&self) -> &str {
        "camunda"
    }

    async fn deploy_definition(&self, name: &str, bpmn_xml: &str) -> Result<(), EngineError> {
        let part = multipart::Part::text(bpmn_xml.to_string())
            .file_name(format!("{}.bpmn", name))
            .mime_str("application/octet-stream")
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        let form = multipart::Form::new().part("data", part);

        let url = format!("{}/deployment/create", self.base_url());
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(name, "Deployed process definition");
        Ok(())
    }

    async fn start_instance(
        &self,
        process_key: &str,
        business_key: &str,
        variables: StartVariables,
    ) -> Result<String, EngineError> {
        let body = json!({
            "variables": Self::wrap_variables(&[
                ("requester", json!(variables.requester)),
                ("title", json!(variables.title)),
            ]),
            "businessKey": business_key,
        });

        let endpoint = format!("/process-definition/key/{}/start", process_key);
        let text = self.post_json(&endpoint, &body).await?;

        let result: StartInstanceResponse =
            serde_json::from_str(&text).map_err(|e| EngineError::Decode(e.to_string()))?;

        debug!(
            process_key,
            business_key,
            instance_id = %result.id,
            "Started process instance"
        );
        Ok(result.id)
    }

    async fn fetch_and_lock(
        &self,
        worker_id: &str,
        topic: &str,
        lock_duration_ms: u64,
    ) -> Result<Vec<ExternalTask>, EngineError> {
        let body = json!({
            "workerId": worker_id,
            "maxTasks": MAX_TASKS,
            "usePriority": true,
            "topics": [{
                "topicName": topic,
                "lockDuration": lock_duration_ms,
            }],
        });

        let text = self.post_json("/external-task/fetchAndLock", &body).await?;

        serde_json::from_str(&text).map_err(|e| EngineError::Decode(e.to_string()))
    }

    async fn complete_task(&self, worker_id: &str, task_id: &str) -> Result<(), EngineError> {
        let body = json!({
            "workerId": worker_id,
            "variables": Self::wrap_variables(&[
                ("handledAt", json!(Utc::now().to_rfc3339())),
            ]),
        });

        let url = format!("{}/external-task/{}/complete", self.base_url(), task_id);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            // The engine reports a lost or expired lock as a client error
            // on the complete call.
            return Err(EngineError::TaskNotOwned(format!(
                "complete returned HTTP {} for task {}",
                status.as_u16(),
                task_id
            )));
        }

        Ok(())
    }
}
