//! Common test utilities for E2E testing with mocks.
//!
//! Builds an in-process router with mock dependencies injected so the
//! full HTTP surface can be exercised without a process engine or a
//! message broker.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use ticketd_core::{
    testing::{MockProcessEngine, RecordingPublisher},
    Config, DatabaseConfig, EngineConfig, EventPublisher, ProcessEngine, ServerConfig,
    SqliteTicketStore, TicketStore, WorkerConfig, WorkflowCoordinator,
};

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use ticketd_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with controllable mocks for the
/// process engine and the event publisher.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock process engine - inspect started instances, queue tasks
    pub engine: Arc<MockProcessEngine>,
    /// Recording publisher - inspect published events
    pub publisher: Arc<RecordingPublisher>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let engine = Arc::new(MockProcessEngine::new());
        let publisher = Arc::new(RecordingPublisher::new());

        let config = Config {
            engine: EngineConfig {
                url: "http://mock-engine:8080/engine-rest".to_string(),
                process_key: "ticket_approval".to_string(),
                definition_path: None,
                timeout_secs: 15,
            },
            server: ServerConfig {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            events: None,
            worker: WorkerConfig {
                enabled: false,
                ..Default::default()
            },
        };

        let ticket_store: Arc<dyn TicketStore> = Arc::new(
            SqliteTicketStore::new(&db_path).expect("Failed to create ticket store"),
        );

        let coordinator = Arc::new(WorkflowCoordinator::new(
            Arc::clone(&ticket_store),
            Arc::clone(&engine) as Arc<dyn ProcessEngine>,
            Arc::clone(&publisher) as Arc<dyn EventPublisher>,
            config.engine.process_key.clone(),
        ));

        let state = Arc::new(ticketd_server::state::AppState::new(
            config,
            ticket_store,
            coordinator,
        ));

        let router = ticketd_server::api::create_router(state);

        Self {
            router,
            engine,
            publisher,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    #[allow(dead_code)]
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
