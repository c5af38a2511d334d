//! Recording event publisher for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::events::{EventPublisher, PublishError, TicketEvent};

/// Publisher that records every event for test assertions.
///
/// Can be switched into a failing mode to verify that workflow operations
/// treat publishing as best effort.
pub struct RecordingPublisher {
    events: Arc<RwLock<Vec<TicketEvent>>>,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl Default for RecordingPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingPublisher {
    /// Create a new recording publisher.
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            failing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Get all published events.
    pub async fn published(&self) -> Vec<TicketEvent> {
        self.events.read().await.clone()
    }

    /// Get just the event names, in publish order.
    pub async fn event_names(&self) -> Vec<String> {
        self.events.read().await.iter().map(|e| e.event.clone()).collect()
    }

    /// Make every subsequent publish call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Whether close was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &TicketEvent) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::PublishFailed("recording publisher set to fail".to_string()));
        }

        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
