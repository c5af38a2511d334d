use std::sync::Arc;
use ticketd_core::{Config, SanitizedConfig, TicketStore, WorkflowCoordinator};

/// Shared application state
pub struct AppState {
    config: Config,
    ticket_store: Arc<dyn TicketStore>,
    coordinator: Arc<WorkflowCoordinator>,
}

impl AppState {
    pub fn new(
        config: Config,
        ticket_store: Arc<dyn TicketStore>,
        coordinator: Arc<WorkflowCoordinator>,
    ) -> Self {
        Self {
            config,
            ticket_store,
            coordinator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn ticket_store(&self) -> &dyn TicketStore {
        self.ticket_store.as_ref()
    }

    pub fn coordinator(&self) -> &WorkflowCoordinator {
        self.coordinator.as_ref()
    }
}
