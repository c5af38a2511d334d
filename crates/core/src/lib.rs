pub mod config;
pub mod engine;
pub mod events;
pub mod testing;
pub mod ticket;
pub mod worker;
pub mod workflow;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    EngineConfig, EventsConfig, SanitizedConfig, ServerConfig, WorkerConfig,
};
pub use engine::{CamundaClient, EngineError, ExternalTask, ProcessEngine, StartVariables};
pub use events::{AmqpPublisher, EventPublisher, NoopPublisher, PublishError, TicketEvent};
pub use ticket::{
    CreateTicketRequest, SqliteTicketStore, Ticket, TicketError, TicketStatus, TicketStore,
};
pub use worker::TaskPoller;
pub use workflow::{WorkflowCoordinator, WorkflowError};
