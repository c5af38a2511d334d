use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketd_core::{
    load_config, validate_config, AmqpPublisher, CamundaClient, EventPublisher, NoopPublisher,
    ProcessEngine, SqliteTicketStore, TaskPoller, TicketStore, WorkflowCoordinator,
};

use ticketd_server::api::create_router;
use ticketd_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("TICKETD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Engine URL: {}", config.engine.url);
    info!("Database path: {:?}", config.database.path);

    // Create SQLite ticket store
    let ticket_store: Arc<dyn TicketStore> = Arc::new(
        SqliteTicketStore::new(&config.database.path).context("Failed to create ticket store")?,
    );
    info!("Ticket store initialized");

    // Create process engine client
    let engine: Arc<dyn ProcessEngine> = Arc::new(CamundaClient::new(config.engine.clone()));

    // Deploy process definition if one is configured. The engine may still
    // be starting up, so a failed deploy is logged rather than fatal.
    if let Some(ref definition_path) = config.engine.definition_path {
        match std::fs::read_to_string(definition_path) {
            Ok(bpmn_xml) => {
                match engine
                    .deploy_definition(&config.engine.process_key, &bpmn_xml)
                    .await
                {
                    Ok(()) => info!("Deployed process definition from {:?}", definition_path),
                    Err(e) => warn!("Failed to deploy process definition: {}", e),
                }
            }
            Err(e) => warn!(
                "Failed to read process definition {:?}: {}",
                definition_path, e
            ),
        }
    }

    // Connect the event publisher. Events are best effort, so an
    // unreachable broker downgrades to a no-op publisher.
    let publisher: Arc<dyn EventPublisher> = match &config.events {
        Some(events_config) => match AmqpPublisher::connect(events_config).await {
            Ok(publisher) => {
                info!("Event publisher connected to {}", events_config.exchange);
                Arc::new(publisher)
            }
            Err(e) => {
                warn!("Event broker unreachable, events disabled: {}", e);
                Arc::new(NoopPublisher)
            }
        },
        None => {
            info!("No event broker configured");
            Arc::new(NoopPublisher)
        }
    };

    // Create workflow coordinator
    let coordinator = Arc::new(WorkflowCoordinator::new(
        Arc::clone(&ticket_store),
        Arc::clone(&engine),
        Arc::clone(&publisher),
        config.engine.process_key.clone(),
    ));

    // Start the external task poller if enabled
    let poller = if config.worker.enabled {
        let poller = TaskPoller::new(
            config.worker.clone(),
            Arc::clone(&engine),
            Arc::clone(&coordinator),
        );
        poller.start();
        Some(poller)
    } else {
        info!("Task poller disabled in config");
        None
    };

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        ticket_store,
        Arc::clone(&coordinator),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    // Stop poller if running
    if let Some(ref poller) = poller {
        poller.stop();
        info!("Task poller stopped");
    }

    // Release broker resources
    publisher.close().await;
    info!("Event publisher closed");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
