//! AMQP event publisher implementation.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{debug, warn};

use crate::config::EventsConfig;

use super::{EventPublisher, PublishError, TicketEvent};

/// Publishes ticket events to an AMQP topic exchange.
pub struct AmqpPublisher {
    connection: Connection,
    channel: Channel,
    exchange: String,
}

impl AmqpPublisher {
    /// Connect to the broker and declare the topic exchange.
    pub async fn connect(config: &EventsConfig) -> Result<Self, PublishError> {
        let connection = Connection::connect(
            &config.url,
            ConnectionProperties::default().with_connection_name("ticketd".into()),
        )
        .await
        .map_err(|e| PublishError::BrokerUnavailable(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| PublishError::BrokerUnavailable(e.to_string()))?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| PublishError::BrokerUnavailable(e.to_string()))?;

        debug!(exchange = %config.exchange, "Connected to event broker");

        Ok(Self {
            connection,
            channel,
            exchange: config.exchange.clone(),
        })
    }
}

#[async_trait]
impl EventPublisher for AmqpPublisher {
    async fn publish(&self, event: &TicketEvent) -> Result<(), PublishError> {
        let body = serde_json::to_vec(event)
            .map_err(|e| PublishError::Serialization(e.to_string()))?;

        // Routing key is the event name, so consumers can bind "ticket.*"
        self.channel
            .basic_publish(
                &self.exchange,
                &event.event,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| PublishError::PublishFailed(e.to_string()))?;

        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.connection.close(200, "shutdown").await {
            warn!(error = %e, "Failed to close broker connection");
        }
    }
}
