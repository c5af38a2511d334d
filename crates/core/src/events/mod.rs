//! Ticket event publishing.
//!
//! Events are best effort: workflow operations succeed even when the broker
//! is down, and callers log publish failures instead of propagating them.

mod amqp;
mod types;

pub use amqp::AmqpPublisher;
pub use types::*;
