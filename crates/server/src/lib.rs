//! HTTP server for the ticketd workflow service.
//!
//! Exposed as a library so integration tests can build the router
//! in-process with mock dependencies.

pub mod api;
pub mod state;
