//! Background polling worker for external tasks.

mod poller;

pub use poller::TaskPoller;
