//! Delivery sinks: where records go once a worker takes them off the queue.

mod log;
#[cfg(feature = "test-util")]
pub mod mock;
mod webhook;

pub use event_types::{DeliverySink, SinkError};
pub use log::LogSink;
pub use webhook::WebhookSink;

#[cfg(feature = "test-util")]
pub use mock::ScriptedSink;
