//! Sink that only logs. Stand-in for a real downstream integration.

use async_trait::async_trait;
use event_types::{DeliverySink, Record, SinkError};

/// Logs every record at debug level and always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<T: Record> DeliverySink<T> for LogSink {
    async fn deliver(&self, record: &T) -> Result<(), SinkError> {
        tracing::debug!(kind = %T::KIND, id = %record.id(), event = ?record, "event took");
        Ok(())
    }
}
