//! Scripted sink for tests: fails a chosen number of times, records what it delivered.

use async_trait::async_trait;
use event_types::{DeliverySink, Record, SinkError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct ScriptedSink<T> {
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<T>>,
}

impl<T: Record> ScriptedSink<T> {
    pub fn succeeding() -> Self {
        Self::failing_first(0)
    }

    /// Fail the first `n` deliveries, then succeed.
    pub fn failing_first(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            attempts: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    /// Every call to `deliver`, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Records whose delivery succeeded, in call order.
    pub fn delivered(&self) -> Vec<T> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl<T: Record> DeliverySink<T> for ScriptedSink<T> {
    async fn deliver(&self, record: &T) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(SinkError::Unavailable("scripted failure".to_string()));
        }
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}
