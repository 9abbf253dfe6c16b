//! Durable queue keeper: one generic adapter per record kind over a [`WorkQueue`].

use async_trait::async_trait;
use event_types::{
    DeliverySink, EventKeeper, PutOptions, QueueBackendError, QueueError, Record, WorkQueue,
};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timings of one keeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeeperConfig {
    /// Lifetime of an enqueued record; the backend may drop it afterwards.
    pub ttl: Duration,
    /// Bounded wait of a single take.
    pub take_timeout: Duration,
    /// Local sleep after a failed take.
    pub take_backoff: Duration,
    /// Visibility delay of a record whose delivery failed.
    pub release_delay: Duration,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(4 * 60 * 60),
            take_timeout: Duration::from_secs(1),
            take_backoff: Duration::from_secs(1),
            release_delay: Duration::from_secs(10),
        }
    }
}

/// Outcome of one [`QueueEventKeeper::process_once`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    /// Cancellation observed; nothing was taken.
    Shutdown,
    /// Take timed out with nothing ready.
    Idle,
    /// Take failed (or the payload was undecodable); backoff already slept.
    TakeFailed,
    /// Delivered and acked.
    Delivered,
    /// Delivered, ack failed; delete was attempted.
    AckFailed,
    /// Delivery failed; released with the configured delay.
    Released,
}

/// Keeper over one named queue. The record travels as JSON.
pub struct QueueEventKeeper<T: Record> {
    queue: Arc<dyn WorkQueue>,
    sink: Arc<dyn DeliverySink<T>>,
    config: KeeperConfig,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> QueueEventKeeper<T> {
    pub fn new(queue: Arc<dyn WorkQueue>, sink: Arc<dyn DeliverySink<T>>) -> Self {
        Self {
            queue,
            sink,
            config: KeeperConfig::default(),
            _record: PhantomData,
        }
    }

    pub fn with_config(mut self, config: KeeperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }

    /// Put the record with the configured TTL.
    pub async fn enqueue(&self, record: T) -> Result<(), QueueError> {
        let queue = self.queue.name().to_string();
        let data = serde_json::to_vec(&record).map_err(|e| QueueError::Encode {
            queue: queue.clone(),
            reason: e.to_string(),
        })?;
        let opts = PutOptions {
            ttl: Some(self.config.ttl),
            delay: None,
        };
        match self.queue.put(data, opts).await {
            Ok(task_id) => {
                tracing::debug!(queue = %queue, task_id, id = %record.id(), "event queued");
                Ok(())
            }
            Err(e) => {
                tracing::error!(queue = %queue, id = %record.id(), error = %e, "failed to push");
                Err(match e {
                    QueueBackendError::Full => QueueError::Full { queue },
                    other => QueueError::Unavailable {
                        queue,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    /// One consume step: take, deliver, then ack or release.
    pub async fn process_once(&self, cancel: &CancellationToken) -> Iteration {
        if cancel.is_cancelled() {
            return Iteration::Shutdown;
        }

        let task = match self.queue.take_timeout(self.config.take_timeout).await {
            Ok(Some(task)) => task,
            Ok(None) => return Iteration::Idle,
            Err(e) => {
                tracing::error!(queue = %self.queue.name(), error = %e, "can't take task");
                self.backoff(cancel).await;
                return Iteration::TakeFailed;
            }
        };

        let record: T = match serde_json::from_slice(&task.data) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(
                    queue = %self.queue.name(),
                    task_id = task.id,
                    error = %e,
                    "can't decode task, deleting it"
                );
                if let Err(e) = self.queue.delete(task.id).await {
                    tracing::error!(queue = %self.queue.name(), task_id = task.id, error = %e, "can't delete task");
                }
                self.backoff(cancel).await;
                return Iteration::TakeFailed;
            }
        };

        if let Err(e) = self.sink.deliver(&record).await {
            tracing::warn!(
                queue = %self.queue.name(),
                task_id = task.id,
                id = %record.id(),
                error = %e,
                "can't send event"
            );
            if let Err(e) = self
                .queue
                .release(task.id, self.config.release_delay)
                .await
            {
                tracing::error!(queue = %self.queue.name(), task_id = task.id, error = %e, "can't release task");
            }
            return Iteration::Released;
        }

        if let Err(e) = self.queue.ack(task.id).await {
            tracing::error!(
                queue = %self.queue.name(),
                task_id = task.id,
                error = %e,
                "can't ack task, trying to delete"
            );
            if let Err(e) = self.queue.delete(task.id).await {
                tracing::error!(queue = %self.queue.name(), task_id = task.id, error = %e, "can't delete task");
            }
            return Iteration::AckFailed;
        }

        Iteration::Delivered
    }

    async fn backoff(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.config.take_backoff) => {}
        }
    }
}

#[async_trait]
impl<T: Record> EventKeeper<T> for QueueEventKeeper<T> {
    async fn push(&self, record: T) -> Result<(), QueueError> {
        self.enqueue(record).await
    }

    async fn process(&self, cancel: CancellationToken) {
        while self.process_once(&cancel).await != Iteration::Shutdown {}
        tracing::info!(queue = %self.queue.name(), "queue worker has been shutdown");
    }
}
