//! Traits for the work queue backend, delivery sinks, keepers, and the producer API.

use crate::{AdminAuditEvent, AuditEvent, Record, RecordKind};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backend-assigned task identifier, unique within one queue.
pub type TaskId = u64;

/// A task reserved by one consumer. Stays in the queue until acked, deleted or released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub data: Vec<u8>,
}

/// Options for [`WorkQueue::put`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// After this long an untaken task may be discarded by the backend.
    pub ttl: Option<Duration>,
    /// Task becomes visible only after this delay.
    pub delay: Option<Duration>,
}

/// Persistent work queue (one named queue).
///
/// Every operation is atomic on its own; a task is handed to at most one taker at a time.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Put a payload; returns the new task id.
    async fn put(&self, data: Vec<u8>, opts: PutOptions) -> Result<TaskId, QueueBackendError>;

    /// Reserve the next ready task, waiting up to `timeout`. `Ok(None)` on timeout.
    async fn take_timeout(&self, timeout: Duration) -> Result<Option<Task>, QueueBackendError>;

    /// Remove a taken task for good.
    async fn ack(&self, id: TaskId) -> Result<(), QueueBackendError>;

    /// Remove a task regardless of its state.
    async fn delete(&self, id: TaskId) -> Result<(), QueueBackendError>;

    /// Return a taken task to the queue, visible again after `delay`.
    async fn release(&self, id: TaskId, delay: Duration) -> Result<(), QueueBackendError>;
}

/// Downstream destination for records taken off the queue.
///
/// Called concurrently from many workers. Any error means "retry later".
#[async_trait]
pub trait DeliverySink<T: Record>: Send + Sync {
    async fn deliver(&self, record: &T) -> Result<(), SinkError>;
}

/// Producer/consumer pair for one record kind.
#[async_trait]
pub trait EventKeeper<T: Record>: Send + Sync {
    /// Durably enqueue a record.
    async fn push(&self, record: T) -> Result<(), QueueError>;

    /// Consume until `cancel` fires.
    async fn process(&self, cancel: CancellationToken);
}

/// Facade the ingestion boundary talks to.
#[async_trait]
pub trait EventProvider: Send + Sync {
    async fn push(&self, event: AuditEvent) -> Result<(), ServiceError>;

    async fn push_admin(&self, event: AdminAuditEvent) -> Result<(), ServiceError>;

    /// Run the worker pool for both record kinds until `cancel` fires and every worker exits.
    async fn read(&self, cancel: CancellationToken) -> Result<(), ServiceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueBackendError {
    #[error("queue is full")]
    Full,
    #[error("queue not found: {0}")]
    QueueNotFound(String),
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("task {0} is not taken")]
    NotTaken(TaskId),
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),
}

/// Enqueue failure as seen by producers. Carries the queue name, never the backend error type.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue {queue} is full")]
    Full { queue: String },
    #[error("can't put to queue {queue}: {reason}")]
    Unavailable { queue: String, reason: String },
    #[error("can't encode record for queue {queue}: {reason}")]
    Encode { queue: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink rejected record: {0}")]
    Rejected(String),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("push event: {0}")]
    Event(#[source] QueueError),
    #[error("push admin event: {0}")]
    Admin(#[source] QueueError),
    #[error("{kind} worker panicked")]
    WorkerPanicked { kind: RecordKind },
}

impl ServiceError {
    /// Record kind the failure belongs to.
    pub fn kind(&self) -> RecordKind {
        match self {
            ServiceError::Event(_) => RecordKind::Event,
            ServiceError::Admin(_) => RecordKind::AdminEvent,
            ServiceError::WorkerPanicked { kind } => *kind,
        }
    }
}
