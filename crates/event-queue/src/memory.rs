//! In-memory work queue: FIFO by task id, delayed visibility, TTL expiry.

use async_trait::async_trait;
use event_types::{PutOptions, QueueBackendError, Task, TaskId, WorkQueue};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Ready,
    Taken,
}

struct Entry {
    data: Vec<u8>,
    state: TaskState,
    ready_at: Instant,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct Inner {
    next_id: TaskId,
    tasks: BTreeMap<TaskId, Entry>,
}

impl Inner {
    /// Drop tasks whose TTL has passed, taken or not.
    fn expire(&mut self, now: Instant) -> usize {
        let before = self.tasks.len();
        self.tasks
            .retain(|_, e| e.expires_at.map_or(true, |at| at > now));
        before - self.tasks.len()
    }

    fn take_ready(&mut self, now: Instant) -> Option<Task> {
        let (id, entry) = self
            .tasks
            .iter_mut()
            .find(|(_, e)| e.state == TaskState::Ready && e.ready_at <= now)?;
        entry.state = TaskState::Taken;
        Some(Task {
            id: *id,
            data: entry.data.clone(),
        })
    }

    fn next_ready_at(&self) -> Option<Instant> {
        self.tasks
            .values()
            .filter(|e| e.state == TaskState::Ready)
            .map(|e| e.ready_at)
            .min()
    }

    fn taken_mut(&mut self, id: TaskId) -> Result<&mut Entry, QueueBackendError> {
        let entry = self
            .tasks
            .get_mut(&id)
            .ok_or(QueueBackendError::TaskNotFound(id))?;
        if entry.state != TaskState::Taken {
            return Err(QueueBackendError::NotTaken(id));
        }
        Ok(entry)
    }
}

/// In-memory WorkQueue (process lifetime only). Optional capacity bound makes `put` fail with
/// [`QueueBackendError::Full`].
pub struct InMemoryWorkQueue {
    name: String,
    capacity: Option<usize>,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl InMemoryWorkQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: None,
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
        }
    }

    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(name)
        }
    }

    /// Number of tasks in any state.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, data: Vec<u8>, opts: PutOptions) -> Result<TaskId, QueueBackendError> {
        let now = Instant::now();
        let id = {
            let mut inner = self.inner.lock().await;
            inner.expire(now);
            if let Some(cap) = self.capacity {
                if inner.tasks.len() >= cap {
                    return Err(QueueBackendError::Full);
                }
            }
            inner.next_id += 1;
            let id = inner.next_id;
            inner.tasks.insert(
                id,
                Entry {
                    data,
                    state: TaskState::Ready,
                    ready_at: now + opts.delay.unwrap_or_default(),
                    expires_at: opts.ttl.map(|ttl| now + ttl),
                },
            );
            id
        };
        self.notify.notify_one();
        Ok(id)
    }

    async fn take_timeout(&self, timeout: Duration) -> Result<Option<Task>, QueueBackendError> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            let next_ready = {
                let mut inner = self.inner.lock().await;
                let now = Instant::now();
                let expired = inner.expire(now);
                if expired > 0 {
                    tracing::debug!(queue = %self.name, expired, "expired tasks dropped");
                }
                if let Some(task) = inner.take_ready(now) {
                    return Ok(Some(task));
                }
                inner.next_ready_at()
            };
            if Instant::now() >= deadline {
                return Ok(None);
            }
            let wake_at = next_ready.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn ack(&self, id: TaskId) -> Result<(), QueueBackendError> {
        let mut inner = self.inner.lock().await;
        inner.taken_mut(id)?;
        inner.tasks.remove(&id);
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<(), QueueBackendError> {
        let mut inner = self.inner.lock().await;
        inner
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or(QueueBackendError::TaskNotFound(id))
    }

    async fn release(&self, id: TaskId, delay: Duration) -> Result<(), QueueBackendError> {
        {
            let mut inner = self.inner.lock().await;
            let entry = inner.taken_mut(id)?;
            entry.state = TaskState::Ready;
            entry.ready_at = Instant::now() + delay;
        }
        if delay.is_zero() {
            self.notify.notify_one();
        }
        Ok(())
    }
}
