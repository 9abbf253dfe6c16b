//! SQLite-backed work queue: tasks survive restarts.

use async_trait::async_trait;
use event_types::{PutOptions, QueueBackendError, Task, TaskId, WorkQueue};
use rusqlite::OptionalExtension;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How often a waiting `take_timeout` re-checks the table.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn backend_error(e: rusqlite::Error) -> QueueBackendError {
    match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::DiskFull) => QueueBackendError::Full,
        _ => QueueBackendError::Unavailable(e.to_string()),
    }
}

/// One SQLite database holding any number of named queues.
pub struct SqliteQueueStore {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteQueueStore {
    /// Open (or create) the database at `path`.
    ///
    /// Tasks still marked taken belong to a process that is gone, so they are made ready again.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QueueBackendError> {
        let conn = rusqlite::Connection::open(path).map_err(backend_error)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, QueueBackendError> {
        let conn = rusqlite::Connection::open_in_memory().map_err(backend_error)?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self, QueueBackendError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queues (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                status TEXT NOT NULL,
                data BLOB NOT NULL,
                ready_at INTEGER NOT NULL,
                expires_at INTEGER,
                FOREIGN KEY (queue) REFERENCES queues(name)
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_ready ON tasks(queue, status, ready_at);
            "#,
        )
        .map_err(backend_error)?;

        let recovered = conn
            .execute("UPDATE tasks SET status = 'ready' WHERE status = 'taken'", [])
            .map_err(backend_error)?;
        if recovered > 0 {
            tracing::warn!(recovered, "returned tasks left taken by a previous run");
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a named queue if it does not exist yet.
    pub fn create_queue(&self, name: &str) -> Result<(), QueueBackendError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| QueueBackendError::Unavailable(format!("failed to acquire lock: {}", e)))?;
        conn.execute(
            "INSERT OR IGNORE INTO queues (name, created_at) VALUES (?1, ?2)",
            rusqlite::params![name, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(backend_error)?;
        Ok(())
    }

    /// Handle to an existing queue; [`QueueBackendError::QueueNotFound`] if it was never created.
    pub fn queue(&self, name: &str) -> Result<SqliteWorkQueue, QueueBackendError> {
        let exists = {
            let conn = self.conn.lock().map_err(|e| {
                QueueBackendError::Unavailable(format!("failed to acquire lock: {}", e))
            })?;
            conn.query_row(
                "SELECT 1 FROM queues WHERE name = ?1",
                rusqlite::params![name],
                |_| Ok(()),
            )
            .optional()
            .map_err(backend_error)?
            .is_some()
        };
        if !exists {
            return Err(QueueBackendError::QueueNotFound(name.to_string()));
        }
        Ok(SqliteWorkQueue {
            name: name.to_string(),
            conn: Arc::clone(&self.conn),
        })
    }
}

/// One named queue inside a [`SqliteQueueStore`]. Shares the store's connection.
#[derive(Clone)]
pub struct SqliteWorkQueue {
    name: String,
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteWorkQueue {
    fn with_conn<T, F>(&self, f: F) -> Result<T, QueueBackendError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| QueueBackendError::Unavailable(format!("failed to acquire lock: {}", e)))?;
        f(&conn).map_err(backend_error)
    }

    fn try_take(&self) -> Result<Option<Task>, QueueBackendError> {
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM tasks WHERE queue = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
                rusqlite::params![self.name, now],
            )?;
            conn.query_row(
                "UPDATE tasks SET status = 'taken' WHERE id = (SELECT id FROM tasks WHERE queue = ?1 AND status = 'ready' AND ready_at <= ?2 ORDER BY id LIMIT 1) RETURNING id, data",
                rusqlite::params![self.name, now],
                |row| {
                    Ok(Task {
                        id: row.get::<_, i64>(0)? as TaskId,
                        data: row.get(1)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Explain why a by-id statement touched no row.
    fn missing_task(&self, id: TaskId) -> QueueBackendError {
        let status = self.with_conn(|conn| {
            conn.query_row(
                "SELECT status FROM tasks WHERE id = ?1 AND queue = ?2",
                rusqlite::params![id as i64, self.name],
                |row| row.get::<_, String>(0),
            )
            .optional()
        });
        match status {
            Ok(Some(_)) => QueueBackendError::NotTaken(id),
            Ok(None) => QueueBackendError::TaskNotFound(id),
            Err(e) => e,
        }
    }

    /// Number of tasks in any state.
    pub fn len(&self) -> Result<usize, QueueBackendError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE queue = ?1",
                rusqlite::params![self.name],
                |row| row.get::<_, i64>(0),
            )
        })
        .map(|n| n as usize)
    }

    pub fn is_empty(&self) -> Result<bool, QueueBackendError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl WorkQueue for SqliteWorkQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put(&self, data: Vec<u8>, opts: PutOptions) -> Result<TaskId, QueueBackendError> {
        let now = now_ms();
        let ready_at = now + opts.delay.map(duration_ms).unwrap_or(0);
        let expires_at = opts.ttl.map(|ttl| now.saturating_add(duration_ms(ttl)));
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (queue, status, data, ready_at, expires_at) VALUES (?1, 'ready', ?2, ?3, ?4)",
                rusqlite::params![self.name, data, ready_at, expires_at],
            )?;
            Ok(conn.last_insert_rowid() as TaskId)
        })
    }

    async fn take_timeout(&self, timeout: Duration) -> Result<Option<Task>, QueueBackendError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // rusqlite blocks; keep it off the runtime threads.
            let queue = self.clone();
            let taken = tokio::task::spawn_blocking(move || queue.try_take())
                .await
                .map_err(|e| QueueBackendError::Unavailable(format!("take task failed: {e}")))??;
            if let Some(task) = taken {
                return Ok(Some(task));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn ack(&self, id: TaskId) -> Result<(), QueueBackendError> {
        let removed = self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND queue = ?2 AND status = 'taken'",
                rusqlite::params![id as i64, self.name],
            )
        })?;
        if removed == 0 {
            return Err(self.missing_task(id));
        }
        Ok(())
    }

    async fn delete(&self, id: TaskId) -> Result<(), QueueBackendError> {
        let removed = self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND queue = ?2",
                rusqlite::params![id as i64, self.name],
            )
        })?;
        if removed == 0 {
            return Err(QueueBackendError::TaskNotFound(id));
        }
        Ok(())
    }

    async fn release(&self, id: TaskId, delay: Duration) -> Result<(), QueueBackendError> {
        let ready_at = now_ms() + duration_ms(delay);
        let updated = self.with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET status = 'ready', ready_at = ?1 WHERE id = ?2 AND queue = ?3 AND status = 'taken'",
                rusqlite::params![ready_at, id as i64, self.name],
            )
        })?;
        if updated == 0 {
            return Err(self.missing_task(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(200);

    fn store_with(names: &[&str]) -> SqliteQueueStore {
        let store = SqliteQueueStore::open_in_memory().unwrap();
        for name in names {
            store.create_queue(name).unwrap();
        }
        store
    }

    #[test]
    fn unknown_queue_is_reported() {
        let store = store_with(&["events"]);
        assert!(store.queue("events").is_ok());
        assert!(matches!(
            store.queue("admin_events"),
            Err(QueueBackendError::QueueNotFound(name)) if name == "admin_events"
        ));
    }

    #[tokio::test]
    async fn queues_are_isolated() {
        let store = store_with(&["events", "admin_events"]);
        let events = store.queue("events").unwrap();
        let admin = store.queue("admin_events").unwrap();
        events.put(b"e".to_vec(), PutOptions::default()).await.unwrap();

        assert!(admin.take_timeout(WAIT).await.unwrap().is_none());
        let task = events.take_timeout(WAIT).await.unwrap().unwrap();
        assert_eq!(task.data, b"e".to_vec());
    }

    #[tokio::test]
    async fn take_ack_lifecycle() {
        let store = store_with(&["events"]);
        let q = store.queue("events").unwrap();
        let id = q.put(b"x".to_vec(), PutOptions::default()).await.unwrap();

        assert!(matches!(q.ack(id).await, Err(QueueBackendError::NotTaken(_))));
        let task = q.take_timeout(WAIT).await.unwrap().unwrap();
        assert_eq!(task.id, id);
        assert!(q.take_timeout(WAIT).await.unwrap().is_none());
        q.ack(id).await.unwrap();
        assert!(q.is_empty().unwrap());
        assert!(matches!(
            q.ack(id).await,
            Err(QueueBackendError::TaskNotFound(_))
        ));
    }

    #[tokio::test]
    async fn release_makes_task_visible_again() {
        let store = store_with(&["events"]);
        let q = store.queue("events").unwrap();
        q.put(b"x".to_vec(), PutOptions::default()).await.unwrap();
        let task = q.take_timeout(WAIT).await.unwrap().unwrap();

        q.release(task.id, Duration::from_secs(3600)).await.unwrap();
        assert!(q.take_timeout(WAIT).await.unwrap().is_none());

        q.delete(task.id).await.unwrap();
        assert!(q.is_empty().unwrap());
    }

    #[tokio::test]
    async fn zero_delay_release_is_immediately_takeable() {
        let store = store_with(&["events"]);
        let q = store.queue("events").unwrap();
        q.put(b"x".to_vec(), PutOptions::default()).await.unwrap();
        let task = q.take_timeout(WAIT).await.unwrap().unwrap();
        q.release(task.id, Duration::ZERO).await.unwrap();
        let again = q.take_timeout(WAIT).await.unwrap().unwrap();
        assert_eq!(again.id, task.id);
    }

    #[tokio::test]
    async fn expired_tasks_are_dropped_on_take() {
        let store = store_with(&["events"]);
        let q = store.queue("events").unwrap();
        let opts = PutOptions {
            ttl: Some(Duration::ZERO),
            delay: None,
        };
        q.put(b"x".to_vec(), opts).await.unwrap();
        assert!(q.take_timeout(WAIT).await.unwrap().is_none());
        assert!(q.is_empty().unwrap());
    }

    #[tokio::test]
    async fn ttl_also_bounds_taken_tasks() {
        let store = store_with(&["events"]);
        let q = store.queue("events").unwrap();
        let opts = PutOptions {
            ttl: Some(Duration::from_millis(100)),
            delay: None,
        };
        let id = q.put(b"x".to_vec(), opts).await.unwrap();
        let task = q.take_timeout(WAIT).await.unwrap().unwrap();
        assert_eq!(task.id, id);

        // Never acked, released or deleted.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(q.take_timeout(WAIT).await.unwrap().is_none());
        assert_eq!(q.len().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn waiting_taker_sees_concurrent_put() {
        let store = store_with(&["events"]);
        let q = store.queue("events").unwrap();
        let taker = {
            let q = q.clone();
            tokio::spawn(async move { q.take_timeout(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(120)).await;
        let id = q.put(b"late".to_vec(), PutOptions::default()).await.unwrap();

        let task = taker.await.unwrap().unwrap().unwrap();
        assert_eq!(task.id, id);
        assert_eq!(task.data, b"late".to_vec());
    }

    #[tokio::test]
    async fn taken_tasks_survive_restart_as_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        {
            let store = SqliteQueueStore::open(&path).unwrap();
            store.create_queue("events").unwrap();
            let q = store.queue("events").unwrap();
            q.put(b"crash".to_vec(), PutOptions::default()).await.unwrap();
            q.take_timeout(WAIT).await.unwrap().unwrap();
        }
        let store = SqliteQueueStore::open(&path).unwrap();
        let q = store.queue("events").unwrap();
        let task = q.take_timeout(WAIT).await.unwrap().unwrap();
        assert_eq!(task.data, b"crash".to_vec());
    }
}
