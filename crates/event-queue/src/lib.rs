//! Work queue backends: in-memory and (feature `sqlite`) SQLite-backed.

mod memory;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use event_types::{PutOptions, QueueBackendError, Task, TaskId, WorkQueue};
pub use memory::InMemoryWorkQueue;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteQueueStore, SqliteWorkQueue};
