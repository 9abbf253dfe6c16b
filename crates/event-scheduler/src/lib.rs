//! Event pipeline: per-kind queue keepers, the worker pool, and the service facade.

mod keeper;
mod pool;
mod service;

pub use keeper::{Iteration, KeeperConfig, QueueEventKeeper};
pub use pool::run_workers;
pub use service::{EventService, ServiceConfig};
