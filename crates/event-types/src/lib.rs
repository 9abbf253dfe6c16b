//! Core types and traits for the audit events adapter.
//!
//! Domain records, the wire DTOs of the ingestion API, and the traits that connect the queue
//! backend, the delivery sinks and the event service.

mod dto;
mod model;
mod traits;

pub use dto::*;
pub use model::*;
pub use traits::*;
