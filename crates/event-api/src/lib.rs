//! HTTP ingestion for identity-provider audit events, plus process bootstrap.

pub mod app;
pub mod config;
pub mod logging;
pub mod mapper;
pub mod server;
pub mod shutdown;
