//! Wiring: queue backend → keepers → event service.

use crate::config::{AppConfig, QueueBackend};
use event_queue::{InMemoryWorkQueue, SqliteQueueStore};
use event_scheduler::{EventService, QueueEventKeeper, ServiceConfig};
use event_sink::{LogSink, WebhookSink};
use event_types::{
    AdminAuditEvent, AuditEvent, DeliverySink, EventKeeper, QueueBackendError, SinkError,
    WorkQueue, ADMIN_EVENTS_QUEUE_NAME, EVENTS_QUEUE_NAME,
};
use std::sync::Arc;
use std::time::Duration;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("queue backend: {0}")]
    Queue(#[from] QueueBackendError),
    #[error("sink: {0}")]
    Sink(#[from] SinkError),
}

/// The `events` and `admin_events` queues.
pub struct Queues {
    pub events: Arc<dyn WorkQueue>,
    pub admin: Arc<dyn WorkQueue>,
}

/// Open both named queues. With `create` unset a missing queue is an error.
pub fn open_queues(backend: &QueueBackend, create: bool) -> Result<Queues, QueueBackendError> {
    match backend {
        QueueBackend::Memory => Ok(Queues {
            events: Arc::new(InMemoryWorkQueue::new(EVENTS_QUEUE_NAME)),
            admin: Arc::new(InMemoryWorkQueue::new(ADMIN_EVENTS_QUEUE_NAME)),
        }),
        QueueBackend::Sqlite { path } => {
            let store = SqliteQueueStore::open(path)?;
            if create {
                store.create_queue(EVENTS_QUEUE_NAME)?;
                store.create_queue(ADMIN_EVENTS_QUEUE_NAME)?;
            }
            Ok(Queues {
                events: Arc::new(store.queue(EVENTS_QUEUE_NAME)?),
                admin: Arc::new(store.queue(ADMIN_EVENTS_QUEUE_NAME)?),
            })
        }
    }
}

/// Build the event service for `config` on top of already opened queues.
pub fn build_service(config: &AppConfig, queues: Queues) -> Result<EventService, BootstrapError> {
    let (event_sink, admin_sink): (
        Arc<dyn DeliverySink<AuditEvent>>,
        Arc<dyn DeliverySink<AdminAuditEvent>>,
    ) = match &config.sink_url {
        Some(url) => {
            let sink = Arc::new(WebhookSink::new(url.clone(), WEBHOOK_TIMEOUT)?);
            tracing::info!(url = %url, "delivering to webhook");
            (
                sink.clone() as Arc<dyn DeliverySink<AuditEvent>>,
                sink as Arc<dyn DeliverySink<AdminAuditEvent>>,
            )
        }
        None => {
            let sink = Arc::new(LogSink::new());
            tracing::info!("delivering to log");
            (
                sink.clone() as Arc<dyn DeliverySink<AuditEvent>>,
                sink as Arc<dyn DeliverySink<AdminAuditEvent>>,
            )
        }
    };

    let events: Arc<dyn EventKeeper<AuditEvent>> =
        Arc::new(QueueEventKeeper::new(queues.events, event_sink));
    let admin: Arc<dyn EventKeeper<AdminAuditEvent>> =
        Arc::new(QueueEventKeeper::new(queues.admin, admin_sink));

    Ok(EventService::new(
        admin,
        events,
        ServiceConfig {
            workers: config.workers,
        },
    ))
}
