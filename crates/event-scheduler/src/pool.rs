//! Worker pool: `workers` consumer loops per record kind, joined on shutdown.

use event_types::{AdminAuditEvent, AuditEvent, EventKeeper, RecordKind, ServiceError};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Run `workers` loops over each keeper until `cancel` fires, then wait for all of them.
///
/// A panicking worker cancels the token so its siblings drain; the first panic is returned.
pub async fn run_workers(
    cancel: CancellationToken,
    workers: usize,
    events: Arc<dyn EventKeeper<AuditEvent>>,
    admin: Arc<dyn EventKeeper<AdminAuditEvent>>,
) -> Result<(), ServiceError> {
    let mut event_set = JoinSet::new();
    let mut admin_set = JoinSet::new();
    for _ in 0..workers {
        let keeper = Arc::clone(&events);
        let token = cancel.clone();
        event_set.spawn(async move { keeper.process(token).await });

        let keeper = Arc::clone(&admin);
        let token = cancel.clone();
        admin_set.spawn(async move { keeper.process(token).await });
    }
    tracing::info!(workers, "queue workers started");

    let mut failure = None;
    loop {
        let (kind, joined) = tokio::select! {
            Some(joined) = event_set.join_next() => (RecordKind::Event, joined),
            Some(joined) = admin_set.join_next() => (RecordKind::AdminEvent, joined),
            else => break,
        };
        if let Err(e) = joined {
            on_worker_failure(kind, e, &cancel, &mut failure);
        }
    }

    tracing::info!("queue workers stopped");
    failure.map_or(Ok(()), Err)
}

fn on_worker_failure(
    kind: RecordKind,
    e: JoinError,
    cancel: &CancellationToken,
    failure: &mut Option<ServiceError>,
) {
    if e.is_panic() {
        tracing::error!(%kind, error = %e, "queue worker panicked, shutting down");
    } else {
        tracing::warn!(%kind, error = %e, "queue worker aborted");
    }
    cancel.cancel();
    if failure.is_none() {
        *failure = Some(ServiceError::WorkerPanicked { kind });
    }
}
