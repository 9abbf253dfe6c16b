//! Event service: routes each record kind to its keeper and runs the worker pool.

use crate::pool::run_workers;
use async_trait::async_trait;
use event_types::{AdminAuditEvent, AuditEvent, EventKeeper, EventProvider, ServiceError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Consumer loops per record kind.
    pub workers: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Routes each record kind to its keeper and owns the worker pool.
pub struct EventService {
    admin: Arc<dyn EventKeeper<AdminAuditEvent>>,
    events: Arc<dyn EventKeeper<AuditEvent>>,
    config: ServiceConfig,
}

impl EventService {
    pub fn new(
        admin: Arc<dyn EventKeeper<AdminAuditEvent>>,
        events: Arc<dyn EventKeeper<AuditEvent>>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            admin,
            events,
            config,
        }
    }
}

#[async_trait]
impl EventProvider for EventService {
    async fn push(&self, event: AuditEvent) -> Result<(), ServiceError> {
        self.events.push(event).await.map_err(ServiceError::Event)
    }

    async fn push_admin(&self, event: AdminAuditEvent) -> Result<(), ServiceError> {
        self.admin.push(event).await.map_err(ServiceError::Admin)
    }

    async fn read(&self, cancel: CancellationToken) -> Result<(), ServiceError> {
        run_workers(
            cancel,
            self.config.workers,
            Arc::clone(&self.events),
            Arc::clone(&self.admin),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_types::{
        AuthDetails, EventType, OperationType, QueueError, Record, RecordKind,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct MockKeeper<T> {
        fail: bool,
        pushed: Mutex<Vec<T>>,
        process_calls: AtomicUsize,
    }

    impl<T> MockKeeper<T> {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                pushed: Mutex::new(Vec::new()),
                process_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl<T: Record> EventKeeper<T> for MockKeeper<T> {
        async fn push(&self, record: T) -> Result<(), QueueError> {
            if self.fail {
                return Err(QueueError::Unavailable {
                    queue: T::KIND.queue_name().to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            self.pushed.lock().unwrap().push(record);
            Ok(())
        }

        async fn process(&self, cancel: CancellationToken) {
            self.process_calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancelled().await;
        }
    }

    fn service(
        admin: &Arc<MockKeeper<AdminAuditEvent>>,
        events: &Arc<MockKeeper<AuditEvent>>,
        workers: usize,
    ) -> EventService {
        EventService::new(admin.clone(), events.clone(), ServiceConfig { workers })
    }

    fn event() -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            time: None,
            event_type: EventType::Logout,
            realm_id: Uuid::new_v4(),
            realm_name: "test".to_string(),
            client_id: "client id".to_string(),
            user_id: Uuid::new_v4(),
            session_id: "session id".to_string(),
            ip_address: "127.0.0.1".to_string(),
            error: String::new(),
            details: HashMap::new(),
        }
    }

    fn admin_event() -> AdminAuditEvent {
        AdminAuditEvent {
            id: Uuid::new_v4(),
            time: None,
            realm_id: Uuid::new_v4(),
            realm_name: "test".to_string(),
            auth_details: Some(AuthDetails::default()),
            resource_type: "CLIENT".to_string(),
            operation_type: OperationType::Update,
            resource_path: "clients/1".to_string(),
            representation: String::new(),
            error: String::new(),
            details: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn push_routes_to_event_keeper() {
        let admin = MockKeeper::new(false);
        let events = MockKeeper::new(false);
        let svc = service(&admin, &events, 1);
        let e = event();

        svc.push(e.clone()).await.unwrap();
        assert_eq!(*events.pushed.lock().unwrap(), vec![e]);
        assert!(admin.pushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_admin_routes_to_admin_keeper() {
        let admin = MockKeeper::new(false);
        let events = MockKeeper::new(false);
        let svc = service(&admin, &events, 1);
        let e = admin_event();

        svc.push_admin(e.clone()).await.unwrap();
        assert_eq!(*admin.pushed.lock().unwrap(), vec![e]);
        assert!(events.pushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_errors_are_wrapped_with_kind() {
        let admin = MockKeeper::new(true);
        let events = MockKeeper::new(true);
        let svc = service(&admin, &events, 1);

        let err = svc.push(event()).await.unwrap_err();
        assert_eq!(err.kind(), RecordKind::Event);
        assert!(err.to_string().starts_with("push event: "));
        assert!(err.to_string().contains("connection refused"));

        let err = svc.push_admin(admin_event()).await.unwrap_err();
        assert_eq!(err.kind(), RecordKind::AdminEvent);
        assert!(err.to_string().starts_with("push admin event: "));
        assert!(err.to_string().contains("admin_events"));
    }

    #[tokio::test]
    async fn read_runs_workers_for_both_kinds() {
        let admin = MockKeeper::new(false);
        let events = MockKeeper::new(false);
        let svc = Arc::new(service(&admin, &events, 4));
        let cancel = CancellationToken::new();

        let reader = {
            let svc = Arc::clone(&svc);
            let cancel = cancel.clone();
            tokio::spawn(async move { svc.read(cancel).await })
        };
        while admin.process_calls.load(Ordering::SeqCst) < 4
            || events.process_calls.load(Ordering::SeqCst) < 4
        {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        reader.await.unwrap().unwrap();

        assert_eq!(admin.process_calls.load(Ordering::SeqCst), 4);
        assert_eq!(events.process_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn read_with_cancelled_token_returns() {
        let admin = MockKeeper::new(false);
        let events = MockKeeper::new(false);
        let svc = service(&admin, &events, 2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        svc.read(cancel).await.unwrap();
    }

    #[test]
    fn default_worker_count() {
        assert_eq!(ServiceConfig::default().workers, 4);
    }
}
