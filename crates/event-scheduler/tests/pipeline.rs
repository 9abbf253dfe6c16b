//! Producers and the worker pool over in-memory queues.

use event_queue::InMemoryWorkQueue;
use event_scheduler::{EventService, QueueEventKeeper, ServiceConfig};
use event_sink::ScriptedSink;
use event_types::{
    AdminAuditEvent, AuditEvent, AuthDetails, DeliverySink, EventKeeper, EventProvider, EventType,
    OperationType, WorkQueue, ADMIN_EVENTS_QUEUE_NAME, EVENTS_QUEUE_NAME,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct Pipeline {
    service: Arc<EventService>,
    event_sink: Arc<ScriptedSink<AuditEvent>>,
    admin_sink: Arc<ScriptedSink<AdminAuditEvent>>,
}

fn pipeline(workers: usize, event_sink: ScriptedSink<AuditEvent>) -> Pipeline {
    let event_sink = Arc::new(event_sink);
    let admin_sink = Arc::new(ScriptedSink::succeeding());

    let events_queue: Arc<dyn WorkQueue> = Arc::new(InMemoryWorkQueue::new(EVENTS_QUEUE_NAME));
    let admin_queue: Arc<dyn WorkQueue> = Arc::new(InMemoryWorkQueue::new(ADMIN_EVENTS_QUEUE_NAME));
    let events: Arc<dyn EventKeeper<AuditEvent>> = Arc::new(QueueEventKeeper::new(
        events_queue,
        event_sink.clone() as Arc<dyn DeliverySink<AuditEvent>>,
    ));
    let admin: Arc<dyn EventKeeper<AdminAuditEvent>> = Arc::new(QueueEventKeeper::new(
        admin_queue,
        admin_sink.clone() as Arc<dyn DeliverySink<AdminAuditEvent>>,
    ));

    Pipeline {
        service: Arc::new(EventService::new(admin, events, ServiceConfig { workers })),
        event_sink,
        admin_sink,
    }
}

fn event(n: usize) -> AuditEvent {
    AuditEvent {
        id: Uuid::new_v4(),
        time: None,
        event_type: if n % 2 == 0 {
            EventType::Login
        } else {
            EventType::Logout
        },
        realm_id: Uuid::new_v4(),
        realm_name: "test".to_string(),
        client_id: format!("client-{n}"),
        user_id: Uuid::new_v4(),
        session_id: format!("session-{n}"),
        ip_address: "127.0.0.1".to_string(),
        error: String::new(),
        details: HashMap::new(),
    }
}

fn admin_event(n: usize) -> AdminAuditEvent {
    AdminAuditEvent {
        id: Uuid::new_v4(),
        time: None,
        realm_id: Uuid::new_v4(),
        realm_name: "master".to_string(),
        auth_details: Some(AuthDetails {
            realm_id: Uuid::new_v4(),
            realm_name: "master".to_string(),
            client_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            ip_address: "10.0.0.1".to_string(),
        }),
        resource_type: "USER".to_string(),
        operation_type: OperationType::Create,
        resource_path: format!("users/{n}"),
        representation: String::new(),
        error: String::new(),
        details: HashMap::new(),
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pipeline did not drain in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_record_is_delivered_exactly_once() {
    let p = pipeline(4, ScriptedSink::succeeding());
    let cancel = CancellationToken::new();
    let reader = {
        let service = Arc::clone(&p.service);
        let cancel = cancel.clone();
        tokio::spawn(async move { service.read(cancel).await })
    };

    let mut want_events = HashSet::new();
    let mut want_admin = HashSet::new();
    for n in 0..100 {
        let e = event(n);
        want_events.insert(e.id);
        p.service.push(e).await.unwrap();

        let a = admin_event(n);
        want_admin.insert(a.id);
        p.service.push_admin(a).await.unwrap();
    }

    wait_until(|| p.event_sink.delivered().len() >= 100 && p.admin_sink.delivered().len() >= 100)
        .await;
    cancel.cancel();
    reader.await.unwrap().unwrap();

    let got_events: Vec<Uuid> = p.event_sink.delivered().iter().map(|e| e.id).collect();
    let got_admin: Vec<Uuid> = p.admin_sink.delivered().iter().map(|e| e.id).collect();
    assert_eq!(got_events.len(), 100);
    assert_eq!(got_admin.len(), 100);
    assert_eq!(got_events.into_iter().collect::<HashSet<_>>(), want_events);
    assert_eq!(got_admin.into_iter().collect::<HashSet<_>>(), want_admin);
    assert!(p
        .admin_sink
        .delivered()
        .iter()
        .all(|e| e.auth_details.as_ref().is_some_and(|a| a.client_id.is_nil())));
}

#[tokio::test(start_paused = true)]
async fn failed_delivery_is_eventually_delivered() {
    let p = pipeline(1, ScriptedSink::failing_first(1));
    let cancel = CancellationToken::new();
    let reader = {
        let service = Arc::clone(&p.service);
        let cancel = cancel.clone();
        tokio::spawn(async move { service.read(cancel).await })
    };

    let e = event(0);
    p.service.push(e.clone()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert_eq!(p.event_sink.attempts(), 2);
    assert_eq!(p.event_sink.delivered(), vec![e]);

    cancel.cancel();
    reader.await.unwrap().unwrap();
}

#[tokio::test]
async fn shutdown_joins_idle_workers() {
    let p = pipeline(2, ScriptedSink::succeeding());
    let cancel = CancellationToken::new();
    let reader = {
        let service = Arc::clone(&p.service);
        let cancel = cancel.clone();
        tokio::spawn(async move { service.read(cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(3), reader)
        .await
        .expect("workers did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(p.event_sink.attempts(), 0);
}
