//! Integration tests for the viewer WebSocket: bootstrap, fan-out, and
//! session cleanup, against an in-memory event store.
use broadcaster::dispatcher::{Dispatcher, TickOutcome};
use broadcaster::poller::WatermarkPoller;
use broadcaster::registry::ConnectionRegistry;
use broadcaster::source::{EventSource, MemoryEventSource};
use broadcaster::AppState;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use sw_protocol::{EventRecord, HealthResponse};
use sw_test_utils::MockViewer;

fn record(id: i64, secs: i64) -> EventRecord {
    EventRecord {
        id,
        entity_id: format!("AMB-{}", 100 + id % 5),
        checkpoint_id: format!("{}", id % 12),
        occurred_at: Utc.timestamp_opt(1_773_480_000, 0).unwrap() + ChronoDuration::seconds(secs),
    }
}

struct TestApp {
    addr: std::net::SocketAddr,
    store: MemoryEventSource,
    registry: ConnectionRegistry,
    dispatcher: Arc<Dispatcher>,
}

impl TestApp {
    fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    async fn wait_for_clients(&self, expected: usize) {
        for _ in 0..100 {
            if self.registry.len().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "expected {expected} registered viewers, found {}",
            self.registry.len().await
        );
    }
}

async fn make_server(store: MemoryEventSource) -> TestApp {
    let source: Arc<dyn EventSource> = Arc::new(store.clone());
    let registry = ConnectionRegistry::new();
    let dispatcher = Arc::new(Dispatcher::new(
        WatermarkPoller::new(Arc::clone(&source), 100),
        registry.clone(),
        Duration::from_secs(5),
    ));
    let state = AppState::new(source, registry.clone(), 100);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, broadcaster::build_router(state, None))
            .await
            .unwrap();
    });

    TestApp {
        addr,
        store,
        registry,
        dispatcher,
    }
}

#[tokio::test]
async fn late_joiner_gets_latest_window_even_after_watermark_moves() {
    let app = make_server(MemoryEventSource::with_records((1..=150).map(|i| record(i, i)))).await;

    // First tick bootstraps the dispatcher; nobody is listening yet.
    assert!(matches!(app.dispatcher.tick().await, TickOutcome::Broadcast(_)));
    assert_eq!(app.dispatcher.watermark().await, Some(record(150, 150).occurred_at));

    let mut viewer = MockViewer::connect(&app.ws_url()).await.unwrap();
    let bootstrap = viewer.recv_batch().await.unwrap();

    assert_eq!(bootstrap.len(), 100);
    assert_eq!(bootstrap.first().unwrap().id, 150);
    assert_eq!(bootstrap.last().unwrap().id, 51);
    assert!(bootstrap
        .windows(2)
        .all(|pair| pair[0].occurred_at >= pair[1].occurred_at));
}

#[tokio::test]
async fn tick_fans_identical_batch_out_to_every_viewer() {
    let app = make_server(MemoryEventSource::with_records([record(1, 1), record(2, 2)])).await;
    assert!(matches!(app.dispatcher.tick().await, TickOutcome::Broadcast(_)));

    let mut a = MockViewer::connect(&app.ws_url()).await.unwrap();
    let mut b = MockViewer::connect(&app.ws_url()).await.unwrap();
    assert_eq!(a.recv_batch().await.unwrap().len(), 2);
    assert_eq!(b.recv_batch().await.unwrap().len(), 2);

    app.store.extend([record(3, 3), record(4, 4), record(5, 5)]);
    match app.dispatcher.tick().await {
        TickOutcome::Broadcast(report) => {
            assert_eq!(report.delivered, 2);
            assert!(report.dropped.is_empty());
        }
        other => panic!("expected broadcast, got {other:?}"),
    }

    let from_a = a.recv_batch().await.unwrap();
    let from_b = b.recv_batch().await.unwrap();
    assert_eq!(from_a, from_b);
    assert_eq!(from_a.iter().map(|e| e.id).collect::<Vec<_>>(), vec![5, 4, 3]);

    // Nothing new: nothing pushed.
    assert_eq!(app.dispatcher.tick().await, TickOutcome::Empty);
    let quiet = tokio::time::timeout(Duration::from_millis(200), a.recv_batch()).await;
    assert!(quiet.is_err(), "empty poll must not produce a frame");
}

#[tokio::test]
async fn empty_store_sends_no_bootstrap_frame() {
    let app = make_server(MemoryEventSource::new()).await;

    let mut viewer = MockViewer::connect(&app.ws_url()).await.unwrap();
    app.wait_for_clients(1).await;
    let quiet = tokio::time::timeout(Duration::from_millis(200), viewer.recv_batch()).await;
    assert!(quiet.is_err(), "no events means no bootstrap frame");

    app.store.push(record(1, 1));
    app.dispatcher.tick().await;
    assert_eq!(viewer.recv_batch().await.unwrap(), vec![record(1, 1)]);
}

#[tokio::test]
async fn store_outage_on_connect_keeps_session_open() {
    let store = MemoryEventSource::with_records([record(1, 1)]);
    store.set_failing(true);
    let app = make_server(store).await;

    let mut viewer = MockViewer::connect(&app.ws_url()).await.unwrap();
    app.wait_for_clients(1).await;

    app.store.set_failing(false);
    app.dispatcher.tick().await;
    assert_eq!(viewer.recv_batch().await.unwrap(), vec![record(1, 1)]);
}

#[tokio::test]
async fn closed_viewer_is_unregistered() {
    let app = make_server(MemoryEventSource::with_records([record(1, 1)])).await;
    app.dispatcher.tick().await;

    let mut staying = MockViewer::connect(&app.ws_url()).await.unwrap();
    let mut leaving = MockViewer::connect(&app.ws_url()).await.unwrap();
    staying.recv_batch().await.unwrap();
    leaving.recv_batch().await.unwrap();
    app.wait_for_clients(2).await;

    leaving.close().await.unwrap();
    app.wait_for_clients(1).await;

    app.store.push(record(2, 2));
    match app.dispatcher.tick().await {
        TickOutcome::Broadcast(report) => assert_eq!(report.delivered, 1),
        other => panic!("expected broadcast, got {other:?}"),
    }
    assert_eq!(staying.recv_batch().await.unwrap(), vec![record(2, 2)]);
}

#[tokio::test]
async fn health_reports_connected_viewer_count() {
    let app = make_server(MemoryEventSource::new()).await;
    let _a = MockViewer::connect(&app.ws_url()).await.unwrap();
    let _b = MockViewer::connect(&app.ws_url()).await.unwrap();
    app.wait_for_clients(2).await;

    let resp = reqwest::get(format!("http://{}/health", app.addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: HealthResponse = resp.json().await.unwrap();
    assert_eq!(body.status, "healthy");
    assert_eq!(body.clients, 2);
}
