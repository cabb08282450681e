use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use swarm_core::session::{Session, TickContext};
use swarm_core::transport::mock::{DialOutcome, MockConnector};
use swarm_payloads::{PayloadProvider, EVENT_REQUEST, MAIN_REQUEST};
use tokio::time::sleep;

/// Echoes derived requests back so tests can tell staged batches apart.
struct EchoProvider;

impl PayloadProvider for EchoProvider {
    fn payloads_for(&self, request: &str) -> Option<Vec<Bytes>> {
        match request {
            MAIN_REQUEST => Some(vec![Bytes::from_static(b"main")]),
            EVENT_REQUEST => Some(vec![Bytes::from_static(b"event")]),
            probe if probe.starts_with("probe:") => {
                Some(vec![Bytes::copy_from_slice(probe.as_bytes())])
            }
            _ => None,
        }
    }
}

fn ctx(connector: Arc<MockConnector>, send_events: bool) -> TickContext {
    TickContext {
        connector,
        provider: Arc::new(EchoProvider),
        send_events,
        handshake_deadline: Duration::from_millis(100),
        send_deadline: Duration::from_millis(100),
    }
}

fn session(reconnect_ms: u64, dispatch_ms: u64) -> Session {
    Session::new(
        "00c0ffee42".into(),
        Duration::from_millis(reconnect_ms),
        Duration::from_millis(dispatch_ms),
    )
}

#[tokio::test]
async fn refused_connect_is_retried_only_after_the_interval() {
    let connector = MockConnector::with_script(vec![DialOutcome::Refuse], DialOutcome::Accept);
    let ctx = ctx(connector.clone(), false);
    let mut session = session(150, 50);

    // Tick 1: the very first tick always attempts to connect.
    session.tick(&ctx).await.unwrap();
    assert_eq!(connector.attempts(), 1);
    assert!(!session.is_connected());

    // Tick 2, inside the reconnect interval: no new attempt.
    session.tick(&ctx).await.unwrap();
    assert_eq!(connector.attempts(), 1);

    // Tick 3, after the interval: attempt again, this time accepted.
    sleep(Duration::from_millis(200)).await;
    session.tick(&ctx).await.unwrap();
    assert_eq!(connector.attempts(), 2);
    assert!(session.is_connected());
}

#[tokio::test]
async fn stalled_handshake_counts_as_a_failed_attempt() {
    let connector = MockConnector::with_script(vec![DialOutcome::Stall], DialOutcome::Accept);
    let ctx = ctx(connector.clone(), false);
    let mut session = session(100, 50);

    let started = Instant::now();
    session.tick(&ctx).await.unwrap();

    // The handshake deadline (100 ms) bounds the tick.
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(!session.is_connected());
    assert_eq!(connector.attempts(), 1);

    sleep(Duration::from_millis(150)).await;
    session.tick(&ctx).await.unwrap();
    assert!(session.is_connected());
}

#[tokio::test]
async fn staged_batches_are_last_write_wins_and_drain_once() {
    let connector = MockConnector::new(DialOutcome::Accept);
    let ctx = ctx(connector.clone(), false);
    let mut session = session(100, 60);

    session.tick(&ctx).await.unwrap();
    assert!(session.is_connected());
    let transport = connector.last_transport().unwrap();

    // Two server messages arrive before the next dispatch; only the batch
    // derived from the second may survive.
    transport.push_inbound(Bytes::from_static(b"probe:first"));
    transport.push_inbound(Bytes::from_static(b"probe:second"));
    sleep(Duration::from_millis(50)).await;

    session.tick(&ctx).await.unwrap();
    let sent = transport.sent();
    assert_eq!(sent, vec![
        Bytes::from_static(b"probe:second"),
        Bytes::from_static(b"main"),
    ]);

    // The slot was drained: the following dispatch sends only the main
    // payload.
    sleep(Duration::from_millis(80)).await;
    session.tick(&ctx).await.unwrap();
    assert_eq!(transport.sent().last().unwrap(), &Bytes::from_static(b"main"));
    assert_eq!(transport.sent_count(), 3);
}

#[tokio::test]
async fn event_payloads_precede_the_main_payload() {
    let connector = MockConnector::new(DialOutcome::Accept);
    let ctx = ctx(connector.clone(), true);
    let mut session = session(100, 50);

    session.tick(&ctx).await.unwrap();
    session.tick(&ctx).await.unwrap();

    let transport = connector.last_transport().unwrap();
    assert_eq!(transport.sent(), vec![
        Bytes::from_static(b"event"),
        Bytes::from_static(b"main"),
    ]);
}

#[tokio::test]
async fn dispatches_are_rate_limited_by_the_interval() {
    let connector = MockConnector::new(DialOutcome::Accept);
    let ctx = ctx(connector.clone(), false);
    let mut session = session(100, 100);

    session.tick(&ctx).await.unwrap();
    let transport = connector.last_transport().unwrap();

    // Tick far faster than the dispatch interval for ~250 ms.
    let window = Duration::from_millis(250);
    let started = Instant::now();
    while started.elapsed() < window {
        session.tick(&ctx).await.unwrap();
        sleep(Duration::from_millis(5)).await;
    }

    // At most ceil(W / interval) + 1 dispatches over the window.
    let dispatches = transport.sent_count();
    assert!(dispatches >= 2, "expected some dispatches, got {dispatches}");
    assert!(dispatches <= 4, "too many dispatches: {dispatches}");
}

#[tokio::test]
async fn send_failures_do_not_disconnect_the_session() {
    let connector = MockConnector::new(DialOutcome::Accept);
    let ctx = ctx(connector.clone(), false);
    let mut session = session(100, 50);

    session.tick(&ctx).await.unwrap();
    let transport = connector.last_transport().unwrap();

    transport.fail_sends(true);
    session.tick(&ctx).await.unwrap();
    assert!(session.is_connected());
    assert_eq!(transport.sent_count(), 0);

    // Delivery resumes on the next due dispatch.
    transport.fail_sends(false);
    sleep(Duration::from_millis(70)).await;
    session.tick(&ctx).await.unwrap();
    assert_eq!(transport.sent_count(), 1);
}

#[tokio::test]
async fn lost_connection_is_replaced_after_the_reconnect_interval() {
    let connector = MockConnector::new(DialOutcome::Accept);
    let ctx = ctx(connector.clone(), false);
    let mut session = session(150, 50);

    session.tick(&ctx).await.unwrap();
    assert!(session.is_connected());

    sleep(Duration::from_millis(50)).await;
    connector.last_transport().unwrap().drop_connection();

    // The dead link is torn down, but reconnecting waits for the gate.
    session.tick(&ctx).await.unwrap();
    assert!(!session.is_connected());
    assert_eq!(connector.attempts(), 1);

    sleep(Duration::from_millis(150)).await;
    session.tick(&ctx).await.unwrap();
    assert!(session.is_connected());
    assert_eq!(connector.attempts(), 2);
    assert_eq!(connector.transports().len(), 2);
}
