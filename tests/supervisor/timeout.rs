use crate::common::*;
use socket_resilience_reconnect::{
    ClosedReason, ConnectionState, EventKind, ReconnectConfig, SocketEvent,
};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn stalled_connect_is_force_closed_with_4000() {
    let factory = MockFactory::new();
    let (socket, log) = observed_socket(&factory, ReconnectConfig::default());
    let stalled = factory.latest();

    advance(2_499).await;
    assert!(stalled.close_calls().is_empty());

    advance(1).await;
    assert_eq!(
        stalled.close_calls(),
        vec![(4000, Some("connect timeout".to_string()))]
    );
    match &log.events()[0] {
        SocketEvent::Close(close) => {
            assert_eq!(close.code, 4000);
            assert_eq!(close.transport_id, stalled.id());
        }
        other => panic!("expected close event, got {:?}", other),
    }

    // Classified like any abnormal close: S[0] = 0 reconnects at once.
    assert_eq!(factory.created(), 2);
    assert_eq!(socket.state(), ConnectionState::Connecting);
    assert!(socket.status().connect_timer_armed);
}

#[tokio::test(start_paused = true)]
async fn opened_connection_is_never_timed_out() {
    let factory = MockFactory::new();
    let (socket, _log) = observed_socket(&factory, ReconnectConfig::default());

    advance(1_000).await;
    factory.latest().open();
    settle().await;
    advance(10_000).await;

    assert!(factory.latest().close_calls().is_empty());
    assert_eq!(socket.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn custom_timeout_is_honored() {
    let factory = MockFactory::new();
    let config = ReconnectConfig::builder()
        .connect_timeout(Duration::from_millis(300))
        .build();
    let (_socket, _log) = observed_socket(&factory, config);

    advance(300).await;
    assert_eq!(factory.transport(0).close_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn every_attempt_gets_its_own_timeout() {
    let factory = MockFactory::new();
    let config = ReconnectConfig::builder()
        .connect_timeout(Duration::from_millis(100))
        .reconnect_delays([Duration::from_millis(50)])
        .build();
    let (socket, log) = observed_socket(&factory, config);

    // Attempt 1 times out, waits 50ms, attempt 2 times out, schedule exhausted.
    advance(100).await;
    advance(50).await;
    assert_eq!(factory.created(), 2);
    advance(100).await;

    assert_eq!(
        log.kinds(),
        vec![EventKind::Close, EventKind::Close, EventKind::Closed]
    );
    match log.last() {
        Some(SocketEvent::Closed(closed)) => {
            assert_eq!(closed.reason, ClosedReason::Exhausted { attempts: 1 })
        }
        other => panic!("expected closed event, got {:?}", other),
    }
    assert_eq!(socket.state(), ConnectionState::Exhausted);
}

#[tokio::test(start_paused = true)]
async fn transport_refusing_close_still_takes_the_close_path() {
    let factory = MockFactory::new();
    let (socket, log) = observed_socket(&factory, config_with_delays(&[250]));
    factory.latest().reject_close();

    advance(2_500).await;

    match &log.events()[..] {
        [SocketEvent::Close(close)] => {
            assert_eq!(close.code, 4000);
            assert!(!close.was_clean);
        }
        other => panic!("expected a single close event, got {:?}", other),
    }
    assert_eq!(socket.state(), ConnectionState::ReconnectPending);

    advance(250).await;
    assert_eq!(factory.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn close_arriving_after_open_does_not_rearm_timeout() {
    let factory = MockFactory::new();
    let (socket, _log) = observed_socket(&factory, config_with_delays(&[100]));

    factory.latest().open();
    settle().await;
    factory.latest().drop_connection(1006);
    settle().await;

    let status = socket.status();
    assert!(!status.connect_timer_armed);
    assert!(status.reconnect_timer_armed);
}
