use crate::common::*;
use socket_resilience_reconnect::{
    BackoffSchedule, ClosedReason, ConnectionState, EventKind, ReconnectConfig, SocketEvent,
};

#[tokio::test(start_paused = true)]
async fn two_step_schedule_runs_out_after_third_close() {
    let factory = MockFactory::new();
    let (socket, log) = observed_socket(&factory, config_with_delays(&[0, 100]));

    // First abnormal close: S[0] = 0, reconnect immediately.
    factory.latest().drop_connection(1006);
    settle().await;
    assert_eq!(factory.created(), 2);
    assert_eq!(socket.attempts(), 1);

    // Second abnormal close: S[1] = 100.
    factory.latest().drop_connection(1006);
    settle().await;
    assert_eq!(socket.state(), ConnectionState::ReconnectPending);
    assert!(socket.status().reconnect_timer_armed);

    advance(99).await;
    assert_eq!(factory.created(), 2, "reconnect must wait the full delay");
    advance(1).await;
    assert_eq!(factory.created(), 3);
    assert_eq!(socket.attempts(), 2);

    // Third abnormal close: schedule exhausted.
    factory.latest().drop_connection(1006);
    settle().await;

    assert_eq!(
        log.kinds(),
        vec![
            EventKind::Close,
            EventKind::Close,
            EventKind::Close,
            EventKind::Closed
        ]
    );
    match log.last() {
        Some(SocketEvent::Closed(closed)) => {
            assert_eq!(closed.reason, ClosedReason::Exhausted { attempts: 2 })
        }
        other => panic!("expected closed event, got {:?}", other),
    }
    assert_eq!(socket.state(), ConnectionState::Exhausted);
    assert!(socket.status().is_idle());

    advance(60_000).await;
    assert_eq!(factory.created(), 3, "no transport after exhaustion");
}

#[tokio::test(start_paused = true)]
async fn default_schedule_is_zero_three_ten_seconds() {
    let factory = MockFactory::new();
    let (socket, log) = observed_socket(&factory, ReconnectConfig::default());

    factory.latest().drop_connection(1006);
    settle().await;
    assert_eq!(factory.created(), 2);

    factory.latest().drop_connection(1006);
    advance(2_999).await;
    assert_eq!(factory.created(), 2);
    advance(1).await;
    assert_eq!(factory.created(), 3);

    factory.latest().drop_connection(1006);
    advance(9_999).await;
    assert_eq!(factory.created(), 3);
    advance(1).await;
    assert_eq!(factory.created(), 4);

    factory.latest().drop_connection(1006);
    settle().await;
    assert_eq!(socket.state(), ConnectionState::Exhausted);
    assert_eq!(log.count(EventKind::Close), 4);
    assert_eq!(log.count(EventKind::Closed), 1);
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_the_schedule() {
    let factory = MockFactory::new();
    let (socket, _log) = observed_socket(&factory, config_with_delays(&[0, 500]));

    factory.latest().drop_connection(1006);
    settle().await;
    assert_eq!(socket.attempts(), 1);

    factory.latest().open();
    settle().await;
    assert_eq!(socket.attempts(), 0);

    // Back at S[0]: immediate again rather than 500ms.
    factory.latest().drop_connection(1006);
    settle().await;
    assert_eq!(factory.created(), 3);
}

#[tokio::test(start_paused = true)]
async fn empty_schedule_makes_first_abnormal_close_terminal() {
    let factory = MockFactory::new();
    let config = ReconnectConfig::builder()
        .schedule(BackoffSchedule::none())
        .build();
    let (socket, log) = observed_socket(&factory, config);

    factory.latest().open();
    settle().await;
    factory.latest().drop_connection(1011);
    settle().await;

    assert_eq!(
        log.kinds(),
        vec![EventKind::Open, EventKind::Close, EventKind::Closed]
    );
    match log.last() {
        Some(SocketEvent::Closed(closed)) => {
            assert_eq!(closed.reason, ClosedReason::Exhausted { attempts: 0 })
        }
        other => panic!("expected closed event, got {:?}", other),
    }
    assert_eq!(socket.state(), ConnectionState::Exhausted);
}

#[tokio::test(start_paused = true)]
async fn factory_failure_counts_as_a_failed_attempt() {
    let factory = MockFactory::new();
    let (socket, log) = observed_socket(&factory, config_with_delays(&[0, 50]));

    factory.fail_next(1);
    factory.latest().drop_connection(1006);
    settle().await;

    // The reconnect attempt failed inside the factory.
    assert_eq!(factory.requests().len(), 2);
    assert_eq!(factory.created(), 1);
    assert_eq!(log.kinds(), vec![EventKind::Close, EventKind::Error]);
    assert_eq!(socket.state(), ConnectionState::ReconnectPending);
    assert_eq!(socket.status().transport_id, None);

    advance(50).await;
    assert_eq!(factory.created(), 2);
    assert_eq!(socket.state(), ConnectionState::Connecting);
}

#[tokio::test(start_paused = true)]
async fn factory_failures_can_exhaust_the_schedule() {
    let factory = MockFactory::new();
    let (socket, log) = observed_socket(&factory, config_with_delays(&[0, 10]));

    factory.fail_next(2);
    factory.latest().drop_connection(1006);
    advance(10).await;

    assert_eq!(factory.requests().len(), 3);
    assert_eq!(socket.state(), ConnectionState::Exhausted);
    assert_eq!(
        log.kinds(),
        vec![
            EventKind::Close,
            EventKind::Error,
            EventKind::Error,
            EventKind::Closed
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn exponential_schedule_doubles_delays() {
    let factory = MockFactory::new();
    let config = ReconnectConfig::builder()
        .schedule(BackoffSchedule::exponential(
            std::time::Duration::from_millis(100),
            std::time::Duration::from_millis(250),
            3,
        ))
        .build();
    let (_socket, _log) = observed_socket(&factory, config);

    for (expected_delay, created_after) in [(100, 2), (200, 3), (250, 4)] {
        factory.latest().drop_connection(1006);
        advance(expected_delay - 1).await;
        assert_eq!(factory.created(), created_after - 1);
        advance(1).await;
        assert_eq!(factory.created(), created_after);
    }
}
