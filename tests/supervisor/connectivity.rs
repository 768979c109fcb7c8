use crate::common::*;
use socket_resilience_reconnect::{ConnectionState, EventKind, NetworkMonitor};

#[tokio::test(start_paused = true)]
async fn abnormal_close_while_offline_suspends_reconnects() {
    let factory = MockFactory::new();
    let monitor = NetworkMonitor::new(true);
    let (socket, log) = observed_with(&factory, config_with_delays(&[0, 100]), monitor.clone());

    factory.latest().open();
    settle().await;
    monitor.set_online(false);
    factory.latest().drop_connection(1006);
    settle().await;

    assert_eq!(
        log.kinds(),
        vec![EventKind::Open, EventKind::Close, EventKind::Offline]
    );
    let status = socket.status();
    assert_eq!(status.state, ConnectionState::WaitingForNetwork);
    assert_eq!(status.attempts, 0);
    assert!(status.waiting_for_network);
    assert!(status.is_idle(), "no reconnect timer while offline");
    assert_eq!(monitor.listener_count(), 1);

    advance(60_000).await;
    assert_eq!(factory.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn coming_back_online_reconnects_once_with_first_delay() {
    let factory = MockFactory::new();
    let monitor = NetworkMonitor::new(false);
    let (socket, log) = observed_with(&factory, config_with_delays(&[0, 100]), monitor.clone());

    factory.latest().drop_connection(1006);
    settle().await;
    assert_eq!(socket.state(), ConnectionState::WaitingForNetwork);

    monitor.set_online(true);
    settle().await;

    assert_eq!(
        log.kinds(),
        vec![EventKind::Close, EventKind::Offline, EventKind::Online]
    );
    assert_eq!(factory.created(), 2);
    assert_eq!(socket.attempts(), 1);
    assert!(!socket.status().waiting_for_network);
    assert_eq!(monitor.listener_count(), 0);

    // A second transition to online has no listener left to reach.
    monitor.set_online(false);
    monitor.set_online(true);
    settle().await;
    assert_eq!(factory.created(), 2);
    assert_eq!(log.count(EventKind::Online), 1);
}

#[tokio::test(start_paused = true)]
async fn online_uses_the_first_scheduled_delay() {
    let factory = MockFactory::new();
    let monitor = NetworkMonitor::new(false);
    let (socket, _log) = observed_with(&factory, config_with_delays(&[500]), monitor.clone());

    factory.latest().drop_connection(1006);
    settle().await;
    monitor.set_online(true);
    settle().await;

    assert_eq!(socket.state(), ConnectionState::ReconnectPending);
    advance(499).await;
    assert_eq!(factory.created(), 1);
    advance(1).await;
    assert_eq!(factory.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn going_offline_resets_the_attempt_counter() {
    let factory = MockFactory::new();
    let monitor = NetworkMonitor::new(true);
    let (socket, log) = observed_with(&factory, config_with_delays(&[0, 0]), monitor.clone());

    factory.latest().drop_connection(1006);
    settle().await;
    factory.latest().drop_connection(1006);
    settle().await;
    assert_eq!(socket.attempts(), 2);

    // The schedule would be exhausted now, but the network is down.
    monitor.set_online(false);
    factory.latest().drop_connection(1006);
    settle().await;
    assert_eq!(socket.state(), ConnectionState::WaitingForNetwork);
    assert_eq!(socket.attempts(), 0);

    monitor.set_online(true);
    settle().await;
    assert_eq!(factory.created(), 4);
    assert_eq!(socket.attempts(), 1);
    assert_eq!(log.count(EventKind::Closed), 0);
}

#[tokio::test(start_paused = true)]
async fn normal_close_while_offline_is_still_terminal() {
    let factory = MockFactory::new();
    let monitor = NetworkMonitor::new(false);
    let (socket, log) = observed_with(&factory, config_with_delays(&[0]), monitor.clone());

    factory.latest().drop_connection(1000);
    settle().await;

    assert_eq!(log.kinds(), vec![EventKind::Close, EventKind::Closed]);
    assert_eq!(socket.state(), ConnectionState::ClosedNormally);
    assert_eq!(monitor.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn separate_sockets_keep_separate_timers() {
    let first_factory = MockFactory::new();
    let second_factory = MockFactory::new();
    let (first, _) = observed_socket(&first_factory, config_with_delays(&[100]));
    let (second, _) = observed_socket(&second_factory, config_with_delays(&[300]));

    first_factory.latest().drop_connection(1006);
    second_factory.latest().drop_connection(1006);
    advance(100).await;

    assert_eq!(first_factory.created(), 2);
    assert_eq!(second_factory.created(), 1);
    assert_eq!(first.state(), ConnectionState::Connecting);
    assert_eq!(second.state(), ConnectionState::ReconnectPending);

    advance(200).await;
    assert_eq!(second_factory.created(), 2);
}
