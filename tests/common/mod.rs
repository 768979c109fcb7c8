//! Scripted in-memory transport shared by the integration tests.
//!
//! `MockFactory` records every connect request and hands out `MockTransport`s
//! that tests drive by hand: open them, drop them with a code, push messages
//! or errors. Time is controlled with `#[tokio::test(start_paused = true)]`.

#![allow(dead_code)]

use socket_resilience_reconnect::{
    BinaryType, ConnectRequest, EventKind, Message, ReadyState, ReconnectConfig,
    ReconnectingSocket, SocketEvent, Transport, TransportError, TransportEvents, TransportFactory,
    TransportId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const URL: &str = "ws://mock.test/socket";

struct MockState {
    ready_state: ReadyState,
    sent: Vec<Message>,
    close_calls: Vec<(u16, Option<String>)>,
    binary_type: BinaryType,
    protocol: String,
}

/// A transport whose notifications are fired by the test.
pub struct MockTransport {
    pub events: TransportEvents,
    url: String,
    state: Mutex<MockState>,
    reject_close: AtomicBool,
}

impl MockTransport {
    fn new(url: String, events: TransportEvents) -> Self {
        Self {
            events,
            url,
            state: Mutex::new(MockState {
                ready_state: ReadyState::Connecting,
                sent: Vec::new(),
                close_calls: Vec::new(),
                binary_type: BinaryType::default(),
                protocol: String::new(),
            }),
            reject_close: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> TransportId {
        self.events.id()
    }

    pub fn open(&self) {
        self.open_with_protocol("");
    }

    pub fn open_with_protocol(&self, protocol: &str) {
        {
            let mut state = self.state.lock().unwrap();
            state.ready_state = ReadyState::Open;
            state.protocol = protocol.to_string();
        }
        self.events.opened(protocol);
    }

    /// Simulates the peer or network ending the connection.
    pub fn drop_connection(&self, code: u16) {
        self.state.lock().unwrap().ready_state = ReadyState::Closed;
        self.events.closed(code, "", code == 1000);
    }

    pub fn receive(&self, data: impl Into<Message>) {
        self.events.message(data.into());
    }

    pub fn fail(&self, message: &str) {
        self.events.error(message);
    }

    /// Makes `close` return an error without reporting a close.
    pub fn reject_close(&self) {
        self.reject_close.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Message> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn close_calls(&self) -> Vec<(u16, Option<String>)> {
        self.state.lock().unwrap().close_calls.clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, data: Message) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.ready_state != ReadyState::Open {
            return Err(TransportError::NotOpen);
        }
        state.sent.push(data);
        Ok(())
    }

    fn close(&self, code: u16, reason: Option<&str>) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock().unwrap();
            state.close_calls.push((code, reason.map(str::to_string)));
            if self.reject_close.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            state.ready_state = ReadyState::Closed;
        }
        self.events.closed(code, reason.unwrap_or_default(), true);
        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().unwrap().ready_state
    }

    fn buffered_amount(&self) -> usize {
        self.state.lock().unwrap().sent.iter().map(Message::len).sum()
    }

    fn extensions(&self) -> String {
        String::new()
    }

    fn protocol(&self) -> String {
        self.state.lock().unwrap().protocol.clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn binary_type(&self) -> BinaryType {
        self.state.lock().unwrap().binary_type
    }

    fn set_binary_type(&self, binary_type: BinaryType) {
        self.state.lock().unwrap().binary_type = binary_type;
    }
}

#[derive(Default)]
struct FactoryState {
    requests: Vec<ConnectRequest>,
    transports: Vec<Arc<MockTransport>>,
    failures: usize,
}

/// Factory that records requests and can be scripted to fail.
#[derive(Clone, Default)]
pub struct MockFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` connect calls fail.
    pub fn fail_next(&self, n: usize) {
        self.state.lock().unwrap().failures = n;
    }

    /// Number of transports created.
    pub fn created(&self) -> usize {
        self.state.lock().unwrap().transports.len()
    }

    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn transport(&self, index: usize) -> Arc<MockTransport> {
        Arc::clone(&self.state.lock().unwrap().transports[index])
    }

    pub fn latest(&self) -> Arc<MockTransport> {
        let state = self.state.lock().unwrap();
        Arc::clone(state.transports.last().expect("no transport created"))
    }
}

impl TransportFactory for MockFactory {
    fn connect(
        &self,
        request: &ConnectRequest,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        if state.failures > 0 {
            state.failures -= 1;
            return Err(TransportError::Connect("scripted failure".to_string()));
        }
        let transport = Arc::new(MockTransport::new(request.url.clone(), events));
        state.transports.push(Arc::clone(&transport));
        let handle: Arc<dyn Transport> = transport;
        Ok(handle)
    }
}

/// Records every event a socket emits.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SocketEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorder(&self) -> impl Fn(&SocketEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event| events.lock().unwrap().push(event.clone())
    }

    pub fn events(&self) -> Vec<SocketEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(SocketEvent::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub fn last(&self) -> Option<SocketEvent> {
        self.events.lock().unwrap().last().cloned()
    }
}

/// Builds a socket against `factory` with every event kind recorded.
pub fn observed_socket(
    factory: &MockFactory,
    config: ReconnectConfig,
) -> (ReconnectingSocket, EventLog) {
    observed_with(factory, config, socket_resilience_reconnect::AlwaysOnline)
}

/// Like [`observed_socket`] with an explicit connectivity signal.
pub fn observed_with<C>(
    factory: &MockFactory,
    config: ReconnectConfig,
    connectivity: C,
) -> (ReconnectingSocket, EventLog)
where
    C: socket_resilience_reconnect::ConnectivitySignal + 'static,
{
    let log = EventLog::new();
    let mut builder = ReconnectingSocket::builder(URL, Arc::new(factory.clone()))
        .config(config)
        .connectivity(connectivity);
    for kind in EventKind::ALL {
        builder = builder.on(kind, log.recorder());
    }
    (builder.connect().expect("socket should start"), log)
}

/// Config with an explicit schedule and a name for log output.
pub fn config_with_delays(delays: &[u64]) -> ReconnectConfig {
    ReconnectConfig::builder()
        .name("test-socket")
        .reconnect_delays(delays.iter().map(|ms| Duration::from_millis(*ms)))
        .build()
}

/// Lets the supervisor task drain its inbox and fire due deadlines.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advances paused time by `ms` and lets the supervisor react.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}
