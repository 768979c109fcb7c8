//! The connection supervision state machine.
//!
//! All supervisor state sits behind one mutex in [`Shared`]. A single task
//! ([`run`]) serializes every input: transport notifications and connectivity
//! notifications arrive through an unbounded inbox, and the two timers are
//! plain deadlines stored in that state. Cancelling a timer means clearing its
//! deadline under the lock, which is why `destroy()` can cancel synchronously
//! from any thread.
//!
//! Handlers and the state-change callback are user code. They are collected as
//! [`Effect`]s while the lock is held and run only after it is released, so a
//! handler may call back into the socket.

use crate::close_code;
use crate::config::ReconnectConfig;
use crate::error::TransportError;
use crate::events::{
    CloseEvent, ClosedEvent, ClosedReason, ErrorEvent, MessageEvent, OpenEvent, SocketEvent,
};
use crate::state::{ConnectionState, SupervisorStatus};
use crate::transport::{
    ConnectRequest, Message, ReadyState, Transport, TransportEvents, TransportFactory, TransportId,
};
use socket_resilience_core::{ConnectivitySignal, EventRegistry, ListenerId};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant as StdInstant;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Inputs delivered to the supervisor task.
pub(crate) enum Inbound {
    Transport {
        id: TransportId,
        notification: Notification,
    },
    Online {
        generation: u64,
    },
}

/// A notification from one transport.
#[derive(Debug)]
pub(crate) enum Notification {
    Open {
        protocol: String,
    },
    Close {
        code: u16,
        reason: String,
        was_clean: bool,
    },
    Error {
        message: String,
    },
    Message(Message),
}

/// Work deferred until the state lock is released.
enum Effect {
    Transition(ConnectionState, ConnectionState),
    Emit(SocketEvent),
}

struct LiveTransport {
    id: TransportId,
    handle: Arc<dyn Transport>,
}

struct Inner {
    state: ConnectionState,
    attempts: u32,
    transport: Option<LiveTransport>,
    next_transport_id: u64,
    connect_deadline: Option<Instant>,
    reconnect_deadline: Option<Instant>,
    online_listener: Option<ListenerId>,
    online_generation: u64,
}

/// State shared between the public handle and the supervisor task.
pub(crate) struct Shared {
    inner: Mutex<Inner>,
    wake: Notify,
    inbox: mpsc::UnboundedSender<Inbound>,
    pub(crate) registry: EventRegistry<SocketEvent>,
    pub(crate) config: ReconnectConfig,
    request: ConnectRequest,
    factory: Arc<dyn TransportFactory>,
    connectivity: Arc<dyn ConnectivitySignal>,
}

impl Shared {
    pub(crate) fn new(
        request: ConnectRequest,
        config: ReconnectConfig,
        factory: Arc<dyn TransportFactory>,
        connectivity: Arc<dyn ConnectivitySignal>,
        registry: EventRegistry<SocketEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (inbox, receiver) = mpsc::unbounded_channel();
        let shared = Self {
            inner: Mutex::new(Inner {
                state: ConnectionState::Connecting,
                attempts: 0,
                transport: None,
                next_transport_id: 0,
                connect_deadline: None,
                reconnect_deadline: None,
                online_listener: None,
                online_generation: 0,
            }),
            wake: Notify::new(),
            inbox,
            registry,
            config,
            request,
            factory,
            connectivity,
        };
        (shared, receiver)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // User code never runs under this lock; a poisoned guard still holds
        // a consistent state machine.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates the first transport. Called once, before the task starts.
    pub(crate) fn start(&self) -> Result<(), TransportError> {
        let mut effects = Vec::new();
        let result = {
            let mut inner = self.lock();
            self.open_transport(&mut inner, &mut effects)
        };
        self.apply(effects);
        result
    }

    pub(crate) fn status(&self) -> SupervisorStatus {
        let inner = self.lock();
        SupervisorStatus {
            state: inner.state,
            attempts: inner.attempts,
            transport_id: inner.transport.as_ref().map(|live| live.id),
            connect_timer_armed: inner.connect_deadline.is_some(),
            reconnect_timer_armed: inner.reconnect_deadline.is_some(),
            waiting_for_network: inner.online_listener.is_some(),
        }
    }

    pub(crate) fn live_transport(&self) -> Option<Arc<dyn Transport>> {
        self.lock()
            .transport
            .as_ref()
            .map(|live| Arc::clone(&live.handle))
    }

    /// Tears the supervisor down. Returns false if it was already destroyed.
    pub(crate) fn destroy(&self) -> bool {
        let mut effects = Vec::new();
        {
            let mut inner = self.lock();
            if inner.state == ConnectionState::Destroyed {
                return false;
            }

            inner.connect_deadline = None;
            inner.reconnect_deadline = None;
            if let Some(id) = inner.online_listener.take() {
                self.connectivity.unsubscribe_online(id);
            }

            // Taking the transport out of the slot detaches its notifications:
            // anything it reports from now on has no live id to match.
            if let Some(live) = inner.transport.take() {
                let closing = matches!(
                    live.handle.ready_state(),
                    ReadyState::Closing | ReadyState::Closed
                );
                if !closing {
                    if let Err(_error) = live.handle.close(close_code::NORMAL, Some("destroyed")) {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            socket = %self.config.name,
                            transport = %live.id,
                            error = %_error,
                            "transport rejected close during destroy"
                        );
                    }
                }
            }

            self.transition(&mut inner, ConnectionState::Destroyed, &mut effects);
        }

        self.registry.clear();
        self.wake.notify_one();

        // Only the state-change callback can still observe this.
        self.apply(effects);
        true
    }

    /// Ends supervision with a normal close while no transport is live.
    ///
    /// Between transports the previous one has already closed and would never
    /// report this close, so the supervisor records it directly. Returns false
    /// when `code` is not normal or a transport is connecting or open; the
    /// caller then delegates to the transport.
    pub(crate) fn close_between_transports(&self, code: u16, reason: Option<&str>) -> bool {
        if !close_code::is_normal(code) {
            return false;
        }

        let mut effects = Vec::new();
        {
            let mut inner = self.lock();
            if !matches!(
                inner.state,
                ConnectionState::ReconnectPending | ConnectionState::WaitingForNetwork
            ) {
                return false;
            }

            inner.reconnect_deadline = None;
            if let Some(id) = inner.online_listener.take() {
                self.connectivity.unsubscribe_online(id);
            }

            let transport_id = inner
                .transport
                .as_ref()
                .map(|live| live.id)
                .unwrap_or_else(|| TransportId::new(inner.next_transport_id));
            let event = CloseEvent {
                transport_id,
                code,
                reason: reason.unwrap_or_default().to_string(),
                was_clean: true,
                timestamp: StdInstant::now(),
            };
            self.on_close(&mut inner, event, &mut effects);
        }

        self.wake.notify_one();
        self.apply(effects);
        true
    }

    fn handle(&self, inbound: Inbound) {
        let mut effects = Vec::new();
        {
            let mut inner = self.lock();
            match inbound {
                Inbound::Transport { id, notification } => {
                    self.on_transport(&mut inner, id, notification, &mut effects)
                }
                Inbound::Online { generation } => {
                    self.on_online(&mut inner, generation, &mut effects)
                }
            }
        }
        self.apply(effects);
    }

    fn on_transport(
        &self,
        inner: &mut Inner,
        id: TransportId,
        notification: Notification,
        effects: &mut Vec<Effect>,
    ) {
        let live = inner.transport.as_ref().map(|live| live.id);
        if live != Some(id) || inner.state == ConnectionState::Destroyed {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                socket = %self.config.name,
                transport = %id,
                ?notification,
                "ignoring notification from superseded transport"
            );
            return;
        }

        match notification {
            Notification::Open { protocol } => {
                if inner.state != ConnectionState::Connecting {
                    return;
                }
                inner.connect_deadline = None;
                inner.attempts = 0;
                self.transition(inner, ConnectionState::Open, effects);
                effects.push(Effect::Emit(SocketEvent::Open(OpenEvent {
                    transport_id: id,
                    protocol,
                    timestamp: StdInstant::now(),
                })));
            }
            Notification::Close {
                code,
                reason,
                was_clean,
            } => {
                if !matches!(
                    inner.state,
                    ConnectionState::Connecting | ConnectionState::Open
                ) {
                    return;
                }
                let event = CloseEvent {
                    transport_id: id,
                    code,
                    reason,
                    was_clean,
                    timestamp: StdInstant::now(),
                };
                self.on_close(inner, event, effects);
            }
            Notification::Error { message } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(socket = %self.config.name, transport = %id, %message, "transport error");

                effects.push(Effect::Emit(SocketEvent::Error(ErrorEvent {
                    transport_id: id,
                    message,
                    timestamp: StdInstant::now(),
                })));
            }
            Notification::Message(data) => {
                if inner.state != ConnectionState::Open {
                    return;
                }
                effects.push(Effect::Emit(SocketEvent::Message(MessageEvent {
                    transport_id: id,
                    data,
                    timestamp: StdInstant::now(),
                })));
            }
        }
    }

    fn on_close(&self, inner: &mut Inner, event: CloseEvent, effects: &mut Vec<Effect>) {
        inner.connect_deadline = None;

        let code = event.code;
        let reason = event.reason.clone();
        effects.push(Effect::Emit(SocketEvent::Close(event)));

        if close_code::is_normal(code) {
            self.transition(inner, ConnectionState::ClosedNormally, effects);
            effects.push(Effect::Emit(SocketEvent::Closed(ClosedEvent {
                reason: ClosedReason::Normal { code, reason },
                timestamp: StdInstant::now(),
            })));
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(socket = %self.config.name, code, %reason, "abnormal closure");

        self.after_abnormal_close(inner, effects);
    }

    fn after_abnormal_close(&self, inner: &mut Inner, effects: &mut Vec<Effect>) {
        if !self.connectivity.is_online() {
            #[cfg(feature = "tracing")]
            tracing::warn!(socket = %self.config.name, "network offline; suspending reconnects");

            inner.attempts = 0;
            effects.push(Effect::Emit(SocketEvent::Offline {
                timestamp: StdInstant::now(),
            }));
            self.transition(inner, ConnectionState::WaitingForNetwork, effects);
            self.subscribe_online(inner);
            return;
        }

        self.schedule_reconnect(inner, effects);
    }

    fn subscribe_online(&self, inner: &mut Inner) {
        inner.online_generation += 1;
        let generation = inner.online_generation;

        let inbox = self.inbox.clone();
        let id = self.connectivity.subscribe_online(Box::new(move || {
            let _ = inbox.send(Inbound::Online { generation });
        }));
        inner.online_listener = Some(id);

        // The network may have come back between the status check and the
        // subscription; that transition would never reach the listener.
        if self.connectivity.is_online() {
            let _ = self.inbox.send(Inbound::Online { generation });
        }
    }

    fn on_online(&self, inner: &mut Inner, generation: u64, effects: &mut Vec<Effect>) {
        if inner.state != ConnectionState::WaitingForNetwork
            || inner.online_generation != generation
        {
            return;
        }
        let Some(id) = inner.online_listener.take() else {
            return;
        };
        self.connectivity.unsubscribe_online(id);

        #[cfg(feature = "tracing")]
        tracing::info!(socket = %self.config.name, "network online; resuming reconnects");

        effects.push(Effect::Emit(SocketEvent::Online {
            timestamp: StdInstant::now(),
        }));
        self.schedule_reconnect(inner, effects);
    }

    fn schedule_reconnect(&self, inner: &mut Inner, effects: &mut Vec<Effect>) {
        let Some(delay) = self.config.schedule.delay(inner.attempts as usize) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                socket = %self.config.name,
                attempts = inner.attempts,
                "reconnect schedule exhausted"
            );

            inner.reconnect_deadline = None;
            self.transition(inner, ConnectionState::Exhausted, effects);
            effects.push(Effect::Emit(SocketEvent::Closed(ClosedEvent {
                reason: ClosedReason::Exhausted {
                    attempts: inner.attempts,
                },
                timestamp: StdInstant::now(),
            })));
            return;
        };

        inner.attempts += 1;
        inner.reconnect_deadline = Some(Instant::now() + delay);
        self.transition(inner, ConnectionState::ReconnectPending, effects);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            socket = %self.config.name,
            attempt = inner.attempts,
            ?delay,
            "reconnect scheduled"
        );

        #[cfg(feature = "metrics")]
        counter!("socket_reconnect_attempts_total", "socket" => self.config.name.clone())
            .increment(1);
    }

    fn open_transport(
        &self,
        inner: &mut Inner,
        effects: &mut Vec<Effect>,
    ) -> Result<(), TransportError> {
        inner.next_transport_id += 1;
        let id = TransportId::new(inner.next_transport_id);
        let events = TransportEvents::new(id, self.inbox.clone());

        let handle = self.factory.connect(&self.request, events)?;
        handle.set_binary_type(self.config.binary_type);

        #[cfg(feature = "tracing")]
        tracing::debug!(socket = %self.config.name, transport = %id, url = %self.request.url, "transport created");

        inner.transport = Some(LiveTransport { id, handle });
        inner.connect_deadline = Some(Instant::now() + self.config.connect_timeout);
        self.transition(inner, ConnectionState::Connecting, effects);
        Ok(())
    }

    fn reconnect_timer_fired(&self) {
        let mut effects = Vec::new();
        {
            let mut inner = self.lock();
            if !deadline_passed(inner.reconnect_deadline) {
                return;
            }
            inner.reconnect_deadline = None;
            if inner.state != ConnectionState::ReconnectPending {
                return;
            }

            // The previous transport already closed; drop it before its
            // successor exists.
            inner.transport = None;

            if let Err(error) = self.open_transport(&mut inner, &mut effects) {
                #[cfg(feature = "tracing")]
                tracing::warn!(socket = %self.config.name, %error, "transport creation failed");

                effects.push(Effect::Emit(SocketEvent::Error(ErrorEvent {
                    transport_id: TransportId::new(inner.next_transport_id),
                    message: error.to_string(),
                    timestamp: StdInstant::now(),
                })));
                self.after_abnormal_close(&mut inner, &mut effects);
            }
        }
        self.apply(effects);
    }

    fn connect_timer_fired(&self) {
        let mut effects = Vec::new();
        {
            let mut inner = self.lock();
            if !deadline_passed(inner.connect_deadline) {
                return;
            }
            inner.connect_deadline = None;
            if inner.state != ConnectionState::Connecting {
                return;
            }
            let Some((id, handle)) = inner
                .transport
                .as_ref()
                .map(|live| (live.id, Arc::clone(&live.handle)))
            else {
                return;
            };

            #[cfg(feature = "tracing")]
            tracing::warn!(
                socket = %self.config.name,
                transport = %id,
                timeout = ?self.config.connect_timeout,
                "connect timed out; forcing close"
            );

            #[cfg(feature = "metrics")]
            counter!("socket_connect_timeouts_total", "socket" => self.config.name.clone())
                .increment(1);

            if handle
                .close(close_code::CONNECT_TIMEOUT, Some("connect timeout"))
                .is_err()
            {
                // The transport will not report this close; take the same
                // path it would have.
                let event = CloseEvent {
                    transport_id: id,
                    code: close_code::CONNECT_TIMEOUT,
                    reason: "connect timeout".to_string(),
                    was_clean: false,
                    timestamp: StdInstant::now(),
                };
                self.on_close(&mut inner, event, &mut effects);
            }
        }
        self.apply(effects);
    }

    fn transition(&self, inner: &mut Inner, to: ConnectionState, effects: &mut Vec<Effect>) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;

        #[cfg(feature = "tracing")]
        tracing::info!(socket = %self.config.name, %from, %to, "socket state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "socket_transitions_total",
                "socket" => self.config.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);

            gauge!("socket_state", "socket" => self.config.name.clone(), "state" => to.as_str())
                .set(1.0);
            gauge!("socket_state", "socket" => self.config.name.clone(), "state" => from.as_str())
                .set(0.0);
        }

        effects.push(Effect::Transition(from, to));
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Transition(from, to) => {
                    if let Some(callback) = &self.config.on_state_change {
                        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            callback(from, to)
                        }));
                    }
                }
                Effect::Emit(event) => {
                    self.registry.emit(&event);
                }
            }
        }
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| deadline <= Instant::now())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drives one supervisor until it reaches a terminal state.
pub(crate) async fn run(shared: Arc<Shared>, mut inbox: mpsc::UnboundedReceiver<Inbound>) {
    loop {
        let (connect_at, reconnect_at) = {
            let inner = shared.lock();
            if inner.state.is_terminal() {
                break;
            }
            (inner.connect_deadline, inner.reconnect_deadline)
        };

        tokio::select! {
            biased;

            // Deadlines changed outside this task (destroy); re-read them.
            _ = shared.wake.notified() => {}

            inbound = inbox.recv() => match inbound {
                Some(inbound) => shared.handle(inbound),
                None => break,
            },

            _ = sleep_until(connect_at) => shared.connect_timer_fired(),

            _ = sleep_until(reconnect_at) => shared.reconnect_timer_fired(),
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(socket = %shared.config.name, "supervisor stopped");
}
