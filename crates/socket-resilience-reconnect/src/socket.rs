//! The public handle of a supervised connection.

use crate::close_code;
use crate::config::ReconnectConfig;
use crate::error::SocketError;
use crate::events::{EventKind, SocketEvent};
use crate::state::{ConnectionState, SupervisorStatus};
use crate::supervisor::{self, Shared};
use crate::transport::{BinaryType, ConnectRequest, Message, ReadyState, Transport, TransportFactory};
use socket_resilience_core::{AlwaysOnline, ConnectivitySignal, EventRegistry};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// A long-lived logical connection that survives transport drops.
///
/// The socket creates a transport through its [`TransportFactory`], enforces
/// a connect timeout, and on every abnormal close either schedules a reconnect
/// from its [`BackoffSchedule`](crate::BackoffSchedule) or, while the network is
/// down, waits for the [`ConnectivitySignal`] to report it back. Applications
/// observe all of this through one handler per [`EventKind`].
///
/// Dropping the socket destroys it.
///
/// # Examples
///
/// ```no_run
/// use socket_resilience_reconnect::{EventKind, ReconnectingSocket, SocketEvent, TransportFactory};
/// use std::sync::Arc;
///
/// # async fn example(factory: Arc<dyn TransportFactory>) -> Result<(), Box<dyn std::error::Error>> {
/// let socket = ReconnectingSocket::builder("wss://feed.example.com/live", factory)
///     .protocol("feed.v2")
///     .on(EventKind::Message, |event| {
///         if let SocketEvent::Message(message) = event {
///             println!("{:?}", message.data);
///         }
///     })
///     .connect()?;
///
/// socket.send("subscribe")?;
/// # Ok(())
/// # }
/// ```
pub struct ReconnectingSocket {
    shared: Arc<Shared>,
}

impl ReconnectingSocket {
    /// Starts building a socket for `url`.
    pub fn builder(url: impl Into<String>, factory: Arc<dyn TransportFactory>) -> SocketBuilder {
        SocketBuilder::new(url.into(), factory)
    }

    /// Validates the arguments, creates the first transport and starts
    /// supervising it.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::InvalidUrl`] or [`SocketError::InvalidProtocol`]
    /// for rejected arguments, and [`SocketError::Transport`] if the factory
    /// fails to create the first transport. No transport exists in any of
    /// these cases.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn connect(
        url: &str,
        protocols: Vec<String>,
        config: ReconnectConfig,
        factory: Arc<dyn TransportFactory>,
        connectivity: Arc<dyn ConnectivitySignal>,
    ) -> Result<Self, SocketError> {
        Self::start(
            url,
            protocols,
            config,
            factory,
            connectivity,
            EventRegistry::new(),
        )
    }

    fn start(
        url: &str,
        protocols: Vec<String>,
        config: ReconnectConfig,
        factory: Arc<dyn TransportFactory>,
        connectivity: Arc<dyn ConnectivitySignal>,
        registry: EventRegistry<SocketEvent>,
    ) -> Result<Self, SocketError> {
        let request = ConnectRequest {
            url: validate_url(url)?,
            protocols: validate_protocols(protocols)?,
        };

        let (shared, inbox) = Shared::new(request, config, factory, connectivity, registry);
        let shared = Arc::new(shared);
        shared.start()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(socket = %shared.config.name, url = %url, "socket supervisor started");

        tokio::spawn(supervisor::run(Arc::clone(&shared), inbox));
        Ok(Self { shared })
    }

    /// Forwards `data` unmodified to the live transport.
    ///
    /// Nothing is buffered or validated here. Sending while the transport is
    /// not open does whatever that transport does, which for the bundled
    /// tungstenite adapter is `Err(TransportError::NotOpen)`.
    pub fn send(&self, data: impl Into<Message>) -> Result<(), SocketError> {
        let transport = self.transport()?;
        transport.send(data.into())?;
        Ok(())
    }

    /// Closes the live transport normally.
    ///
    /// The resulting close notification ends supervision with a `closed`
    /// event.
    pub fn close(&self) -> Result<(), SocketError> {
        self.close_with(close_code::NORMAL, None)
    }

    /// Closes the live transport with `code` and an optional `reason`.
    ///
    /// The close is delegated to the transport; the notification it produces
    /// is classified like any other, so a code other than 1000 leads to a
    /// reconnect. Between transports (a reconnect pending, or waiting for the
    /// network) a code of 1000 cancels the pending reconnect and ends
    /// supervision at once with `close` and `closed`; other codes still go to
    /// the previous, already closed transport.
    pub fn close_with(&self, code: u16, reason: Option<&str>) -> Result<(), SocketError> {
        if self.shared.close_between_transports(code, reason) {
            return Ok(());
        }
        let transport = self.transport()?;
        transport.close(code, reason)?;
        Ok(())
    }

    /// Stops the socket for good.
    ///
    /// Clears both timers, drops the connectivity listener, closes the
    /// transport with code 1000 without relaying its close, and removes
    /// every handler. Afterwards `send` and `close` return
    /// [`SocketError::NotConnected`] and the attribute accessors return
    /// `None`. Calling it again has no effect.
    pub fn destroy(&self) {
        if self.shared.destroy() {
            #[cfg(feature = "tracing")]
            tracing::debug!(socket = %self.shared.config.name, "socket destroyed");
        }
    }

    /// Registers `handler` for the raw event type name, replacing any
    /// existing handler for that name. An empty name is ignored.
    pub fn on<F>(&self, event_type: &str, handler: F)
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        self.shared.registry.register(event_type, handler);
    }

    /// Registers `handler` for `kind`, replacing any existing one.
    pub fn on_event<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        self.on(kind.as_str(), handler);
    }

    /// Removes the handler for the raw event type name.
    pub fn off(&self, event_type: &str) {
        self.shared.registry.unregister(event_type);
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Returns a snapshot of the supervisor.
    pub fn status(&self) -> SupervisorStatus {
        self.shared.status()
    }

    /// Returns the supervisor state.
    pub fn state(&self) -> ConnectionState {
        self.status().state
    }

    /// Returns the reconnect attempts made since the last open.
    pub fn attempts(&self) -> u32 {
        self.status().attempts
    }

    /// Returns the configuration this socket runs with.
    pub fn config(&self) -> &ReconnectConfig {
        &self.shared.config
    }

    /// The live transport's own connection state.
    pub fn ready_state(&self) -> Option<ReadyState> {
        self.shared.live_transport().map(|t| t.ready_state())
    }

    /// Bytes queued on the live transport but not yet written.
    pub fn buffered_amount(&self) -> Option<usize> {
        self.shared.live_transport().map(|t| t.buffered_amount())
    }

    /// Extensions negotiated by the live transport.
    pub fn extensions(&self) -> Option<String> {
        self.shared.live_transport().map(|t| t.extensions())
    }

    /// Sub-protocol negotiated by the live transport.
    pub fn protocol(&self) -> Option<String> {
        self.shared.live_transport().map(|t| t.protocol())
    }

    /// Address the live transport resolved.
    pub fn url(&self) -> Option<String> {
        self.shared.live_transport().map(|t| t.url())
    }

    /// Binary representation mode of the live transport.
    pub fn binary_type(&self) -> Option<BinaryType> {
        self.shared.live_transport().map(|t| t.binary_type())
    }

    fn transport(&self) -> Result<Arc<dyn Transport>, SocketError> {
        self.shared
            .live_transport()
            .ok_or(SocketError::NotConnected)
    }
}

impl Drop for ReconnectingSocket {
    fn drop(&mut self) {
        self.shared.destroy();
    }
}

impl fmt::Debug for ReconnectingSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectingSocket")
            .field("name", &self.shared.config.name)
            .field("status", &self.shared.status())
            .finish()
    }
}

/// Builder for a [`ReconnectingSocket`].
///
/// Handlers registered here are in place before the first transport exists,
/// so no early notification can be missed.
pub struct SocketBuilder {
    url: String,
    protocols: Vec<String>,
    config: ReconnectConfig,
    factory: Arc<dyn TransportFactory>,
    connectivity: Arc<dyn ConnectivitySignal>,
    registry: EventRegistry<SocketEvent>,
}

impl SocketBuilder {
    fn new(url: String, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            url,
            protocols: Vec::new(),
            config: ReconnectConfig::default(),
            factory,
            connectivity: Arc::new(AlwaysOnline),
            registry: EventRegistry::new(),
        }
    }

    /// Requests a single sub-protocol, appended to any already requested.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Replaces the requested sub-protocols, in preference order.
    pub fn protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the configuration. Defaults apply when never called.
    pub fn config(mut self, config: ReconnectConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the connectivity signal. Defaults to [`AlwaysOnline`].
    pub fn connectivity<C>(mut self, connectivity: C) -> Self
    where
        C: ConnectivitySignal + 'static,
    {
        self.connectivity = Arc::new(connectivity);
        self
    }

    /// Registers a handler for `kind`, replacing any earlier one.
    pub fn on<F>(self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&SocketEvent) + Send + Sync + 'static,
    {
        self.registry.register(kind.as_str(), handler);
        self
    }

    /// Validates the arguments and starts the socket.
    ///
    /// See [`ReconnectingSocket::connect`] for errors and panics.
    pub fn connect(self) -> Result<ReconnectingSocket, SocketError> {
        ReconnectingSocket::start(
            &self.url,
            self.protocols,
            self.config,
            self.factory,
            self.connectivity,
            self.registry,
        )
    }
}

impl fmt::Debug for SocketBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketBuilder")
            .field("url", &self.url)
            .field("protocols", &self.protocols)
            .field("config", &self.config)
            .field("handlers", &self.registry.len())
            .finish()
    }
}

/// Checks the target address and normalizes `http(s)` to `ws(s)`.
fn validate_url(raw: &str) -> Result<String, SocketError> {
    let invalid = |reason: &str| SocketError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let mut url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(invalid(&format!(
                "scheme must be ws, wss, http or https (found '{}')",
                other
            )))
        }
    };
    if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
        return Err(invalid("scheme could not be normalized"));
    }

    if url.host_str().is_none() {
        return Err(invalid("must include a host"));
    }
    if url.fragment().is_some() {
        return Err(invalid("must not include a fragment"));
    }

    Ok(url.into())
}

/// Rejects empty and repeated sub-protocol names.
fn validate_protocols(protocols: Vec<String>) -> Result<Vec<String>, SocketError> {
    let mut seen = HashSet::with_capacity(protocols.len());
    for protocol in &protocols {
        if protocol.is_empty()
            || protocol.chars().any(|c| c.is_whitespace() || c == ',')
            || !seen.insert(protocol.as_str())
        {
            return Err(SocketError::InvalidProtocol(protocol.clone()));
        }
    }
    Ok(protocols)
}
