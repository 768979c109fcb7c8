use crate::schedule::BackoffSchedule;
use crate::state::ConnectionState;
use crate::transport::BinaryType;
use std::sync::Arc;
use std::time::Duration;

/// Default time allowed for a connection attempt before it is force-closed.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2500);

/// Callback invoked on every supervisor state transition.
pub type StateChangeCallback = Arc<dyn Fn(ConnectionState, ConnectionState) + Send + Sync>;

/// Configuration for a reconnecting socket.
///
/// Every field is optional; `ReconnectConfig::default()` is a complete,
/// valid configuration.
#[derive(Clone)]
pub struct ReconnectConfig {
    /// Instance name used in logs and metric labels.
    pub(crate) name: String,

    /// How received binary payloads are exposed.
    pub(crate) binary_type: BinaryType,

    /// Time allowed for a connection attempt to open.
    pub(crate) connect_timeout: Duration,

    /// Delays consulted by reconnect attempt index.
    pub(crate) schedule: BackoffSchedule,

    /// Optional callback for state transitions.
    pub(crate) on_state_change: Option<StateChangeCallback>,
}

impl std::fmt::Debug for ReconnectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectConfig")
            .field("name", &self.name)
            .field("binary_type", &self.binary_type)
            .field("connect_timeout", &self.connect_timeout)
            .field("schedule", &self.schedule)
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}

impl ReconnectConfig {
    /// Creates a new builder for configuring reconnection behavior.
    pub fn builder() -> ReconnectConfigBuilder {
        ReconnectConfigBuilder::default()
    }

    /// Returns the instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the binary representation mode applied to every transport.
    pub fn binary_type(&self) -> BinaryType {
        self.binary_type
    }

    /// Returns the connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the reconnect schedule.
    pub fn schedule(&self) -> &BackoffSchedule {
        &self.schedule
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfigBuilder::default().build()
    }
}

/// Builder for constructing a `ReconnectConfig`.
pub struct ReconnectConfigBuilder {
    name: String,
    binary_type: BinaryType,
    connect_timeout: Duration,
    schedule: BackoffSchedule,
    on_state_change: Option<StateChangeCallback>,
}

impl std::fmt::Debug for ReconnectConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectConfigBuilder")
            .field("name", &self.name)
            .field("binary_type", &self.binary_type)
            .field("connect_timeout", &self.connect_timeout)
            .field("schedule", &self.schedule)
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}

impl ReconnectConfigBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Defaults:
    /// - name: `"<unnamed>"`
    /// - binary_type: `Blob`
    /// - connect_timeout: 2500ms
    /// - schedule: `[0ms, 3000ms, 10000ms]`
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name for this socket (used in logs and metrics).
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Sets how received binary payloads are exposed.
    pub fn binary_type(mut self, binary_type: BinaryType) -> Self {
        self.binary_type = binary_type;
        self
    }

    /// Sets the time allowed for a connection attempt to open.
    ///
    /// # Examples
    ///
    /// ```
    /// use socket_resilience_reconnect::ReconnectConfig;
    /// use std::time::Duration;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .connect_timeout(Duration::from_secs(5))
    ///     .build();
    /// assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    /// ```
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the reconnect schedule, replacing the default entirely.
    ///
    /// # Examples
    ///
    /// ```
    /// use socket_resilience_reconnect::{BackoffSchedule, ReconnectConfig};
    /// use std::time::Duration;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .schedule(BackoffSchedule::exponential(
    ///         Duration::from_millis(100),
    ///         Duration::from_secs(10),
    ///         8,
    ///     ))
    ///     .build();
    /// assert_eq!(config.schedule().len(), 8);
    /// ```
    pub fn schedule(mut self, schedule: BackoffSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Sets the reconnect schedule from explicit delays.
    pub fn reconnect_delays<I>(mut self, delays: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
    {
        self.schedule = delays.into_iter().collect();
        self
    }

    /// Sets a callback to be invoked on state transitions.
    ///
    /// The callback receives the old and new states. It runs on the
    /// supervisor task, never while supervisor state is locked.
    ///
    /// # Examples
    ///
    /// ```
    /// use socket_resilience_reconnect::ReconnectConfig;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .on_state_change(|from, to| {
    ///         println!("State changed: {} -> {}", from, to);
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(ConnectionState, ConnectionState) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(callback));
        self
    }

    /// Builds the `ReconnectConfig`.
    pub fn build(self) -> ReconnectConfig {
        ReconnectConfig {
            name: self.name,
            binary_type: self.binary_type,
            connect_timeout: self.connect_timeout,
            schedule: self.schedule,
            on_state_change: self.on_state_change,
        }
    }
}

impl Default for ReconnectConfigBuilder {
    fn default() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            binary_type: BinaryType::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            schedule: BackoffSchedule::default(),
            on_state_change: None,
        }
    }
}
