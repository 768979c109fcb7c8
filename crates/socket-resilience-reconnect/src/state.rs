//! Supervisor state tracking.

use crate::transport::TransportId;
use std::fmt;

/// Lifecycle state of a supervised socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// A transport was created and has not opened or closed yet.
    Connecting,

    /// The live transport is open.
    Open,

    /// The transport closed with the normal code; no reconnect follows.
    ClosedNormally,

    /// The network is down; reconnection resumes when it returns.
    WaitingForNetwork,

    /// A reconnect-delay timer is running.
    ReconnectPending,

    /// The backoff schedule ran out.
    Exhausted,

    /// `destroy()` was called.
    Destroyed,
}

impl ConnectionState {
    /// Returns true for states the supervisor never leaves.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::ClosedNormally
                | ConnectionState::Exhausted
                | ConnectionState::Destroyed
        )
    }

    /// Returns a stable lowercase name, used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::ClosedNormally => "closed_normally",
            ConnectionState::WaitingForNetwork => "waiting_for_network",
            ConnectionState::ReconnectPending => "reconnect_pending",
            ConnectionState::Exhausted => "exhausted",
            ConnectionState::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,

    /// Reconnect attempts made since the last open or offline detection.
    pub attempts: u32,

    /// Identifier of the live transport, if any.
    pub transport_id: Option<TransportId>,

    /// Whether a connect-timeout deadline is pending.
    pub connect_timer_armed: bool,

    /// Whether a reconnect-delay deadline is pending.
    pub reconnect_timer_armed: bool,

    /// Whether a connectivity listener is registered.
    pub waiting_for_network: bool,
}

impl SupervisorStatus {
    /// Returns true if no timer of either kind is pending.
    pub fn is_idle(&self) -> bool {
        !self.connect_timer_armed && !self.reconnect_timer_armed
    }
}
