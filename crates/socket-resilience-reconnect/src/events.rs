use crate::transport::{Message, TransportId};
use socket_resilience_core::events::Event;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// The event types a [`ReconnectingSocket`](crate::ReconnectingSocket) emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The live transport opened.
    Open,
    /// A transport closed, for any reason. Fires before classification.
    Close,
    /// No further reconnection will happen.
    Closed,
    /// Connectivity was lost; reconnection is suspended.
    Offline,
    /// Connectivity returned; reconnection resumes.
    Online,
    /// The transport reported an error.
    Error,
    /// A message arrived.
    Message,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [EventKind; 7] = [
        EventKind::Open,
        EventKind::Close,
        EventKind::Closed,
        EventKind::Offline,
        EventKind::Online,
        EventKind::Error,
        EventKind::Message,
    ];

    /// Returns the registry key for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Close => "close",
            EventKind::Closed => "closed",
            EventKind::Offline => "offline",
            EventKind::Online => "online",
            EventKind::Error => "error",
            EventKind::Message => "message",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown event type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

/// Payload of an `open` event.
#[derive(Debug, Clone)]
pub struct OpenEvent {
    pub transport_id: TransportId,
    /// Negotiated sub-protocol, empty if none.
    pub protocol: String,
    pub timestamp: Instant,
}

/// Payload of a `close` event, exactly as reported by the transport.
#[derive(Debug, Clone)]
pub struct CloseEvent {
    pub transport_id: TransportId,
    pub code: u16,
    pub reason: String,
    pub was_clean: bool,
    pub timestamp: Instant,
}

/// Why the socket stopped for good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosedReason {
    /// The transport closed with the normal code.
    Normal { code: u16, reason: String },
    /// The backoff schedule ran out after `attempts` reconnects.
    Exhausted { attempts: u32 },
}

/// Payload of a `closed` event.
#[derive(Debug, Clone)]
pub struct ClosedEvent {
    pub reason: ClosedReason,
    pub timestamp: Instant,
}

/// Payload of an `error` event.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub transport_id: TransportId,
    pub message: String,
    pub timestamp: Instant,
}

/// Payload of a `message` event. `data` is relayed unmodified.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub transport_id: TransportId,
    pub data: Message,
    pub timestamp: Instant,
}

/// Lifecycle events emitted by a supervised socket.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    Open(OpenEvent),
    Close(CloseEvent),
    Closed(ClosedEvent),
    Offline { timestamp: Instant },
    Online { timestamp: Instant },
    Error(ErrorEvent),
    Message(MessageEvent),
}

impl SocketEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            SocketEvent::Open(_) => EventKind::Open,
            SocketEvent::Close(_) => EventKind::Close,
            SocketEvent::Closed(_) => EventKind::Closed,
            SocketEvent::Offline { .. } => EventKind::Offline,
            SocketEvent::Online { .. } => EventKind::Online,
            SocketEvent::Error(_) => EventKind::Error,
            SocketEvent::Message(_) => EventKind::Message,
        }
    }

    /// Returns the transport this event came from, if it came from one.
    pub fn transport_id(&self) -> Option<TransportId> {
        match self {
            SocketEvent::Open(e) => Some(e.transport_id),
            SocketEvent::Close(e) => Some(e.transport_id),
            SocketEvent::Error(e) => Some(e.transport_id),
            SocketEvent::Message(e) => Some(e.transport_id),
            SocketEvent::Closed(_) | SocketEvent::Offline { .. } | SocketEvent::Online { .. } => {
                None
            }
        }
    }
}

impl Event for SocketEvent {
    fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    fn timestamp(&self) -> Instant {
        match self {
            SocketEvent::Open(OpenEvent { timestamp, .. })
            | SocketEvent::Close(CloseEvent { timestamp, .. })
            | SocketEvent::Closed(ClosedEvent { timestamp, .. })
            | SocketEvent::Offline { timestamp }
            | SocketEvent::Online { timestamp }
            | SocketEvent::Error(ErrorEvent { timestamp, .. })
            | SocketEvent::Message(MessageEvent { timestamp, .. }) => *timestamp,
        }
    }
}
