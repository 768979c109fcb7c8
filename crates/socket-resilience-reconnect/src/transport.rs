//! The boundary between the supervisor and a concrete transport.
//!
//! A [`TransportFactory`] creates one [`Transport`] per connection attempt and
//! receives a [`TransportEvents`] handle through which the transport reports
//! open, close, error and message notifications. Every handle is tagged with
//! the [`TransportId`] of the transport it was issued to, so notifications from
//! a superseded transport are recognised and dropped by the supervisor.
//!
//! Contract for implementors:
//! - report `closed` exactly once per transport;
//! - `close` must eventually lead to a `closed` notification unless the
//!   transport is already closed (returning `Err` makes the supervisor
//!   synthesize the notification itself);
//! - `send` while not open is the transport's decision: the supervisor neither
//!   buffers nor validates.

use crate::error::TransportError;
use crate::supervisor::{Inbound, Notification};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Monotonically increasing identifier of a transport within one supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportId(u64);

impl TransportId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value; the first transport is `1`.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection state as reported by the transport itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting,
    /// Messages can flow.
    Open,
    /// A close was initiated and has not completed.
    Closing,
    /// The connection is gone.
    Closed,
}

/// How received binary payloads should be exposed by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryType {
    /// Opaque, immutable blob of bytes.
    #[default]
    Blob,
    /// Contiguous, directly addressable buffer.
    ArrayBuffer,
}

impl BinaryType {
    /// Returns the conventional name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryType::Blob => "blob",
            BinaryType::ArrayBuffer => "arraybuffer",
        }
    }
}

/// A single application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Message {
    /// Returns the payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Message::Text(text) => text.len(),
            Message::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the text payload, if this is a text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            Message::Binary(_) => None,
        }
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Message {
    fn from(bytes: Vec<u8>) -> Self {
        Message::Binary(bytes)
    }
}

impl From<&[u8]> for Message {
    fn from(bytes: &[u8]) -> Self {
        Message::Binary(bytes.to_vec())
    }
}

/// What the supervisor asks a factory to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Validated target address (`ws://` or `wss://`).
    pub url: String,
    /// Requested sub-protocols, in preference order.
    pub protocols: Vec<String>,
}

/// A live, transport-level connection.
pub trait Transport: Send + Sync {
    /// Queues `data` for transmission.
    fn send(&self, data: Message) -> Result<(), TransportError>;

    /// Starts closing the connection with `code` and an optional reason.
    fn close(&self, code: u16, reason: Option<&str>) -> Result<(), TransportError>;

    /// Returns the transport's own connection state.
    fn ready_state(&self) -> ReadyState;

    /// Returns bytes queued by `send` but not yet written.
    fn buffered_amount(&self) -> usize;

    /// Returns the negotiated extensions, or an empty string.
    fn extensions(&self) -> String;

    /// Returns the negotiated sub-protocol, or an empty string.
    fn protocol(&self) -> String;

    /// Returns the resolved address.
    fn url(&self) -> String;

    /// Returns the binary representation mode.
    fn binary_type(&self) -> BinaryType;

    /// Sets the binary representation mode.
    fn set_binary_type(&self, binary_type: BinaryType);
}

/// Creates transports on behalf of the supervisor.
pub trait TransportFactory: Send + Sync {
    /// Starts a new connection attempt.
    ///
    /// The returned transport is expected to be connecting; outcomes are
    /// reported later through `events`. An `Err` means no transport exists.
    fn connect(
        &self,
        request: &ConnectRequest,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}

impl<T: TransportFactory + ?Sized> TransportFactory for Arc<T> {
    fn connect(
        &self,
        request: &ConnectRequest,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        (**self).connect(request, events)
    }
}

/// Notification sink handed to one transport.
///
/// Each method returns `false` once the supervisor has stopped listening, which
/// lets an adapter wind down early.
#[derive(Clone)]
pub struct TransportEvents {
    id: TransportId,
    sender: mpsc::UnboundedSender<Inbound>,
}

impl TransportEvents {
    pub(crate) fn new(id: TransportId, sender: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { id, sender }
    }

    /// Returns the identifier of the transport this sink belongs to.
    pub fn id(&self) -> TransportId {
        self.id
    }

    /// Reports that the connection opened with the negotiated `protocol`.
    pub fn opened(&self, protocol: impl Into<String>) -> bool {
        self.notify(Notification::Open {
            protocol: protocol.into(),
        })
    }

    /// Reports the terminal close of the connection.
    pub fn closed(&self, code: u16, reason: impl Into<String>, was_clean: bool) -> bool {
        self.notify(Notification::Close {
            code,
            reason: reason.into(),
            was_clean,
        })
    }

    /// Reports a transport-level error.
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.notify(Notification::Error {
            message: message.into(),
        })
    }

    /// Reports a received message.
    pub fn message(&self, data: Message) -> bool {
        self.notify(Notification::Message(data))
    }

    fn notify(&self, notification: Notification) -> bool {
        self.sender
            .send(Inbound::Transport {
                id: self.id,
                notification,
            })
            .is_ok()
    }
}

impl fmt::Debug for TransportEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportEvents")
            .field("id", &self.id)
            .field("listening", &!self.sender.is_closed())
            .finish()
    }
}
