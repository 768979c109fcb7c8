use thiserror::Error;

/// Errors reported by a [`Transport`](crate::Transport) or
/// [`TransportFactory`](crate::TransportFactory).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The operation needs an open connection.
    #[error("transport is not open")]
    NotOpen,

    /// The close code may not be sent by an application.
    #[error("invalid close code {0}; expected 1000 or 3000-4999")]
    InvalidCloseCode(u16),

    /// A connection could not be initiated.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The transport failed while reading or writing.
    #[error("transport i/o error: {0}")]
    Io(String),

    /// The transport has already closed.
    #[error("transport is closed")]
    Closed,
}

/// Errors returned by [`ReconnectingSocket`](crate::ReconnectingSocket).
#[derive(Debug, Error)]
pub enum SocketError {
    /// The target address was rejected before any transport was created.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl {
        /// The address as given.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A sub-protocol name was empty or listed twice.
    #[error("invalid sub-protocol '{0}'")]
    InvalidProtocol(String),

    /// The live transport rejected the operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No transport is live, e.g. after `destroy()`.
    #[error("no live transport")]
    NotConnected,
}

impl SocketError {
    /// Returns true if the error came from construction-time validation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            SocketError::InvalidUrl { .. } | SocketError::InvalidProtocol(_)
        )
    }

    /// Returns the transport error if present.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            SocketError::Transport(e) => Some(e),
            _ => None,
        }
    }
}
