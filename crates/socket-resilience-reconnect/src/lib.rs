//! Supervised, self-reconnecting message sockets.
//!
//! A [`ReconnectingSocket`] owns one logical, long-lived connection. It
//! creates transports through a [`TransportFactory`], force-closes attempts
//! that stall past the connect timeout, and classifies every close:
//!
//! - code 1000 ends supervision with a `closed` event;
//! - an abnormal close while the network is down suspends reconnection until
//!   the [`ConnectivitySignal`] reports it back (`offline` / `online`);
//! - any other abnormal close schedules the next reconnect from a finite
//!   [`BackoffSchedule`]. Running out of delays ends supervision with
//!   `closed`.
//!
//! Applications register at most one handler per [`EventKind`]; registering
//! again replaces the previous handler.
//!
//! # Features
//!
//! - **Finite backoff**: explicit, fixed or exponential delay lists; the
//!   default is `[0ms, 3000ms, 10000ms]`
//! - **Connect timeout**: stalled attempts are closed with code 4000 and then
//!   handled like any abnormal close
//! - **Connectivity awareness**: no reconnect attempts are burned while the
//!   host is offline
//! - **Stale transport isolation**: every transport is tagged with a
//!   [`TransportId`]; notifications from superseded transports are dropped
//!
//! # Examples
//!
//! ```rust,no_run
//! use socket_resilience_reconnect::{
//!     BackoffSchedule, EventKind, ReconnectConfig, ReconnectingSocket, TransportFactory,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(factory: Arc<dyn TransportFactory>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReconnectConfig::builder()
//!     .name("market-feed")
//!     .connect_timeout(Duration::from_secs(5))
//!     .schedule(BackoffSchedule::exponential(
//!         Duration::from_millis(100),
//!         Duration::from_secs(10),
//!         10,
//!     ))
//!     .build();
//!
//! let socket = ReconnectingSocket::builder("wss://feed.example.com/ws", factory)
//!     .config(config)
//!     .on(EventKind::Closed, |event| println!("gave up: {:?}", event))
//!     .connect()?;
//! # Ok(())
//! # }
//! ```

pub mod close_code;
mod config;
mod error;
mod events;
mod schedule;
mod socket;
mod state;
mod supervisor;
mod transport;

pub use config::{ReconnectConfig, ReconnectConfigBuilder, StateChangeCallback, DEFAULT_CONNECT_TIMEOUT};
pub use error::{SocketError, TransportError};
pub use events::{
    CloseEvent, ClosedEvent, ClosedReason, ErrorEvent, EventKind, MessageEvent, OpenEvent,
    SocketEvent, UnknownEventKind,
};
pub use schedule::BackoffSchedule;
pub use socket::{ReconnectingSocket, SocketBuilder};
pub use state::{ConnectionState, SupervisorStatus};
pub use transport::{
    BinaryType, ConnectRequest, Message, ReadyState, Transport, TransportEvents, TransportFactory,
    TransportId,
};

// Connectivity collaborators live in the core crate.
pub use socket_resilience_core::{AlwaysOnline, ConnectivitySignal, ListenerId, NetworkMonitor};
