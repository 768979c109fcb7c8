//! WebSocket transport for reconnecting sockets, built on `tokio-tungstenite`.
//!
//! [`TungsteniteFactory`] implements
//! [`TransportFactory`](socket_resilience_reconnect::TransportFactory). Each
//! transport it creates runs on its own task: it performs the handshake,
//! relays text and binary frames, writes queued outbound messages and reports
//! exactly one close.
//!
//! # Examples
//!
//! ```rust,no_run
//! use socket_resilience_reconnect::{EventKind, ReconnectingSocket};
//! use socket_resilience_tungstenite::TungsteniteFactory;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let socket = ReconnectingSocket::builder("ws://127.0.0.1:9001/echo", Arc::new(TungsteniteFactory::new()))
//!     .on(EventKind::Open, |_| println!("connected"))
//!     .connect()?;
//! # Ok(())
//! # }
//! ```

mod factory;
mod transport;

pub use factory::{TungsteniteFactory, DEFAULT_CLOSE_TIMEOUT};
pub use transport::TungsteniteTransport;
