//! Core infrastructure for socket-resilience.
//!
//! This crate provides the transport-agnostic pieces shared by the
//! reconnecting socket:
//! - Event trait and a single-handler-per-type registry
//! - Connectivity signal contract and host implementations

pub mod connectivity;
pub mod events;

pub use connectivity::{
    AlwaysOnline, ConnectivitySignal, ListenerId, NetworkMonitor, OnlineListener,
};
pub use events::{Event, EventHandler, EventRegistry};
