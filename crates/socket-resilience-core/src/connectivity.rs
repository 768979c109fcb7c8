//! Network connectivity signals.
//!
//! A [`ConnectivitySignal`] answers "is the network reachable right now?" and
//! notifies subscribers once when it becomes reachable again. Hosts usually
//! wire it to an OS or platform reachability API; [`NetworkMonitor`] is a
//! push-driven implementation for that purpose and [`AlwaysOnline`] is the
//! default for hosts that cannot observe connectivity at all.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A one-shot callback fired when connectivity returns.
pub type OnlineListener = Box<dyn FnOnce() + Send>;

/// Identifies a subscription made with [`ConnectivitySignal::subscribe_online`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Creates an identifier from a raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Host-provided view of network reachability.
pub trait ConnectivitySignal: Send + Sync {
    /// Returns whether the network is currently reachable.
    fn is_online(&self) -> bool;

    /// Registers a one-shot listener invoked on the next transition to online.
    fn subscribe_online(&self, listener: OnlineListener) -> ListenerId;

    /// Removes a listener. Unknown or already fired ids are ignored.
    fn unsubscribe_online(&self, id: ListenerId);
}

impl<T: ConnectivitySignal + ?Sized> ConnectivitySignal for Arc<T> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }

    fn subscribe_online(&self, listener: OnlineListener) -> ListenerId {
        (**self).subscribe_online(listener)
    }

    fn unsubscribe_online(&self, id: ListenerId) {
        (**self).unsubscribe_online(id)
    }
}

/// Connectivity signal that always reports the network as reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl ConnectivitySignal for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }

    fn subscribe_online(&self, _listener: OnlineListener) -> ListenerId {
        // Never transitions, so the listener can never fire.
        ListenerId(0)
    }

    fn unsubscribe_online(&self, _id: ListenerId) {}
}

struct MonitorState {
    online: bool,
    listeners: Vec<(ListenerId, OnlineListener)>,
}

/// Push-driven connectivity signal.
///
/// The host calls [`NetworkMonitor::set_online`] whenever it learns about a
/// reachability change. Clones share state.
///
/// # Examples
///
/// ```
/// use socket_resilience_core::{ConnectivitySignal, NetworkMonitor};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let monitor = NetworkMonitor::new(false);
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
///
/// monitor.subscribe_online(Box::new(move || flag.store(true, Ordering::SeqCst)));
/// monitor.set_online(true);
///
/// assert!(fired.load(Ordering::SeqCst));
/// assert_eq!(monitor.listener_count(), 0);
/// ```
#[derive(Clone)]
pub struct NetworkMonitor {
    state: Arc<Mutex<MonitorState>>,
    next_id: Arc<AtomicU64>,
}

impl NetworkMonitor {
    /// Creates a monitor with the given initial status.
    pub fn new(online: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState {
                online,
                listeners: Vec::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records the current status.
    ///
    /// On a transition from offline to online every pending listener is
    /// removed and then invoked, outside the internal lock.
    pub fn set_online(&self, online: bool) {
        let fired = {
            let mut state = self.lock();
            let was_online = state.online;
            state.online = online;
            if online && !was_online {
                std::mem::take(&mut state.listeners)
            } else {
                Vec::new()
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(online, listeners = fired.len(), "connectivity changed");

        for (_, listener) in fired {
            listener();
        }
    }

    /// Returns the number of listeners waiting for the network to return.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivitySignal for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.lock().online
    }

    fn subscribe_online(&self, listener: OnlineListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().listeners.push((id, listener));
        id
    }

    fn unsubscribe_online(&self, id: ListenerId) {
        self.lock().listeners.retain(|(existing, _)| *existing != id);
    }
}

impl fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("NetworkMonitor")
            .field("online", &state.online)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}
