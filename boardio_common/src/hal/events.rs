//! Driver event channel.
//!
//! `EventBus` is an explicit observer registry owned by each driver. It
//! carries the readiness notification (emitted exactly once), informational
//! messages and errors that surface after a call has already returned.

use crate::hal::driver::IoError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Event published by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoEvent {
    /// Initialization completed. Emitted once per driver instance.
    Ready {
        /// Driver name.
        driver: String,
    },
    /// Informational message.
    Info(String),
    /// Error detected outside of a synchronous call.
    Error(IoError),
}

impl fmt::Display for IoEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready { driver } => write!(f, "ready ({driver})"),
            Self::Info(msg) => write!(f, "info: {msg}"),
            Self::Error(err) => write!(f, "error: {err}"),
        }
    }
}

/// Event callback.
pub type EventListener = Box<dyn FnMut(&IoEvent) + Send>;

/// Handle returned by `EventBus::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, EventListener)>,
}

/// Observer registry for driver events.
///
/// Listeners run synchronously, in subscription order, on the thread that
/// emits. A listener must not subscribe or unsubscribe from inside its own
/// callback.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Listeners>,
    ready: AtomicBool,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe(&self, listener: EventListener) -> ListenerId {
        let mut listeners = self.listeners.lock();
        let id = ListenerId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.entries.len();
        listeners.entries.retain(|(lid, _)| *lid != id);
        listeners.entries.len() != before
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    /// Deliver `event` to every listener.
    pub fn emit(&self, event: IoEvent) {
        let mut listeners = self.listeners.lock();
        for (_, listener) in listeners.entries.iter_mut() {
            listener(&event);
        }
    }

    /// Publish an informational message.
    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("event: {}", message);
        self.emit(IoEvent::Info(message));
    }

    /// Publish an error.
    pub fn error(&self, error: IoError) {
        warn!("event: {}", error);
        self.emit(IoEvent::Error(error));
    }

    /// Flip readiness to true and emit `Ready`. Only the first call emits;
    /// later calls return `false`.
    pub fn mark_ready(&self, driver: &str) -> bool {
        if self.ready.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.emit(IoEvent::Ready {
            driver: driver.to_string(),
        });
        true
    }

    /// Whether `Ready` has been emitted.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("ready", &self.is_ready())
            .finish()
    }
}

static_assertions::assert_impl_all!(EventBus: Send, Sync);
