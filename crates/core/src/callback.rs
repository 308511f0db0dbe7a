// Observer plumbing for session notifications
// Position updates are throttled per observer; lifecycle events always go through

use crate::state::PlayerState;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identifier a higher-level registry uses to route a session's notifications
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Notifications produced by a playback session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Decoder finished preparing and reported its duration
    Duration {
        session_id: SessionId,
        duration_ms: u64,
    },

    /// Non-looping playback reached the end of the source
    Completed { session_id: SessionId },

    /// Decoder failed; the session is parked in `PlayerState::Error`
    Error {
        session_id: SessionId,
        message: String,
    },

    /// Session started playing
    BecameActive { session_id: SessionId },

    /// Session state changed
    StateChanged {
        session_id: SessionId,
        old_state: PlayerState,
        new_state: PlayerState,
    },

    /// Playback position updated
    PositionChanged {
        session_id: SessionId,
        position_ms: u64,
        duration_ms: u64,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            SessionEvent::Duration { session_id, .. }
            | SessionEvent::Completed { session_id }
            | SessionEvent::Error { session_id, .. }
            | SessionEvent::BecameActive { session_id }
            | SessionEvent::StateChanged { session_id, .. }
            | SessionEvent::PositionChanged { session_id, .. } => session_id,
        }
    }
}

/// Session observer trait
/// Events from a shared session arrive after its lock is released, so an
/// implementation may issue commands to any session, including the sender
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: SessionEvent);
}

/// Throttled observer wrapper
/// Prevents excessive position notifications
pub struct ThrottledObserver {
    inner: Arc<dyn SessionObserver>,
    last_position_update: Mutex<Option<Instant>>,
    position_update_interval: Duration,
}

impl ThrottledObserver {
    pub fn new(observer: Arc<dyn SessionObserver>, update_interval_ms: u64) -> Self {
        Self {
            inner: observer,
            last_position_update: Mutex::new(None),
            position_update_interval: Duration::from_millis(update_interval_ms),
        }
    }

    pub fn dispatch(&self, event: SessionEvent) {
        match &event {
            SessionEvent::PositionChanged { .. } => {
                let due = {
                    let mut last_update = self.last_position_update.lock();
                    let due = last_update
                        .map(|at| at.elapsed() >= self.position_update_interval)
                        .unwrap_or(true);
                    if due {
                        *last_update = Some(Instant::now());
                    }
                    due
                };
                // Throttle lock is released before the observer runs
                if due {
                    self.inner.on_event(event);
                }
            }
            _ => self.inner.on_event(event),
        }
    }
}

/// Fans session events out to every registered observer
pub struct ObserverManager {
    observers: Mutex<Vec<Arc<ThrottledObserver>>>,
}

impl ObserverManager {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>, throttle_ms: u64) {
        let throttled = Arc::new(ThrottledObserver::new(observer, throttle_ms));
        self.observers.lock().push(throttled);
    }

    pub fn clear_observers(&self) {
        self.observers.lock().clear();
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn dispatch_event(&self, event: SessionEvent) {
        // Snapshot so an observer registering another observer cannot deadlock
        let observers: Vec<_> = self.observers.lock().iter().cloned().collect();
        for observer in observers {
            observer.dispatch(event.clone());
        }
    }
}

impl Default for ObserverManager {
    fn default() -> Self {
        Self::new()
    }
}
