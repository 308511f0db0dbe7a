// Per-session queue of observer notifications
//
// Transitions only queue their notifications. Delivery happens outside the
// session lock, one thread at a time, in the order the events were queued.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tempo_core::callback::ObserverManager;
use tempo_core::SessionEvent;

/// Queued session events plus the observers they are delivered to
pub struct EventOutbox {
    observers: ObserverManager,
    queue: Mutex<VecDeque<SessionEvent>>,
    delivering: AtomicBool,
}

impl EventOutbox {
    pub fn new() -> Self {
        Self {
            observers: ObserverManager::new(),
            queue: Mutex::new(VecDeque::new()),
            delivering: AtomicBool::new(false),
        }
    }

    pub fn observers(&self) -> &ObserverManager {
        &self.observers
    }

    pub fn push(&self, event: SessionEvent) {
        self.queue.lock().push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Hand queued events to the observers. Returns how many this call delivered.
    ///
    /// If another thread is already delivering, returns at once: that thread
    /// re-checks the queue after it finishes, so nothing queued is skipped. An
    /// observer commanding the session that notified it lands here re-entrantly
    /// and its events are picked up by the outer loop.
    pub fn deliver(&self) -> usize {
        let mut delivered = 0;
        loop {
            if self
                .delivering
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return delivered;
            }

            {
                let _turn = DeliveryTurn(&self.delivering);
                loop {
                    // Queue lock is not held while observers run
                    let next = self.queue.lock().pop_front();
                    let Some(event) = next else { break };
                    self.observers.dispatch_event(event);
                    delivered += 1;
                }
            }

            if self.is_empty() {
                return delivered;
            }
        }
    }
}

impl Default for EventOutbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Gives up the delivery turn even if an observer panics
struct DeliveryTurn<'a>(&'a AtomicBool);

impl Drop for DeliveryTurn<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingObserver;
    use std::sync::{Arc, Weak};
    use tempo_core::{SessionId, SessionObserver};

    fn completed(id: &str) -> SessionEvent {
        SessionEvent::Completed {
            session_id: SessionId::from(id),
        }
    }

    #[test]
    fn test_delivers_in_queue_order() {
        let outbox = EventOutbox::new();
        let observer = Arc::new(RecordingObserver::new());
        outbox.observers().add_observer(observer.clone(), 0);

        outbox.push(completed("a"));
        outbox.push(completed("b"));
        assert_eq!(outbox.len(), 2);
        assert!(observer.events().is_empty());

        assert_eq!(outbox.deliver(), 2);
        assert!(outbox.is_empty());
        assert_eq!(observer.events(), vec![completed("a"), completed("b")]);
        assert_eq!(outbox.deliver(), 0);
    }

    #[test]
    fn test_reentrant_push_is_delivered_by_outer_loop() {
        struct Echo {
            outbox: Weak<EventOutbox>,
            seen: Mutex<Vec<String>>,
        }

        impl SessionObserver for Echo {
            fn on_event(&self, event: SessionEvent) {
                let id = event.session_id().to_string();
                self.seen.lock().push(id.clone());
                if id == "first" {
                    if let Some(outbox) = self.outbox.upgrade() {
                        outbox.push(completed("echo"));
                        // Nested call must not deliver out of turn
                        assert_eq!(outbox.deliver(), 0);
                    }
                }
            }
        }

        let outbox = Arc::new(EventOutbox::new());
        let echo = Arc::new(Echo {
            outbox: Arc::downgrade(&outbox),
            seen: Mutex::new(Vec::new()),
        });
        outbox.observers().add_observer(echo.clone(), 0);

        outbox.push(completed("first"));
        outbox.push(completed("second"));
        assert_eq!(outbox.deliver(), 3);
        assert_eq!(*echo.seen.lock(), vec!["first", "second", "echo"]);
    }
}
