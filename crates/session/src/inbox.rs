// Per-session queue of generation-tagged decoder events

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tempo_core::{DecoderEvent, DecoderEventSink};

/// A decoder notification together with the generation of its handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: DecoderEvent,
}

type Waker = Box<dyn Fn() + Send + Sync>;

/// Decoders push into the inbox from any thread; the owning session drains it.
///
/// Once a waker is attached, every delivery also invokes it so the owner can
/// apply the event without the caller pumping anything.
pub struct EventInbox {
    queue: Mutex<VecDeque<TaggedEvent>>,
    waker: OnceCell<Waker>,
}

impl EventInbox {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            waker: OnceCell::new(),
        }
    }

    /// Attach the waker. Returns false if one was already attached.
    pub fn set_waker(&self, waker: Waker) -> bool {
        self.waker.set(waker).is_ok()
    }

    pub fn pop(&self) -> Option<TaggedEvent> {
        self.queue.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Default for EventInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderEventSink for EventInbox {
    fn deliver(&self, generation: u64, event: DecoderEvent) {
        log::debug!("[inbox] queued {:?} from generation {}", event, generation);
        self.queue
            .lock()
            .push_back(TaggedEvent { generation, event });

        // Queue lock is released before waking
        if let Some(waker) = self.waker.get() {
            waker();
        }
    }
}
