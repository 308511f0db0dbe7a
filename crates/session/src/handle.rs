// Thread-safe handle around a playback session
//
// Caller commands and decoder callbacks are serialized through one mutex.
// Decoder callbacks land in the session's inbox first; whoever holds the lock
// drains it, and every lock holder re-checks the inbox after unlocking so an
// event queued during a command is never left behind. Observer notifications
// queue in the outbox and are delivered only after the lock is released, so an
// observer may command any session, including the one that notified it.

use crate::inbox::EventInbox;
use crate::outbox::EventOutbox;
use crate::reporter::PositionReporter;
use crate::session::PlaybackSession;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tempo_core::{
    PlaybackStatus, PlayerState, ReleaseMode, SessionId, SessionObserver, TargetState,
};

struct Shared {
    session: Mutex<PlaybackSession>,
    inbox: Arc<EventInbox>,
    outbox: Arc<EventOutbox>,
    id: SessionId,
}

impl Shared {
    fn with_session<R>(&self, f: impl FnOnce(&mut PlaybackSession) -> R) -> R {
        let result = {
            let mut session = self.session.lock();
            let result = f(&mut session);
            session.process_pending_events();
            result
        };
        self.settle();
        result
    }

    /// Apply queued decoder events if nobody else holds the session, then
    /// deliver queued notifications.
    ///
    /// When the lock is taken, the holder drains after its own work and calls
    /// this again once it has unlocked, so giving up here cannot strand an event.
    fn settle(&self) {
        while !self.inbox.is_empty() {
            match self.session.try_lock() {
                Some(mut session) => {
                    session.process_pending_events();
                }
                None => break,
            }
        }
        self.outbox.deliver();
    }
}

/// Held only by caller-facing handles; the last one to go releases the decoder.
///
/// The inbox waker keeps a weak reference to [`Shared`], so teardown always
/// runs on the thread dropping the last handle, never inside a decoder callback.
struct Owner(Arc<Shared>);

impl Drop for Owner {
    fn drop(&mut self) {
        if self.0.session.lock().release_decoder() {
            log::info!("[session {}] last handle dropped, decoder released", self.0.id);
        }
    }
}

/// Shared, cloneable access to one [`PlaybackSession`]
#[derive(Clone)]
pub struct SessionHandle {
    owner: Arc<Owner>,
}

impl SessionHandle {
    pub fn new(mut session: PlaybackSession) -> Self {
        session.defer_notifications();
        let inbox = session.inbox();
        let outbox = session.outbox();
        let id = session.id().clone();
        let shared = Arc::new(Shared {
            session: Mutex::new(session),
            inbox: inbox.clone(),
            outbox,
            id: id.clone(),
        });

        let weak_shared = Arc::downgrade(&shared);
        let attached = inbox.set_waker(Box::new(move || {
            if let Some(shared) = weak_shared.upgrade() {
                shared.settle();
            }
        }));
        if !attached {
            log::warn!("[session {}] inbox already attached to a handle", id);
        }

        Self {
            owner: Arc::new(Owner(shared)),
        }
    }

    fn shared(&self) -> &Shared {
        &self.owner.0
    }

    pub fn id(&self) -> &SessionId {
        &self.shared().id
    }

    /// Run `f` with the session locked, then apply any decoder events it caused
    /// and notify observers once the lock is released.
    pub fn with_session<R>(&self, f: impl FnOnce(&mut PlaybackSession) -> R) -> R {
        self.shared().with_session(f)
    }

    pub(crate) fn downgrade(&self) -> WeakSessionHandle {
        WeakSessionHandle {
            owner: Arc::downgrade(&self.owner),
            id: self.id().clone(),
        }
    }

    pub fn load(&self, source: &str) {
        self.with_session(|s| s.load(source));
    }

    pub fn play(&self) {
        self.with_session(|s| s.play());
    }

    pub fn pause(&self) {
        self.with_session(|s| s.pause());
    }

    pub fn stop(&self) {
        self.with_session(|s| s.stop());
    }

    pub fn seek(&self, position_ms: u64) {
        self.with_session(|s| s.seek(position_ms));
    }

    pub fn release(&self) {
        self.with_session(|s| s.release());
    }

    pub fn set_volume(&self, volume: f32) {
        self.with_session(|s| s.set_volume(volume));
    }

    pub fn set_output_attributes(&self, respect_silence: bool, stay_awake: bool) {
        self.with_session(|s| s.set_output_attributes(respect_silence, stay_awake));
    }

    pub fn set_release_mode(&self, release_mode: ReleaseMode) {
        self.with_session(|s| s.set_release_mode(release_mode));
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.with_session(|s| s.add_observer(observer));
    }

    pub fn report_position(&self) {
        self.with_session(|s| s.report_position());
    }

    pub fn state(&self) -> PlayerState {
        self.with_session(|s| s.state())
    }

    pub fn target_state(&self) -> TargetState {
        self.with_session(|s| s.target_state())
    }

    pub fn duration_ms(&self) -> u64 {
        self.with_session(|s| s.duration_ms())
    }

    pub fn position_ms(&self) -> u64 {
        self.with_session(|s| s.position_ms())
    }

    pub fn is_actually_playing(&self) -> bool {
        self.with_session(|s| s.is_actually_playing())
    }

    pub fn status(&self) -> PlaybackStatus {
        self.with_session(|s| s.status())
    }

    /// Report position to observers periodically at the configured interval.
    pub fn spawn_position_reporter(&self) -> PositionReporter {
        let interval = self.with_session(|s| s.position_update_interval());
        self.spawn_position_reporter_every(interval)
    }

    pub fn spawn_position_reporter_every(&self, interval: Duration) -> PositionReporter {
        PositionReporter::spawn(self.downgrade(), interval)
    }
}

/// Non-owning handle; used by background workers so they never keep a session alive
#[derive(Clone)]
pub(crate) struct WeakSessionHandle {
    owner: Weak<Owner>,
    id: SessionId,
}

impl WeakSessionHandle {
    pub(crate) fn upgrade(&self) -> Option<SessionHandle> {
        self.owner.upgrade().map(|owner| SessionHandle { owner })
    }

    pub(crate) fn id(&self) -> &SessionId {
        &self.id
    }
}
