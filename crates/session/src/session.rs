// Playback session state machine
//
// Commands may arrive in any state. Those that need a live decoder are either
// applied immediately, remembered (pending seek, target state) until the decoder
// reports prepared, or ignored. Nothing is ever rejected.

use crate::inbox::{EventInbox, TaggedEvent};
use crate::outbox::EventOutbox;
use std::sync::Arc;
use std::time::Duration;
use tempo_core::callback::ObserverManager;
use tempo_core::{
    DecoderEngine, DecoderEvent, DecoderEvents, DecoderFactory, OutputCategory, PlaybackStatus,
    PlayerState, ReleaseMode, Result, SessionConfig, SessionError, SessionEvent, SessionId,
    SessionObserver, TargetState,
};

/// Deferred seek slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekSlot {
    /// Nothing requested
    #[default]
    Empty,
    /// Requested before the decoder was seekable; replayed on prepared
    Pending(u64),
    /// Last seek went straight to a live decoder
    Applied,
}

struct DecoderSlot {
    generation: u64,
    engine: Box<dyn DecoderEngine>,
}

/// A single player identity and the decoder it currently owns
pub struct PlaybackSession {
    id: SessionId,
    factory: Arc<dyn DecoderFactory>,
    outbox: Arc<EventOutbox>,
    deliver_inline: bool,
    inbox: Arc<EventInbox>,
    observer_throttle_ms: u64,
    position_update_interval: Duration,

    source: Option<String>,
    volume: f32,
    release_mode: ReleaseMode,
    respect_silence: bool,
    stay_awake: bool,

    state: PlayerState,
    target_state: TargetState,
    seek: SeekSlot,
    decoder: Option<DecoderSlot>,
    generation: u64,
}

impl PlaybackSession {
    pub fn new(id: impl Into<SessionId>, factory: Arc<dyn DecoderFactory>) -> Self {
        let config = SessionConfig::default();
        Self::build(id.into(), factory, &config)
    }

    pub fn with_config(
        id: impl Into<SessionId>,
        factory: Arc<dyn DecoderFactory>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(id.into(), factory, &config))
    }

    fn build(id: SessionId, factory: Arc<dyn DecoderFactory>, config: &SessionConfig) -> Self {
        log::info!("[session {}] created", id);
        Self {
            id,
            factory,
            outbox: Arc::new(EventOutbox::new()),
            deliver_inline: true,
            inbox: Arc::new(EventInbox::new()),
            observer_throttle_ms: config.observer_throttle_ms,
            position_update_interval: config.position_update_interval,
            source: None,
            volume: config.volume,
            release_mode: config.release_mode,
            respect_silence: config.respect_silence,
            stay_awake: config.stay_awake,
            state: PlayerState::Idle,
            target_state: TargetState::Idle,
            seek: SeekSlot::Empty,
            decoder: None,
            generation: 0,
        }
    }

    /// Register an observer with the configured position throttle
    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.observers().add_observer(observer, self.observer_throttle_ms);
    }

    pub fn add_observer_with_throttle(&self, observer: Arc<dyn SessionObserver>, throttle_ms: u64) {
        self.observers().add_observer(observer, throttle_ms);
    }

    pub fn observers(&self) -> &ObserverManager {
        self.outbox.observers()
    }

    pub(crate) fn outbox(&self) -> Arc<EventOutbox> {
        self.outbox.clone()
    }

    /// Queue notifications instead of delivering them from inside transitions.
    ///
    /// Set by [`SessionHandle`](crate::SessionHandle), which delivers the queue
    /// once the session lock is released.
    pub(crate) fn defer_notifications(&mut self) {
        self.deliver_inline = false;
    }

    pub(crate) fn inbox(&self) -> Arc<EventInbox> {
        self.inbox.clone()
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Load a source, reusing the live decoder if it already plays it.
    pub fn load(&mut self, source: &str) {
        log::info!("[session {}] load {}", self.id, source);

        if self.is_playback_capable() && self.source.as_deref() == Some(source) {
            log::debug!("[session {}] source unchanged, reusing decoder", self.id);
            return;
        }

        self.release();

        self.generation += 1;
        let generation = self.generation;
        let events = DecoderEvents::new(generation, self.inbox.clone());

        let mut engine = match self.factory.create(events) {
            Ok(engine) => engine,
            Err(err) => {
                let error = SessionError::InvalidSource(format!(
                    "cannot create decoder for {}: {}",
                    source, err
                ));
                self.fail("create", error);
                return;
            }
        };

        self.configure(engine.as_mut());
        self.source = Some(source.to_string());

        let opened = engine.open(source);
        // Stored even when open fails so the next release tears it down
        self.decoder = Some(DecoderSlot { generation, engine });

        match opened {
            Ok(()) => {
                log::debug!(
                    "[session {}] decoder generation {} preparing",
                    self.id,
                    generation
                );
                self.set_state(PlayerState::Preparing);
            }
            Err(err) => {
                let error =
                    SessionError::InvalidSource(format!("cannot open {}: {}", source, err));
                self.fail("open", error);
            }
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            log::warn!("[session {}] ignoring volume {}", self.id, volume);
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        if self.volume == volume {
            return;
        }

        log::info!("[session {}] set_volume -> {}", self.id, volume);
        self.volume = volume;
        self.push_attribute("set_volume", |engine| engine.set_volume(volume, volume));
    }

    pub fn set_output_attributes(&mut self, respect_silence: bool, stay_awake: bool) {
        if self.respect_silence != respect_silence {
            log::info!("[session {}] respect_silence -> {}", self.id, respect_silence);
            self.respect_silence = respect_silence;
            let category = OutputCategory::for_respect_silence(respect_silence);
            self.push_attribute("set_output_category", |engine| {
                engine.set_output_category(category)
            });
        }

        if self.stay_awake != stay_awake {
            log::info!("[session {}] stay_awake -> {}", self.id, stay_awake);
            self.stay_awake = stay_awake;
            if stay_awake {
                self.push_attribute("request_wake_lock", |engine| engine.request_wake_lock());
            }
        }
    }

    pub fn set_release_mode(&mut self, release_mode: ReleaseMode) {
        if self.release_mode == release_mode {
            return;
        }

        log::info!("[session {}] release mode -> {:?}", self.id, release_mode);
        self.release_mode = release_mode;
        let looping = release_mode.is_looping();
        self.push_attribute("set_looping", |engine| engine.set_looping(looping));
    }

    /// Start playback now, or once the decoder has prepared.
    pub fn play(&mut self) {
        log::info!("[session {}] play", self.id);
        self.target_state = TargetState::Playing;

        if !self.is_playback_capable() {
            log::debug!(
                "[session {}] play deferred while {}",
                self.id,
                self.state
            );
            return;
        }

        self.notify(SessionEvent::BecameActive {
            session_id: self.id.clone(),
        });

        if self.state == PlayerState::Completed && !self.drive("seek_to", |e| e.seek_to(0)) {
            return;
        }
        if self.drive("start", |e| e.start()) {
            self.set_state(PlayerState::Playing);
        }
    }

    pub fn pause(&mut self) {
        log::info!("[session {}] pause", self.id);
        self.target_state = TargetState::Paused;

        if self.is_playback_capable()
            && self.decoder_is_playing()
            && self.drive("pause", |e| e.pause())
        {
            self.set_state(PlayerState::Paused);
        }
    }

    /// Release the decoder, or rewind and hold it, depending on the release mode.
    pub fn stop(&mut self) {
        log::info!("[session {}] stop ({:?})", self.id, self.release_mode);

        if self.release_mode == ReleaseMode::Release {
            self.release();
            return;
        }

        if self.decoder_is_playing() {
            self.drive("seek_to", |e| e.seek_to(0));
        }
        self.pause();
    }

    /// Seek now, or remember the position until the decoder has prepared.
    pub fn seek(&mut self, position_ms: u64) {
        log::info!("[session {}] seek -> {} ms", self.id, position_ms);

        if self.is_playback_capable() {
            if self.drive("seek_to", |e| e.seek_to(position_ms)) {
                self.seek = SeekSlot::Applied;
            }
        } else {
            log::debug!(
                "[session {}] seek deferred while {}",
                self.id,
                self.state
            );
            self.seek = SeekSlot::Pending(position_ms);
        }
    }

    /// Tear down the decoder handle. Safe to call in any state, any number of times.
    pub fn release(&mut self) {
        if self.release_decoder() {
            log::info!("[session {}] released", self.id);
        }
        self.set_state(PlayerState::Idle);
        self.target_state = TargetState::Idle;
    }

    // ---------------------------------------------------------------------
    // Decoder callbacks
    // ---------------------------------------------------------------------

    /// Apply every queued decoder event. Returns how many were taken off the inbox.
    pub fn process_pending_events(&mut self) -> usize {
        let mut processed = 0;
        while let Some(tagged) = self.inbox.pop() {
            self.handle_event(tagged);
            processed += 1;
        }
        processed
    }

    fn handle_event(&mut self, tagged: TaggedEvent) {
        let live = self.decoder.as_ref().map(|slot| slot.generation);
        if live != Some(tagged.generation) {
            let stale = SessionError::Stale {
                generation: tagged.generation,
                live,
            };
            log::debug!(
                "[session {}] dropping {:?}: {}",
                self.id,
                tagged.event,
                stale
            );
            return;
        }

        match tagged.event {
            DecoderEvent::Prepared => self.on_prepared(),
            DecoderEvent::Completed => self.on_completion(),
            DecoderEvent::Error(detail) => self.on_error(detail),
        }
    }

    fn on_prepared(&mut self) {
        if self.state != PlayerState::Preparing {
            log::debug!(
                "[session {}] ignoring prepared while {}",
                self.id,
                self.state
            );
            return;
        }

        self.set_state(PlayerState::Prepared);

        let duration_ms = self
            .decoder
            .as_ref()
            .map(|slot| slot.engine.duration_ms())
            .unwrap_or(0);
        log::info!("[session {}] prepared, duration {} ms", self.id, duration_ms);
        self.notify(SessionEvent::Duration {
            session_id: self.id.clone(),
            duration_ms,
        });

        if let SeekSlot::Pending(position_ms) = self.seek {
            self.seek = SeekSlot::Empty;
            log::debug!(
                "[session {}] applying deferred seek to {} ms",
                self.id,
                position_ms
            );
            self.drive("seek_to", |e| e.seek_to(position_ms));
        }

        if self.target_state == TargetState::Playing {
            self.play();
        }
    }

    fn on_completion(&mut self) {
        if !self.is_playback_capable() || self.state == PlayerState::Completed {
            log::debug!(
                "[session {}] ignoring completion while {}",
                self.id,
                self.state
            );
            return;
        }

        log::info!("[session {}] playback completed", self.id);
        self.set_state(PlayerState::Completed);
        self.target_state = TargetState::Completed;
        self.notify(SessionEvent::Completed {
            session_id: self.id.clone(),
        });
    }

    fn on_error(&mut self, detail: String) {
        if self.state == PlayerState::Error {
            log::debug!("[session {}] already failed, dropping: {}", self.id, detail);
            return;
        }

        let error = if self.state == PlayerState::Preparing {
            SessionError::InvalidSource(detail)
        } else {
            SessionError::Decoder(detail)
        };
        self.fail("decoder", error);
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn target_state(&self) -> TargetState {
        self.target_state
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn release_mode(&self) -> ReleaseMode {
        self.release_mode
    }

    pub fn is_looping(&self) -> bool {
        self.release_mode.is_looping()
    }

    pub fn respect_silence(&self) -> bool {
        self.respect_silence
    }

    pub fn stay_awake(&self) -> bool {
        self.stay_awake
    }

    pub fn seek_slot(&self) -> SeekSlot {
        self.seek
    }

    /// Position of a seek waiting for the decoder to prepare
    pub fn pending_seek_ms(&self) -> Option<u64> {
        match self.seek {
            SeekSlot::Pending(position_ms) => Some(position_ms),
            _ => None,
        }
    }

    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    /// Generation of the live decoder handle, if any
    pub fn decoder_generation(&self) -> Option<u64> {
        self.decoder.as_ref().map(|slot| slot.generation)
    }

    pub fn position_update_interval(&self) -> Duration {
        self.position_update_interval
    }

    pub fn is_playback_capable(&self) -> bool {
        self.decoder.is_some() && self.state.allows_playback()
    }

    pub fn duration_ms(&self) -> u64 {
        self.live_engine().map(|e| e.duration_ms()).unwrap_or(0)
    }

    pub fn position_ms(&self) -> u64 {
        self.live_engine().map(|e| e.position_ms()).unwrap_or(0)
    }

    pub fn is_actually_playing(&self) -> bool {
        self.live_engine().map(|e| e.is_playing()).unwrap_or(false)
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            target_state: self.target_state,
            position_ms: self.position_ms(),
            duration_ms: self.duration_ms(),
            volume: self.volume,
            release_mode: self.release_mode,
            respect_silence: self.respect_silence,
            stay_awake: self.stay_awake,
        }
    }

    /// Send a position update to observers while the decoder is playing.
    pub fn report_position(&self) {
        if !self.is_actually_playing() {
            return;
        }
        self.notify(SessionEvent::PositionChanged {
            session_id: self.id.clone(),
            position_ms: self.position_ms(),
            duration_ms: self.duration_ms(),
        });
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn live_engine(&self) -> Option<&dyn DecoderEngine> {
        if !self.state.allows_playback() {
            return None;
        }
        self.decoder.as_ref().map(|slot| slot.engine.as_ref())
    }

    fn decoder_is_playing(&self) -> bool {
        self.decoder
            .as_ref()
            .map(|slot| slot.engine.is_playing())
            .unwrap_or(false)
    }

    /// Apply the session's current attributes to a freshly created decoder.
    fn configure(&self, engine: &mut dyn DecoderEngine) {
        let category = OutputCategory::for_respect_silence(self.respect_silence);
        let steps: [(&str, Result<()>); 3] = [
            ("set_output_category", engine.set_output_category(category)),
            ("set_volume", engine.set_volume(self.volume, self.volume)),
            ("set_looping", engine.set_looping(self.release_mode.is_looping())),
        ];
        for (step, result) in steps {
            if let Err(err) = result {
                log::warn!("[session {}] {} failed: {}", self.id, step, err);
            }
        }

        if self.stay_awake {
            if let Err(err) = engine.request_wake_lock() {
                log::warn!("[session {}] request_wake_lock failed: {}", self.id, err);
            }
        }
    }

    /// Push an attribute change to the live decoder; failures only log.
    fn push_attribute(
        &mut self,
        what: &str,
        op: impl FnOnce(&mut dyn DecoderEngine) -> Result<()>,
    ) {
        if !self.is_playback_capable() {
            return;
        }
        if let Some(slot) = self.decoder.as_mut() {
            if let Err(err) = op(slot.engine.as_mut()) {
                log::warn!("[session {}] {} failed: {}", self.id, what, err);
            }
        }
    }

    /// Run a control operation on the decoder. A failure parks the session in Error.
    fn drive(&mut self, what: &str, op: impl FnOnce(&mut dyn DecoderEngine) -> Result<()>) -> bool {
        let result = match self.decoder.as_mut() {
            Some(slot) => op(slot.engine.as_mut()),
            None => return false,
        };

        match result {
            Ok(()) => true,
            Err(err) => {
                self.fail(what, err);
                false
            }
        }
    }

    fn notify(&self, event: SessionEvent) {
        self.outbox.push(event);
        if self.deliver_inline {
            self.outbox.deliver();
        }
    }

    fn fail(&mut self, what: &str, error: SessionError) {
        if self.state == PlayerState::Error {
            log::debug!("[session {}] already failed, dropping {}: {}", self.id, what, error);
            return;
        }

        log::error!("[session {}] {} failed: {}", self.id, what, error);
        self.set_state(PlayerState::Error);
        self.notify(SessionEvent::Error {
            session_id: self.id.clone(),
            message: error.to_string(),
        });
    }

    /// Stop, reset and release the decoder in that order. Returns false if there was none.
    pub(crate) fn release_decoder(&mut self) -> bool {
        let Some(mut slot) = self.decoder.take() else {
            return false;
        };

        log::debug!(
            "[session {}] releasing decoder generation {}",
            self.id,
            slot.generation
        );

        let stopped = slot.engine.stop();
        let reset = slot.engine.reset();
        let released = slot.engine.release_resources();
        for (step, result) in [("stop", stopped), ("reset", reset), ("release", released)] {
            if let Err(err) = result {
                let failure = SessionError::Release(format!("{}: {}", step, err));
                log::warn!("[session {}] {}", self.id, failure);
            }
        }

        // Anything the old handle still reports is stale from here on
        self.generation += 1;
        true
    }

    fn set_state(&mut self, new_state: PlayerState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }

        let checked = old_state.validate_transition(new_state);
        debug_assert!(checked.is_ok(), "[session {}] {:?}", self.id, checked);

        self.state = new_state;
        log::debug!(
            "[session {}] state changed {} -> {}",
            self.id,
            old_state,
            new_state
        );
        self.notify(SessionEvent::StateChanged {
            session_id: self.id.clone(),
            old_state,
            new_state,
        });
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if self.release_decoder() {
            log::info!("[session {}] dropped with live decoder, released", self.id);
        }
    }
}
