// Recording test doubles for decoders and observers

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tempo_core::{
    DecoderEngine, DecoderEvents, DecoderFactory, OutputCategory, PlayerState, Result,
    SessionError, SessionEvent, SessionObserver,
};

pub const MOCK_DURATION_MS: u64 = 180_000;

/// Decoder operations as seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open(String),
    SetVolume(f32, f32),
    SetLooping(bool),
    SetOutputCategory(OutputCategory),
    RequestWakeLock,
    Start,
    Pause,
    Stop,
    SeekTo(u64),
    Reset,
    ReleaseResources,
}

#[derive(Default)]
struct MockFlags {
    fail_create: AtomicBool,
    fail_open: AtomicBool,
    fail_start: AtomicBool,
    fail_seek: AtomicBool,
    fail_release: AtomicBool,
    prepare_on_open: AtomicBool,
}

/// Test-side view of one decoder the factory created
pub struct DecoderProbe {
    events: DecoderEvents,
    calls: Mutex<Vec<Call>>,
    playing: AtomicBool,
    position_ms: AtomicU64,
}

impl DecoderProbe {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    pub fn events(&self) -> DecoderEvents {
        self.events.clone()
    }

    pub fn position(&self) -> u64 {
        self.position_ms.load(Ordering::SeqCst)
    }

    pub fn set_position(&self, position_ms: u64) {
        self.position_ms.store(position_ms, Ordering::SeqCst);
    }

    pub fn prepared(&self) {
        self.events.prepared();
    }

    pub fn completed(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.events.completed();
    }

    pub fn error(&self, detail: &str) {
        self.playing.store(false, Ordering::SeqCst);
        self.events.error(detail);
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

struct MockDecoder {
    probe: Arc<DecoderProbe>,
    flags: Arc<MockFlags>,
}

impl MockDecoder {
    fn fail_if(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(SessionError::Decoder(format!("mock {} failure", what)))
        } else {
            Ok(())
        }
    }
}

impl DecoderEngine for MockDecoder {
    fn open(&mut self, source: &str) -> Result<()> {
        self.probe.record(Call::Open(source.to_string()));
        Self::fail_if(&self.flags.fail_open, "open")?;
        if self.flags.prepare_on_open.load(Ordering::SeqCst) {
            self.probe.prepared();
        }
        Ok(())
    }

    fn set_volume(&mut self, left: f32, right: f32) -> Result<()> {
        self.probe.record(Call::SetVolume(left, right));
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) -> Result<()> {
        self.probe.record(Call::SetLooping(looping));
        Ok(())
    }

    fn set_output_category(&mut self, category: OutputCategory) -> Result<()> {
        self.probe.record(Call::SetOutputCategory(category));
        Ok(())
    }

    fn request_wake_lock(&mut self) -> Result<()> {
        self.probe.record(Call::RequestWakeLock);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.probe.record(Call::Start);
        Self::fail_if(&self.flags.fail_start, "start")?;
        self.probe.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.probe.record(Call::Pause);
        self.probe.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.probe.record(Call::Stop);
        self.probe.playing.store(false, Ordering::SeqCst);
        Self::fail_if(&self.flags.fail_release, "stop")
    }

    fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        self.probe.record(Call::SeekTo(position_ms));
        Self::fail_if(&self.flags.fail_seek, "seek")?;
        self.probe.set_position(position_ms);
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.probe.record(Call::Reset);
        Self::fail_if(&self.flags.fail_release, "reset")
    }

    fn release_resources(&mut self) -> Result<()> {
        self.probe.record(Call::ReleaseResources);
        Self::fail_if(&self.flags.fail_release, "release")
    }

    fn duration_ms(&self) -> u64 {
        MOCK_DURATION_MS
    }

    fn position_ms(&self) -> u64 {
        self.probe.position()
    }

    fn is_playing(&self) -> bool {
        self.probe.playing.load(Ordering::SeqCst)
    }
}

/// Factory that hands out recording decoders and keeps a probe for each
#[derive(Default)]
pub struct MockFactory {
    probes: Mutex<Vec<Arc<DecoderProbe>>>,
    flags: Arc<MockFlags>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.probes.lock().len()
    }

    pub fn decoder(&self, index: usize) -> Arc<DecoderProbe> {
        self.probes.lock()[index].clone()
    }

    pub fn last(&self) -> Arc<DecoderProbe> {
        self.probes
            .lock()
            .last()
            .cloned()
            .expect("no decoder created yet")
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.flags.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.flags.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.flags.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_seek(&self, fail: bool) {
        self.flags.fail_seek.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_release(&self, fail: bool) {
        self.flags.fail_release.store(fail, Ordering::SeqCst);
    }

    /// Fire `prepared` synchronously from inside `open`
    pub fn set_prepare_on_open(&self, enabled: bool) {
        self.flags.prepare_on_open.store(enabled, Ordering::SeqCst);
    }
}

impl DecoderFactory for MockFactory {
    fn create(&self, events: DecoderEvents) -> Result<Box<dyn DecoderEngine>> {
        if self.flags.fail_create.load(Ordering::SeqCst) {
            return Err(SessionError::Decoder("mock create failure".to_string()));
        }

        let probe = Arc::new(DecoderProbe {
            events,
            calls: Mutex::new(Vec::new()),
            playing: AtomicBool::new(false),
            position_ms: AtomicU64::new(0),
        });
        self.probes.lock().push(probe.clone());

        Ok(Box::new(MockDecoder {
            probe,
            flags: self.flags.clone(),
        }))
    }
}

/// Observer that keeps every event it receives
pub struct RecordingObserver {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    pub fn durations(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Duration { duration_ms, .. } => Some(duration_ms),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Error { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Completed { .. }))
            .count()
    }

    pub fn became_active(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::BecameActive { .. }))
            .count()
    }

    pub fn transitions(&self) -> Vec<(PlayerState, PlayerState)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged {
                    old_state,
                    new_state,
                    ..
                } => Some((old_state, new_state)),
                _ => None,
            })
            .collect()
    }

    pub fn positions(&self) -> Vec<(u64, u64)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::PositionChanged {
                    position_ms,
                    duration_ms,
                    ..
                } => Some((position_ms, duration_ms)),
                _ => None,
            })
            .collect()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_event(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }
}
