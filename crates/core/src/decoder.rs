// Decoder abstraction layer

use crate::error::Result;
use crate::state::OutputCategory;
use std::fmt;
use std::sync::Arc;

/// Decoder engine trait
/// Platform-specific decoders implement this; the session is the only caller.
///
/// `open` must not block on preparation: completion is reported later through
/// the [`DecoderEvents`] handed to the factory.
pub trait DecoderEngine: Send {
    /// Start opening the source asynchronously
    fn open(&mut self, source: &str) -> Result<()>;

    /// Set per-channel volume
    fn set_volume(&mut self, left: f32, right: f32) -> Result<()>;

    /// Loop the source at the decoder level
    fn set_looping(&mut self, looping: bool) -> Result<()>;

    /// Route output to the given stream category
    fn set_output_category(&mut self, category: OutputCategory) -> Result<()>;

    /// Keep the device awake while this decoder plays
    fn request_wake_lock(&mut self) -> Result<()>;

    /// Start or resume playback
    fn start(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Seek to a specific position (in milliseconds)
    fn seek_to(&mut self, position_ms: u64) -> Result<()>;

    /// Return to the unconfigured state
    fn reset(&mut self) -> Result<()>;

    /// Release all native resources; the engine is dropped afterwards
    fn release_resources(&mut self) -> Result<()>;

    fn duration_ms(&self) -> u64;

    fn position_ms(&self) -> u64;

    fn is_playing(&self) -> bool;
}

/// Creates a fresh decoder handle per source load
pub trait DecoderFactory: Send + Sync {
    /// The returned engine reports its lifecycle through `events`.
    fn create(&self, events: DecoderEvents) -> Result<Box<dyn DecoderEngine>>;
}

/// Asynchronous decoder notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderEvent {
    Prepared,
    Completed,
    Error(String),
}

/// Receiver side of decoder notifications, implemented by the session
pub trait DecoderEventSink: Send + Sync {
    fn deliver(&self, generation: u64, event: DecoderEvent);
}

/// Callback capability handed to a decoder at creation.
///
/// Every notification is tagged with the generation of the handle it was
/// created for, so the session can discard callbacks from replaced handles.
/// Safe to clone and call from any thread.
#[derive(Clone)]
pub struct DecoderEvents {
    generation: u64,
    sink: Arc<dyn DecoderEventSink>,
}

impl DecoderEvents {
    pub fn new(generation: u64, sink: Arc<dyn DecoderEventSink>) -> Self {
        Self { generation, sink }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn prepared(&self) {
        self.sink.deliver(self.generation, DecoderEvent::Prepared);
    }

    pub fn completed(&self) {
        self.sink.deliver(self.generation, DecoderEvent::Completed);
    }

    pub fn error(&self, detail: impl Into<String>) {
        self.sink
            .deliver(self.generation, DecoderEvent::Error(detail.into()));
    }
}

impl fmt::Debug for DecoderEvents {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DecoderEvents")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
