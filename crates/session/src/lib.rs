// Playback session state machine and its thread-safe handle
//
// A session owns at most one decoder handle, accepts commands in any state and
// replays deferred intent (play, seek) once the decoder reports prepared.

pub mod handle;
pub mod inbox;
pub mod outbox;
pub mod reporter;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use handle::SessionHandle;
pub use outbox::EventOutbox;
pub use reporter::PositionReporter;
pub use session::{PlaybackSession, SeekSlot};
pub use tempo_core::{
    init_logging, DecoderEngine, DecoderEvents, DecoderFactory, OutputCategory, PlaybackStatus,
    PlayerState, ReleaseMode, Result, SessionConfig, SessionError, SessionEvent, SessionId,
    SessionObserver, TargetState,
};

/// Create a session from a config and wrap it in a shareable handle.
pub fn create_session(
    id: impl Into<SessionId>,
    factory: std::sync::Arc<dyn DecoderFactory>,
    config: SessionConfig,
) -> Result<SessionHandle> {
    init_logging();
    let session = PlaybackSession::with_config(id, factory, config)?;
    log::info!("Creating playback session {}", session.id());
    Ok(SessionHandle::new(session))
}
