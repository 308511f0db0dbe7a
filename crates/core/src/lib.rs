// Core types and traits for Tempo playback sessions

pub mod callback;
pub mod config;
pub mod decoder;
pub mod error;
pub mod state;

use std::sync::Once;

// Re-export commonly used types
pub use callback::{ObserverManager, SessionEvent, SessionId, SessionObserver};
pub use config::SessionConfig;
pub use decoder::{DecoderEngine, DecoderEvent, DecoderEventSink, DecoderEvents, DecoderFactory};
pub use error::{Result, SessionError};
pub use state::{OutputCategory, PlaybackStatus, PlayerState, ReleaseMode, TargetState};

static INIT_LOGGER: Once = Once::new();

/// Install `env_logger` once; `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .try_init();
    });
}
