// Error handling for playback sessions

use crate::state::PlayerState;
use thiserror::Error;

/// Playback session error types
///
/// None of these cross the session's command surface: commands are deferred or
/// ignored, and decoder faults are reported to observers as events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Decoder could not open the requested source
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// A decoder control operation failed
    #[error("Decoder error: {0}")]
    Decoder(String),

    /// Stopping, resetting or releasing a decoder failed
    #[error("Release error: {0}")]
    Release(String),

    /// Callback from a decoder handle that is no longer live
    #[error("Stale callback from generation {generation} (live: {live:?})")]
    Stale { generation: u64, live: Option<u64> },

    /// Transition not present in the state table
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: PlayerState, to: PlayerState },

    /// Rejected session configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
