// Playback session state management

use crate::error::{Result, SessionError};
use std::fmt;

/// Lifecycle state of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    /// No decoder handle (never loaded, or released)
    Idle,
    /// Decoder is opening its source asynchronously
    Preparing,
    /// Decoder finished preparing and is ready to play
    Prepared,
    /// Audio is currently playing
    Playing,
    /// Audio is paused
    Paused,
    /// Playback reached the end of a non-looping source
    Completed,
    /// Decoder reported an unrecoverable fault
    Error,
}

impl PlayerState {
    /// States in which a live decoder accepts playback commands.
    ///
    /// The session additionally requires that a decoder handle exists.
    pub fn allows_playback(self) -> bool {
        !matches!(
            self,
            PlayerState::Idle | PlayerState::Preparing | PlayerState::Error
        )
    }

    /// Check a transition against the session's transition table.
    pub fn validate_transition(self, to: PlayerState) -> Result<()> {
        use PlayerState::*;

        let allowed = match (self, to) {
            // Release is legal from anywhere
            (_, Idle) => true,

            // Error is reachable from any state, including a failed load from Idle
            (from, Error) => from != Error,

            // From Idle
            (Idle, Preparing) => true,

            // From Preparing: only the prepared callback moves it forward
            (Preparing, Prepared) => true,

            // Between playback-capable states
            (Prepared | Paused | Completed, Playing) => true,
            (Prepared | Playing | Completed, Paused) => true,
            (Prepared | Playing | Paused, Completed) => true,

            _ => false,
        };

        if allowed {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PlayerState::Idle => "idle",
            PlayerState::Preparing => "preparing",
            PlayerState::Prepared => "prepared",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Completed => "completed",
            PlayerState::Error => "error",
        };
        f.write_str(name)
    }
}

/// The caller's most recently expressed intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetState {
    #[default]
    Idle,
    Playing,
    Paused,
    Completed,
}

/// What `stop()` does with the decoder handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReleaseMode {
    /// Tear the decoder down on stop
    #[default]
    Release,
    /// Loop the source; stop rewinds and holds the decoder
    Loop,
    /// Keep the decoder alive on stop, rewound and paused
    Stop,
}

impl ReleaseMode {
    pub fn is_looping(self) -> bool {
        self == ReleaseMode::Loop
    }
}

/// Output stream category requested from the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputCategory {
    /// Regular media stream, plays through the silent switch
    #[default]
    Media,
    /// Ringer stream, muted when the device is silenced
    Ringer,
}

impl OutputCategory {
    pub fn for_respect_silence(respect_silence: bool) -> Self {
        if respect_silence {
            OutputCategory::Ringer
        } else {
            OutputCategory::Media
        }
    }
}

/// Snapshot of a session's playback attributes
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlayerState,
    pub target_state: TargetState,
    /// Current playback position in milliseconds (0 unless playback-capable)
    pub position_ms: u64,
    /// Total duration in milliseconds (0 unless playback-capable)
    pub duration_ms: u64,
    /// Current volume (0.0 - 1.0)
    pub volume: f32,
    pub release_mode: ReleaseMode,
    pub respect_silence: bool,
    pub stay_awake: bool,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: PlayerState::Idle,
            target_state: TargetState::Idle,
            position_ms: 0,
            duration_ms: 0,
            volume: 1.0,
            release_mode: ReleaseMode::Release,
            respect_silence: false,
            stay_awake: false,
        }
    }
}
