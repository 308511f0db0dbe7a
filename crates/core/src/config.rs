// Session configuration

use crate::error::{Result, SessionError};
use crate::state::ReleaseMode;
use std::time::Duration;

/// Default volume for a new session
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Position update interval (milliseconds)
pub const POSITION_UPDATE_INTERVAL_MS: u64 = 200;

/// Default per-observer throttle for position events (milliseconds)
pub const OBSERVER_THROTTLE_MS: u64 = 100;

/// Initial attributes of a playback session.
///
/// Attributes set here are applied to every decoder the session creates until
/// the caller changes them.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Initial volume (0.0 - 1.0)
    pub volume: f32,
    pub release_mode: ReleaseMode,
    /// Route output to the ringer stream so the silent switch mutes it
    pub respect_silence: bool,
    /// Request a wake lock while a decoder is live
    pub stay_awake: bool,
    /// How often the position reporter polls the decoder
    pub position_update_interval: Duration,
    /// Throttle applied to observers registered without an explicit one
    pub observer_throttle_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            release_mode: ReleaseMode::Release,
            respect_silence: false,
            stay_awake: false,
            position_update_interval: Duration::from_millis(POSITION_UPDATE_INTERVAL_MS),
            observer_throttle_ms: OBSERVER_THROTTLE_MS,
        }
    }
}

impl SessionConfig {
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_release_mode(mut self, release_mode: ReleaseMode) -> Self {
        self.release_mode = release_mode;
        self
    }

    pub fn with_respect_silence(mut self, respect_silence: bool) -> Self {
        self.respect_silence = respect_silence;
        self
    }

    pub fn with_stay_awake(mut self, stay_awake: bool) -> Self {
        self.stay_awake = stay_awake;
        self
    }

    pub fn with_position_update_interval(mut self, interval: Duration) -> Self {
        self.position_update_interval = interval;
        self
    }

    pub fn with_observer_throttle_ms(mut self, throttle_ms: u64) -> Self {
        self.observer_throttle_ms = throttle_ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.volume.is_finite() || !(0.0..=1.0).contains(&self.volume) {
            return Err(SessionError::InvalidConfig(format!(
                "Volume out of range: {}",
                self.volume
            )));
        }
        if self.position_update_interval.is_zero() {
            return Err(SessionError::InvalidConfig(
                "Position update interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
