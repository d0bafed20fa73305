//! Session configuration

/// Default output volume of a fresh session
pub const DEFAULT_VOLUME: u8 = 80;

/// Default skip-previous restart threshold
pub const DEFAULT_RESTART_THRESHOLD_MS: u64 = 3000;

/// Settings for one playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Volume of a fresh session (0-100)
    pub initial_volume: u8,

    /// `skipPrevious` past this position restarts the current track
    pub restart_threshold_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_volume: DEFAULT_VOLUME,
            restart_threshold_ms: DEFAULT_RESTART_THRESHOLD_MS,
        }
    }
}
