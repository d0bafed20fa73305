/// Native collaborator traits
///
/// The media session controller is the only owner of these handles. Platform
/// code (Android `MediaSession`, AVAudioSession, MPRIS, ...) implements them;
/// `mellow-playback` ships a simulated implementation for tests and the host.
use crate::error::Result;
use crate::types::{NowPlaying, TrackRef};
use async_trait::async_trait;

/// Native playback engine handle
#[async_trait]
pub trait PlaybackEngine: Send {
    /// Prepare a track for playback
    ///
    /// Returns the track duration in milliseconds when the engine knows it.
    ///
    /// # Errors
    /// Returns a playback error if the source cannot be opened
    async fn load(&mut self, track: &TrackRef) -> Result<Option<u64>>;

    /// Start or resume output of the loaded track at `position_ms`
    async fn start(&mut self, position_ms: u64) -> Result<()>;

    /// Pause output, keeping the track loaded
    async fn pause(&mut self) -> Result<()>;

    /// Stop output and unload the track
    async fn stop(&mut self) -> Result<()>;

    /// Move the read position of the loaded track
    async fn seek(&mut self, position_ms: u64) -> Result<()>;

    /// Apply output volume (0-100)
    async fn set_volume(&mut self, level: u8) -> Result<()>;

    /// Current read position as reported by the engine
    ///
    /// `None` when the engine does not track position itself.
    fn position_ms(&self) -> Option<u64> {
        None
    }

    /// Free every native resource held by the engine
    ///
    /// Must not fail; called unconditionally on teardown.
    async fn release(&mut self);
}

/// OS audio focus arbitration
#[async_trait]
pub trait AudioFocus: Send {
    /// Request focus before output starts
    ///
    /// Returns `false` when the OS denies the request. Requesting while
    /// already holding focus is a no-op that returns `true`.
    async fn request(&mut self) -> Result<bool>;

    /// Give focus back
    async fn abandon(&mut self);
}

/// Lock-screen / notification media controls
pub trait MediaSessionSurface: Send {
    /// Rebuild the notification with new metadata
    fn publish_metadata(&mut self, now_playing: &NowPlaying);

    /// Update only the playback position, without rebuilding metadata
    fn publish_position(&mut self, position_ms: u64, is_playing: bool);

    /// Remove the notification and deactivate the session
    fn release(&mut self);
}

/// Bundle of native handles owned by one playback session
pub struct NativeMedia {
    pub engine: Box<dyn PlaybackEngine>,
    pub focus: Box<dyn AudioFocus>,
    pub surface: Box<dyn MediaSessionSurface>,
}

impl NativeMedia {
    pub fn new(
        engine: Box<dyn PlaybackEngine>,
        focus: Box<dyn AudioFocus>,
        surface: Box<dyn MediaSessionSurface>,
    ) -> Self {
        Self {
            engine,
            focus,
            surface,
        }
    }
}

impl std::fmt::Debug for NativeMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeMedia").finish_non_exhaustive()
    }
}
