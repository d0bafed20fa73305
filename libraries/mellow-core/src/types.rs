//! Core domain types shared by every layer of the bridge

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fallback title shown on the lock screen when a track has none
pub const DEFAULT_TITLE: &str = "Mellow";

/// Reference to a playable track
///
/// Immutable once enqueued. The source URI is opaque to the bridge and is
/// resolved by the native playback engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRef {
    /// Identifier, unique within a queue
    pub id: String,

    /// Track title
    #[serde(default)]
    pub title: String,

    /// Artist display name
    #[serde(default)]
    pub artist: String,

    /// Cover art location (optional)
    #[serde(default)]
    pub artwork_uri: Option<String>,

    /// Location handed to the playback engine
    pub source_uri: String,
}

impl TrackRef {
    /// Create a track with only an id and source
    pub fn new(id: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            artist: String::new(),
            artwork_uri: None,
            source_uri: source_uri.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }
}

/// Playback status of the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Fresh session, nothing played yet
    #[default]
    Idle,

    /// Engine is preparing the current track
    Loading,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Stopped, current track kept for the next play
    Stopped,

    /// Last command failed; next play retries
    Error,
}

impl PlaybackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the playback session as seen by the web layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub status: PlaybackStatus,

    pub current_track_id: Option<String>,

    pub position_ms: u64,

    /// Known once the engine has loaded the current track
    pub duration_ms: Option<u64>,

    /// Playback order
    pub queue: Vec<TrackRef>,

    /// Output volume (0-100)
    pub volume: u8,
}

impl PlaybackState {
    /// Idle state of a fresh session
    pub fn idle(volume: u8) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            current_track_id: None,
            position_ms: 0,
            duration_ms: None,
            queue: Vec::new(),
            volume: volume.min(100),
        }
    }

    /// Queued entry for the current track, if it is still queued
    pub fn current_track(&self) -> Option<&TrackRef> {
        let id = self.current_track_id.as_deref()?;
        self.queue.iter().find(|track| track.id == id)
    }

    /// Check the data-model invariants
    ///
    /// - position never exceeds a known duration
    /// - `playing` always has a current track
    /// - volume stays within 0-100
    pub fn is_consistent(&self) -> bool {
        let position_ok = self.duration_ms.map_or(true, |d| self.position_ms <= d);
        let playing_ok =
            self.status != PlaybackStatus::Playing || self.current_track_id.is_some();
        position_ok && playing_ok && self.volume <= 100
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::idle(80)
    }
}

/// Correlation id matching an asynchronous response to its command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id for calls that did not carry one
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the lock screen / notification shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    pub artwork_uri: Option<String>,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: Option<u64>,
}

impl NowPlaying {
    /// Build from the session's current track, if any
    pub fn from_state(state: &PlaybackState) -> Option<Self> {
        state
            .current_track()
            .map(|track| Self::from_track(track, state))
    }

    /// Build for a track that may no longer be queued
    pub fn from_track(track: &TrackRef, state: &PlaybackState) -> Self {
        let title = if track.title.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            track.title.clone()
        };

        Self {
            title,
            artist: track.artist.clone(),
            artwork_uri: track.artwork_uri.clone(),
            is_playing: state.status == PlaybackStatus::Playing,
            position_ms: state.position_ms,
            duration_ms: state.duration_ms,
        }
    }

    /// Whether the notification has to be rebuilt (anything but position changed)
    pub fn same_metadata(&self, other: &Self) -> bool {
        self.title == other.title
            && self.artist == other.artist
            && self.artwork_uri == other.artwork_uri
            && self.is_playing == other.is_playing
            && self.duration_ms == other.duration_ms
    }
}
