//! Playback commands
//!
//! Commands are decoded once at the bridge boundary; everything past that
//! point dispatches with an exhaustive match on [`PlaybackCommand`].

use mellow_core::{CorrelationId, TrackRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Track requested by a `play` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackSelector {
    /// Full track reference; enqueued at the end when its id is not queued yet
    Track(TrackRef),

    /// Id of an already queued track
    Id(String),
}

impl TrackSelector {
    pub fn id(&self) -> &str {
        match self {
            Self::Track(track) => &track.id,
            Self::Id(id) => id,
        }
    }
}

/// Commands executed by the media session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackCommand {
    /// Start, resume, or switch to a track
    Play { track: Option<TrackSelector> },

    /// Pause playback
    Pause,

    /// Stop playback, keeping the current track
    Stop,

    /// Seek within the current track (milliseconds)
    Seek { position_ms: u64 },

    /// Replace the queue
    SetQueue { tracks: Vec<TrackRef> },

    /// Skip to the next queued track
    SkipNext,

    /// Go back to the previous queued track (or restart the current one)
    SkipPrevious,

    /// Set output volume (0-100)
    SetVolume { level: u8 },
}

impl PlaybackCommand {
    /// Plain resume/start with no track selection
    pub fn play() -> Self {
        Self::Play { track: None }
    }

    /// Play a specific track
    pub fn play_track(track: TrackRef) -> Self {
        Self::Play {
            track: Some(TrackSelector::Track(track)),
        }
    }

    pub fn seek(position_ms: u64) -> Self {
        Self::Seek { position_ms }
    }

    pub fn tag(&self) -> CommandTag {
        match self {
            Self::Play { .. } => CommandTag::Play,
            Self::Pause => CommandTag::Pause,
            Self::Stop => CommandTag::Stop,
            Self::Seek { .. } => CommandTag::Seek,
            Self::SetQueue { .. } => CommandTag::SetQueue,
            Self::SkipNext => CommandTag::SkipNext,
            Self::SkipPrevious => CommandTag::SkipPrevious,
            Self::SetVolume { .. } => CommandTag::SetVolume,
        }
    }
}

/// Wire name of each command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTag {
    Play,
    Pause,
    Stop,
    Seek,
    SetQueue,
    SkipNext,
    SkipPrevious,
    SetVolume,
}

impl CommandTag {
    /// Every tag, in declaration order
    pub const ALL: [CommandTag; 8] = [
        Self::Play,
        Self::Pause,
        Self::Stop,
        Self::Seek,
        Self::SetQueue,
        Self::SkipNext,
        Self::SkipPrevious,
        Self::SetVolume,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Seek => "seek",
            Self::SetQueue => "setQueue",
            Self::SkipNext => "skipNext",
            Self::SkipPrevious => "skipPrevious",
            Self::SetVolume => "setVolume",
        }
    }
}

impl FromStr for CommandTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a command came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Web-layer call through the bridge; acknowledged with `commandAck`
    WebLayer,

    /// OS media session (lock screen, headset buttons, audio focus)
    System,
}

/// Command plus the id used to correlate its asynchronous response
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    pub correlation_id: CorrelationId,
    pub command: PlaybackCommand,
    pub origin: Origin,
}

impl CommandEnvelope {
    pub fn web(correlation_id: CorrelationId, command: PlaybackCommand) -> Self {
        Self {
            correlation_id,
            command,
            origin: Origin::WebLayer,
        }
    }

    pub fn system(command: PlaybackCommand) -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            command,
            origin: Origin::System,
        }
    }
}
