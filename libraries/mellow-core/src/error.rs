/// Core error types for the Mellow media bridge
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using `MediaError`
pub type Result<T> = std::result::Result<T, MediaError>;

/// Core error type for the media bridge
///
/// Every command issued by the web layer resolves either to a value or to
/// exactly one of these variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Method name is not part of the command vocabulary
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),

    /// Arguments did not match the shape required by the command
    #[error("Malformed arguments for {method}: {reason}")]
    Decode { method: String, reason: String },

    /// Command is illegal in the current playback state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Native engine failure (unreadable source, network loss, focus denied)
    #[error("Playback error: {0}")]
    Playback(String),

    /// Command arrived after the session was torn down
    #[error("Session destroyed")]
    SessionDestroyed,

    /// Command was aborted by session teardown
    #[error("Command cancelled")]
    Cancelled,

    /// Registration ordering or duplicate registration violation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Host bridge has no plugin registered under this id
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),
}

impl MediaError {
    /// Create a decode error
    pub fn decode(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a playback error
    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Wire-level classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedCommand(_) => ErrorKind::UnsupportedCommand,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Playback(_) => ErrorKind::PlaybackError,
            Self::SessionDestroyed => ErrorKind::SessionDestroyed,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Configuration(_) => ErrorKind::ConfigurationError,
            Self::PluginNotFound(_) => ErrorKind::PluginNotFound,
        }
    }

    /// Errors that move the session into `error` status and are broadcast
    pub fn is_session_fault(&self) -> bool {
        matches!(self, Self::InvalidState(_) | Self::Playback(_))
    }
}

/// Error classification carried in `error` bridge events and call rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    UnsupportedCommand,
    DecodeError,
    InvalidState,
    PlaybackError,
    SessionDestroyed,
    Cancelled,
    ConfigurationError,
    PluginNotFound,
}

impl ErrorKind {
    /// Wire name of the kind
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedCommand => "unsupportedCommand",
            Self::DecodeError => "decodeError",
            Self::InvalidState => "invalidState",
            Self::PlaybackError => "playbackError",
            Self::SessionDestroyed => "sessionDestroyed",
            Self::Cancelled => "cancelled",
            Self::ConfigurationError => "configurationError",
            Self::PluginNotFound => "pluginNotFound",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
