//! Mellow Core
//!
//! Platform-agnostic core types, traits, and error handling for the Mellow
//! native media bridge.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `TrackRef`, `PlaybackState`, `CorrelationId`, `NowPlaying`
//! - **Native Traits**: `PlaybackEngine`, `AudioFocus`, `MediaSessionSurface`
//! - **Error Handling**: Unified `MediaError`, `ErrorKind` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use mellow_core::{PlaybackState, PlaybackStatus, TrackRef};
//!
//! let track = TrackRef::new("t1", "https://cdn.example.com/t1.mp3")
//!     .with_title("Slow Morning")
//!     .with_artist("Mellow Band");
//!
//! let mut state = PlaybackState::idle(80);
//! state.queue.push(track);
//! assert_eq!(state.status, PlaybackStatus::Idle);
//! assert!(state.is_consistent());
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{ErrorKind, MediaError, Result};
pub use traits::{AudioFocus, MediaSessionSurface, NativeMedia, PlaybackEngine};
pub use types::{
    CorrelationId, NowPlaying, PlaybackState, PlaybackStatus, TrackRef, DEFAULT_TITLE,
};
