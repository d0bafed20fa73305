//! Mellow - Playback Session
//!
//! Platform-agnostic playback session for the Mellow native media bridge.
//!
//! This crate provides:
//! - Typed playback commands and their wire tags
//! - Bridge events (state changes, errors, acknowledgements)
//! - The track queue
//! - The session state machine (idle, loading, playing, paused, stopped, error)
//! - A simulated native engine for tests and the host application
//!
//! # Architecture
//!
//! `mellow-playback` knows nothing about the web layer or threading:
//! - No JSON decoding (lives in `mellow-bridge`)
//! - No worker task or cancellation (lives in `mellow-bridge`)
//! - Native collaborators are provided through `mellow-core` traits
//!
//! # Example
//!
//! ```rust
//! use mellow_playback::{simulated_native, NullSink, PlaybackCommand, Session, SessionConfig};
//! use mellow_core::{PlaybackStatus, TrackRef};
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let (native, probe) = simulated_native();
//! let mut session = Session::new(native, Arc::new(NullSink), SessionConfig::default());
//!
//! let track = TrackRef::new("t1", "file:///music/t1.mp3#duration=60000");
//! let state = session.execute(&PlaybackCommand::play_track(track)).await.unwrap();
//! assert_eq!(state.status, PlaybackStatus::Playing);
//! assert!(probe.focus_held());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod command;
pub mod events;
pub mod queue;
pub mod session;
pub mod simulated;
pub mod types;

pub use command::{CommandEnvelope, CommandTag, Origin, PlaybackCommand, TrackSelector};
pub use events::{BridgeEvent, EventSink, NullSink, RecordingSink};
pub use queue::TrackQueue;
pub use session::Session;
pub use simulated::{
    simulated_native, simulated_native_with_latency, Published, SimulatedProbe,
    DEFAULT_DURATION_MS,
};
pub use types::{SessionConfig, DEFAULT_RESTART_THRESHOLD_MS, DEFAULT_VOLUME};
