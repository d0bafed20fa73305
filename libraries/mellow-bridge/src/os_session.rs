//! OS media session translator
//!
//! Turns lock-screen buttons, headset keys and audio-focus changes into
//! playback commands on the controller's queue. Translated commands are
//! not acknowledged; failures reach listeners as `error` events.

use crate::controller::MediaSessionController;
use mellow_core::{PlaybackStatus, Result};
use mellow_playback::{CommandEnvelope, PlaybackCommand};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Inbound signal from the OS media session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MediaSessionSignal {
    Play,
    Pause,
    TogglePlayPause,
    Next,
    Previous,
    Stop,
    #[serde(rename_all = "camelCase")]
    SeekTo {
        position_ms: u64,
    },
    /// Another app took audio focus
    FocusLost {
        transient: bool,
    },
    FocusGained,
    /// Headphones unplugged
    BecomingNoisy,
}

impl MediaSessionSignal {
    /// Transport controls subject to repeat suppression
    fn is_control(self) -> bool {
        !matches!(
            self,
            Self::FocusLost { .. } | Self::FocusGained | Self::BecomingNoisy
        )
    }
}

#[derive(Debug, Default)]
struct TranslatorState {
    last_control: Option<(MediaSessionSignal, Instant)>,
    /// Paused by a transient focus loss; resume when focus returns
    resume_on_focus: bool,
}

pub struct MediaSessionTranslator {
    controller: Arc<MediaSessionController>,
    dedupe_window: Duration,
    state: Mutex<TranslatorState>,
}

impl MediaSessionTranslator {
    pub fn new(controller: Arc<MediaSessionController>, dedupe_window: Duration) -> Self {
        Self {
            controller,
            dedupe_window,
            state: Mutex::new(TranslatorState::default()),
        }
    }

    /// Translate a signal and queue the resulting command
    ///
    /// Returns the queued command, or `None` when the signal was dropped
    /// (repeat inside the dedupe window, or nothing to do in the current
    /// state).
    ///
    /// # Errors
    /// `SessionDestroyed` after teardown.
    pub fn handle(&self, signal: MediaSessionSignal) -> Result<Option<PlaybackCommand>> {
        let Some(command) = self.translate(signal) else {
            debug!(?signal, "Media session signal ignored");
            return Ok(None);
        };

        debug!(?signal, command = %command.tag(), "Media session signal translated");
        self.controller
            .submit_detached(CommandEnvelope::system(command.clone()))?;
        Ok(Some(command))
    }

    fn translate(&self, signal: MediaSessionSignal) -> Option<PlaybackCommand> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if signal.is_control() {
            let now = Instant::now();
            if let Some((last, at)) = state.last_control {
                if last == signal && now.duration_since(at) < self.dedupe_window {
                    warn!(?signal, "Dropping repeated media control");
                    return None;
                }
            }
            state.last_control = Some((signal, now));
        }

        let playing = self.controller.snapshot().status == PlaybackStatus::Playing;

        match signal {
            MediaSessionSignal::Play => {
                state.resume_on_focus = false;
                Some(PlaybackCommand::play())
            }
            MediaSessionSignal::Pause => {
                state.resume_on_focus = false;
                Some(PlaybackCommand::Pause)
            }
            MediaSessionSignal::TogglePlayPause => {
                state.resume_on_focus = false;
                Some(if playing {
                    PlaybackCommand::Pause
                } else {
                    PlaybackCommand::play()
                })
            }
            MediaSessionSignal::Next => Some(PlaybackCommand::SkipNext),
            MediaSessionSignal::Previous => Some(PlaybackCommand::SkipPrevious),
            MediaSessionSignal::Stop => {
                state.resume_on_focus = false;
                Some(PlaybackCommand::Stop)
            }
            MediaSessionSignal::SeekTo { position_ms } => Some(PlaybackCommand::seek(position_ms)),
            MediaSessionSignal::FocusLost { transient } => {
                if !playing {
                    return None;
                }
                state.resume_on_focus = transient;
                Some(PlaybackCommand::Pause)
            }
            MediaSessionSignal::FocusGained => {
                if !std::mem::take(&mut state.resume_on_focus) {
                    return None;
                }
                Some(PlaybackCommand::play())
            }
            MediaSessionSignal::BecomingNoisy => {
                state.resume_on_focus = false;
                playing.then_some(PlaybackCommand::Pause)
            }
        }
    }
}

impl std::fmt::Debug for MediaSessionTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSessionTranslator")
            .field("dedupe_window", &self.dedupe_window)
            .finish_non_exhaustive()
    }
}
