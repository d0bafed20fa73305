//! Playback session - the command state machine
//!
//! One `Session` per process. It exclusively owns the native engine, the
//! audio focus grant and the lock-screen surface. Commands are applied one at
//! a time by whoever owns the session (the bridge runs it on a single worker
//! task); every state transition is emitted at most once through the
//! [`EventSink`].

use crate::{
    command::{PlaybackCommand, TrackSelector},
    events::{BridgeEvent, EventSink},
    queue::TrackQueue,
    types::SessionConfig,
};
use mellow_core::{
    MediaError, NativeMedia, NowPlaying, PlaybackState, PlaybackStatus, Result, TrackRef,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct Session {
    config: SessionConfig,
    native: NativeMedia,
    sink: Arc<dyn EventSink>,

    status: PlaybackStatus,

    /// Current track; may be detached from the queue after `setQueue`
    current: Option<TrackRef>,
    queue: TrackQueue,
    position_ms: u64,
    duration_ms: Option<u64>,
    volume: u8,

    has_focus: bool,
    released: bool,

    /// Last snapshot sent as `stateChanged`
    last_emitted: PlaybackState,

    /// Last snapshot pushed to the lock-screen surface
    published: Option<NowPlaying>,
}

impl Session {
    pub fn new(native: NativeMedia, sink: Arc<dyn EventSink>, config: SessionConfig) -> Self {
        let volume = config.initial_volume.min(100);

        Self {
            config,
            native,
            sink,
            status: PlaybackStatus::Idle,
            current: None,
            queue: TrackQueue::new(),
            position_ms: 0,
            duration_ms: None,
            volume,
            has_focus: false,
            released: false,
            last_emitted: PlaybackState::idle(volume),
            published: None,
        }
    }

    /// Apply one command
    ///
    /// On success returns the resulting snapshot. `InvalidState` and
    /// `Playback` failures move the session to `error` and are broadcast
    /// (error event first, then the state change).
    ///
    /// # Errors
    /// `SessionDestroyed` after [`Session::release`], otherwise whatever the
    /// command produced.
    pub async fn execute(&mut self, command: &PlaybackCommand) -> Result<PlaybackState> {
        if self.released {
            return Err(MediaError::SessionDestroyed);
        }

        self.sync_position();
        debug!(command = %command.tag(), status = %self.status, "Executing command");

        match self.apply(command).await {
            Ok(()) => {
                self.commit();
                Ok(self.snapshot())
            }
            Err(err) => {
                self.fault(&err).await;
                Err(err)
            }
        }
    }

    async fn apply(&mut self, command: &PlaybackCommand) -> Result<()> {
        match command {
            PlaybackCommand::Play { track } => self.play(track.as_ref()).await,
            PlaybackCommand::Pause => self.pause().await,
            PlaybackCommand::Stop => self.stop().await,
            PlaybackCommand::Seek { position_ms } => self.seek(*position_ms).await,
            PlaybackCommand::SetQueue { tracks } => self.set_queue(tracks),
            PlaybackCommand::SkipNext => self.skip(true).await,
            PlaybackCommand::SkipPrevious => self.skip(false).await,
            PlaybackCommand::SetVolume { level } => self.set_volume(*level).await,
        }
    }

    async fn play(&mut self, selector: Option<&TrackSelector>) -> Result<()> {
        if let Some(selector) = selector {
            let index = match selector {
                TrackSelector::Track(track) => self.queue.push_unique(track.clone()),
                TrackSelector::Id(id) => self.queue.position(id).ok_or_else(|| {
                    MediaError::invalid_state(format!("track {id} is not queued"))
                })?,
            };

            let track = self
                .queue
                .get(index)
                .cloned()
                .ok_or_else(|| MediaError::invalid_state("queue changed during play"))?;

            if self.current_id() == Some(track.id.as_str()) {
                match self.status {
                    PlaybackStatus::Playing => return Ok(()),
                    PlaybackStatus::Paused => return self.resume().await,
                    _ => {}
                }
            }

            return self.load_and_start(track, true).await;
        }

        match self.status {
            PlaybackStatus::Playing => Ok(()),
            PlaybackStatus::Paused => self.resume().await,
            PlaybackStatus::Idle
            | PlaybackStatus::Loading
            | PlaybackStatus::Stopped
            | PlaybackStatus::Error => {
                let track = self
                    .current
                    .clone()
                    .or_else(|| self.queue.get(0).cloned())
                    .ok_or_else(|| MediaError::invalid_state("nothing to play, queue is empty"))?;

                self.load_and_start(track, true).await
            }
        }
    }

    async fn resume(&mut self) -> Result<()> {
        self.start_output().await?;
        self.status = PlaybackStatus::Playing;
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        match self.status {
            PlaybackStatus::Playing => {
                self.native.engine.pause().await?;
                self.sync_position();
                self.status = PlaybackStatus::Paused;
                Ok(())
            }
            PlaybackStatus::Paused | PlaybackStatus::Stopped => Ok(()),
            PlaybackStatus::Idle | PlaybackStatus::Loading | PlaybackStatus::Error => Err(
                MediaError::invalid_state(format!("cannot pause while {}", self.status)),
            ),
        }
    }

    async fn stop(&mut self) -> Result<()> {
        match self.status {
            PlaybackStatus::Idle => Err(MediaError::invalid_state("cannot stop while idle")),
            PlaybackStatus::Stopped => Ok(()),
            PlaybackStatus::Playing
            | PlaybackStatus::Paused
            | PlaybackStatus::Loading
            | PlaybackStatus::Error => {
                self.native.engine.stop().await?;
                self.abandon_focus().await;
                self.status = PlaybackStatus::Stopped;
                self.position_ms = 0;
                Ok(())
            }
        }
    }

    async fn seek(&mut self, position_ms: u64) -> Result<()> {
        match self.status {
            PlaybackStatus::Playing | PlaybackStatus::Paused => {
                let clamped = self.clamp_position(position_ms);
                self.native.engine.seek(clamped).await?;
                self.position_ms = clamped;
                Ok(())
            }
            _ => Err(MediaError::invalid_state(format!(
                "cannot seek while {}",
                self.status
            ))),
        }
    }

    fn set_queue(&mut self, tracks: &[TrackRef]) -> Result<()> {
        if self.status == PlaybackStatus::Idle {
            return Err(MediaError::invalid_state("cannot replace queue while idle"));
        }

        self.queue
            .replace(tracks.to_vec())
            .map_err(|id| MediaError::decode("setQueue", format!("duplicate track id {id}")))
    }

    async fn skip(&mut self, forward: bool) -> Result<()> {
        let playing = match self.status {
            PlaybackStatus::Playing => true,
            PlaybackStatus::Paused | PlaybackStatus::Stopped => false,
            PlaybackStatus::Idle | PlaybackStatus::Loading | PlaybackStatus::Error => {
                return Err(MediaError::invalid_state(format!(
                    "cannot skip while {}",
                    self.status
                )));
            }
        };

        if !forward
            && self.status != PlaybackStatus::Stopped
            && self.position_ms > self.config.restart_threshold_ms
        {
            debug!(position_ms = self.position_ms, "Restarting current track");
            self.native.engine.seek(0).await?;
            self.position_ms = 0;
            return Ok(());
        }

        let current = self.current_id();
        let index = if forward {
            self.queue.next_index(current)
        } else {
            self.queue.previous_index(current)
        };

        let Some(track) = index.and_then(|i| self.queue.get(i)).cloned() else {
            return Ok(());
        };

        if current == Some(track.id.as_str()) {
            // Boundary track
            return Ok(());
        }

        if self.status == PlaybackStatus::Stopped {
            self.current = Some(track);
            self.position_ms = 0;
            self.duration_ms = None;
            return Ok(());
        }

        self.load_and_start(track, playing).await
    }

    async fn set_volume(&mut self, level: u8) -> Result<()> {
        if self.status == PlaybackStatus::Idle {
            return Err(MediaError::invalid_state("cannot set volume while idle"));
        }

        let level = level.min(100);
        self.native.engine.set_volume(level).await?;
        self.volume = level;
        Ok(())
    }

    /// Load `track` and either start output or leave it paused
    async fn load_and_start(&mut self, track: TrackRef, play: bool) -> Result<()> {
        debug!(track_id = %track.id, play, "Loading track");

        self.current = Some(track.clone());
        self.position_ms = 0;
        self.duration_ms = None;
        self.status = PlaybackStatus::Loading;
        self.commit();

        self.duration_ms = self.native.engine.load(&track).await?;

        if play {
            self.start_output().await?;
            self.status = PlaybackStatus::Playing;
        } else {
            self.status = PlaybackStatus::Paused;
        }
        Ok(())
    }

    /// Acquire focus if needed and start the engine at the current position
    async fn start_output(&mut self) -> Result<()> {
        if !self.has_focus {
            if !self.native.focus.request().await? {
                return Err(MediaError::playback("audio focus denied"));
            }
            self.has_focus = true;
        }

        self.native.engine.start(self.position_ms).await
    }

    async fn abandon_focus(&mut self) {
        if self.has_focus {
            self.native.focus.abandon().await;
            self.has_focus = false;
        }
    }

    async fn fault(&mut self, err: &MediaError) {
        if !err.is_session_fault() {
            debug!(error = %err, "Command rejected");
            return;
        }

        match err {
            MediaError::Playback(_) => error!(error = %err, "Playback engine failure"),
            _ => warn!(error = %err, status = %self.status, "Command illegal in current state"),
        }

        if matches!(
            self.status,
            PlaybackStatus::Playing | PlaybackStatus::Paused | PlaybackStatus::Loading
        ) {
            if let Err(stop_err) = self.native.engine.stop().await {
                warn!(error = %stop_err, "Failed to stop engine after fault");
            }
        }
        self.abandon_focus().await;

        self.status = PlaybackStatus::Error;
        self.sink.emit(BridgeEvent::from_error(err));
        self.commit();
    }

    /// Emit `stateChanged` if the snapshot moved, then refresh the surface
    fn commit(&mut self) {
        let state = self.snapshot();

        if state != self.last_emitted {
            debug!(status = %state.status, position_ms = state.position_ms, "State changed");
            self.last_emitted = state.clone();
            self.sink.emit(BridgeEvent::state_changed(state.clone()));
        }

        self.publish(&state);
    }

    fn publish(&mut self, state: &PlaybackState) {
        let Some(track) = self.current.as_ref() else {
            return;
        };

        let now = NowPlaying::from_track(track, state);
        match &self.published {
            Some(previous) if *previous == now => return,
            Some(previous) if previous.same_metadata(&now) => {
                self.native
                    .surface
                    .publish_position(now.position_ms, now.is_playing);
            }
            _ => self.native.surface.publish_metadata(&now),
        }
        self.published = Some(now);
    }

    fn sync_position(&mut self) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        if let Some(position) = self.native.engine.position_ms() {
            self.position_ms = self.clamp_position(position);
        }
    }

    fn clamp_position(&self, position_ms: u64) -> u64 {
        self.duration_ms
            .map_or(position_ms, |duration| position_ms.min(duration))
    }

    fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|track| track.id.as_str())
    }

    /// Current state as seen by the web layer
    pub fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            status: self.status,
            current_track_id: self.current.as_ref().map(|track| track.id.clone()),
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            queue: self.queue.to_vec(),
            volume: self.volume,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn current_track(&self) -> Option<&TrackRef> {
        self.current.as_ref()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Free the engine, audio focus and lock-screen surface
    ///
    /// Unconditional and idempotent; safe to call with a command abandoned
    /// mid-flight.
    pub async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.native.engine.release().await;
        self.native.focus.abandon().await;
        self.has_focus = false;
        self.native.surface.release();
        self.published = None;

        info!("Playback session released");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status)
            .field("current", &self.current_id())
            .field("queue_len", &self.queue.len())
            .field("position_ms", &self.position_ms)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
