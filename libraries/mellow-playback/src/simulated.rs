//! Simulated native media stack
//!
//! In-memory engine, focus and surface used by tests and the host binary.
//! Sources are interpreted by scheme:
//! - `unreachable://...` fails to load
//! - `stall://...` never finishes loading
//! - a `#duration=<ms>` fragment sets the reported duration
//!
//! A shared [`SimulatedProbe`] exposes what the native side currently holds.

use async_trait::async_trait;
use mellow_core::{
    AudioFocus, MediaError, MediaSessionSurface, NativeMedia, NowPlaying, PlaybackEngine, Result,
    TrackRef,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Duration reported when the source has no `#duration=` fragment
pub const DEFAULT_DURATION_MS: u64 = 180_000;

/// Something published to the lock-screen surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    Metadata(NowPlaying),
    Position { position_ms: u64, is_playing: bool },
}

/// Observable native resources
#[derive(Debug, Default)]
pub struct SimulatedProbe {
    allocations: AtomicUsize,
    focus_held: AtomicBool,
    focus_denied: AtomicBool,
    surface_active: AtomicBool,
    engine_released: AtomicBool,
    published: Mutex<Vec<Published>>,
    volume: Mutex<Option<u8>>,
}

impl SimulatedProbe {
    /// Number of loaded tracks the engine is holding (0 or 1)
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn focus_held(&self) -> bool {
        self.focus_held.load(Ordering::SeqCst)
    }

    /// Make the next focus requests fail
    pub fn deny_focus(&self, denied: bool) {
        self.focus_denied.store(denied, Ordering::SeqCst);
    }

    pub fn surface_active(&self) -> bool {
        self.surface_active.load(Ordering::SeqCst)
    }

    pub fn engine_released(&self) -> bool {
        self.engine_released.load(Ordering::SeqCst)
    }

    /// Whether nothing native is held anymore
    pub fn all_released(&self) -> bool {
        self.allocations() == 0
            && !self.focus_held()
            && !self.surface_active()
            && self.engine_released()
    }

    /// Everything published to the surface so far
    pub fn published(&self) -> Vec<Published> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last volume applied to the engine
    pub fn volume(&self) -> Option<u8> {
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, entry: Published) {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// Build a simulated native stack and the probe observing it
pub fn simulated_native() -> (NativeMedia, Arc<SimulatedProbe>) {
    simulated_native_with_latency(Duration::ZERO)
}

/// Like [`simulated_native`] but every load takes `latency`
pub fn simulated_native_with_latency(latency: Duration) -> (NativeMedia, Arc<SimulatedProbe>) {
    let probe = Arc::new(SimulatedProbe::default());
    let native = NativeMedia::new(
        Box::new(SimulatedEngine::new(Arc::clone(&probe), latency)),
        Box::new(SimulatedFocus::new(Arc::clone(&probe))),
        Box::new(SimulatedSurface::new(Arc::clone(&probe))),
    );
    (native, probe)
}

/// Engine that tracks position without producing audio
pub struct SimulatedEngine {
    probe: Arc<SimulatedProbe>,
    latency: Duration,
    loaded: Option<String>,
    position_ms: u64,
    duration_ms: u64,
}

impl SimulatedEngine {
    pub fn new(probe: Arc<SimulatedProbe>, latency: Duration) -> Self {
        Self {
            probe,
            latency,
            loaded: None,
            position_ms: 0,
            duration_ms: 0,
        }
    }

    fn unload(&mut self) {
        if self.loaded.take().is_some() {
            self.probe.allocations.fetch_sub(1, Ordering::SeqCst);
        }
        self.position_ms = 0;
    }

    fn require_loaded(&self) -> Result<()> {
        if self.loaded.is_none() {
            return Err(MediaError::playback("no track loaded"));
        }
        Ok(())
    }
}

fn parse_duration(source_uri: &str) -> u64 {
    source_uri
        .split_once("#duration=")
        .and_then(|(_, ms)| ms.parse().ok())
        .unwrap_or(DEFAULT_DURATION_MS)
}

#[async_trait]
impl PlaybackEngine for SimulatedEngine {
    async fn load(&mut self, track: &TrackRef) -> Result<Option<u64>> {
        self.unload();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if track.source_uri.starts_with("unreachable://") {
            return Err(MediaError::playback(format!(
                "source unreachable: {}",
                track.source_uri
            )));
        }

        // Allocate before stalling so teardown has something to free
        self.loaded = Some(track.id.clone());
        self.probe.allocations.fetch_add(1, Ordering::SeqCst);

        if track.source_uri.starts_with("stall://") {
            std::future::pending::<()>().await;
        }

        self.duration_ms = parse_duration(&track.source_uri);
        Ok(Some(self.duration_ms))
    }

    async fn start(&mut self, position_ms: u64) -> Result<()> {
        self.require_loaded()?;
        self.position_ms = position_ms.min(self.duration_ms);
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.require_loaded()
    }

    async fn stop(&mut self) -> Result<()> {
        self.unload();
        Ok(())
    }

    async fn seek(&mut self, position_ms: u64) -> Result<()> {
        self.require_loaded()?;
        self.position_ms = position_ms.min(self.duration_ms);
        Ok(())
    }

    async fn set_volume(&mut self, level: u8) -> Result<()> {
        *self
            .probe
            .volume
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(level);
        Ok(())
    }

    fn position_ms(&self) -> Option<u64> {
        self.loaded.as_ref().map(|_| self.position_ms)
    }

    async fn release(&mut self) {
        self.unload();
        self.probe.engine_released.store(true, Ordering::SeqCst);
    }
}

pub struct SimulatedFocus {
    probe: Arc<SimulatedProbe>,
}

impl SimulatedFocus {
    pub fn new(probe: Arc<SimulatedProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl AudioFocus for SimulatedFocus {
    async fn request(&mut self) -> Result<bool> {
        if self.probe.focus_denied.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.probe.focus_held.store(true, Ordering::SeqCst);
        Ok(true)
    }

    async fn abandon(&mut self) {
        self.probe.focus_held.store(false, Ordering::SeqCst);
    }
}

pub struct SimulatedSurface {
    probe: Arc<SimulatedProbe>,
}

impl SimulatedSurface {
    pub fn new(probe: Arc<SimulatedProbe>) -> Self {
        Self { probe }
    }
}

impl MediaSessionSurface for SimulatedSurface {
    fn publish_metadata(&mut self, now_playing: &NowPlaying) {
        self.probe.surface_active.store(true, Ordering::SeqCst);
        self.probe.record(Published::Metadata(now_playing.clone()));
    }

    fn publish_position(&mut self, position_ms: u64, is_playing: bool) {
        self.probe.record(Published::Position {
            position_ms,
            is_playing,
        });
    }

    fn release(&mut self) {
        self.probe.surface_active.store(false, Ordering::SeqCst);
    }
}
