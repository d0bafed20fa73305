//! Lifecycle coordinator
//!
//! Reconciles host application lifecycle callbacks with the media session.
//! Callbacks may arrive on any thread and never wait on the session worker.

use crate::controller::MediaSessionController;
use crate::hub::EventHub;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecyclePhase {
    #[default]
    Foreground,
    Background,
    Destroyed,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Foreground => "foreground",
            Self::Background => "background",
            Self::Destroyed => "destroyed",
        })
    }
}

pub struct LifecycleCoordinator {
    controller: Arc<MediaSessionController>,
    hub: Arc<EventHub>,
    phase: Mutex<LifecyclePhase>,
}

impl LifecycleCoordinator {
    pub fn new(controller: Arc<MediaSessionController>, hub: Arc<EventHub>) -> Self {
        Self {
            controller,
            hub,
            phase: Mutex::new(LifecyclePhase::Foreground),
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// App visible again: resume delivery and flush what was buffered
    pub fn on_foreground(&self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase == LifecyclePhase::Destroyed {
            warn!("Foreground after destroy ignored");
            return;
        }

        *phase = LifecyclePhase::Foreground;
        self.hub.resume();
        info!("Host entered foreground");
    }

    /// App hidden: playback continues, web-layer delivery is buffered
    pub fn on_background(&self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase == LifecyclePhase::Destroyed {
            warn!("Background after destroy ignored");
            return;
        }

        *phase = LifecyclePhase::Background;
        self.hub.suspend();
        info!("Host entered background");
    }

    /// Host teardown: release the session without waiting
    ///
    /// The in-flight command and everything queued resolve with
    /// `Cancelled`. Idempotent.
    pub fn on_destroy(&self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase == LifecyclePhase::Destroyed {
            return;
        }

        *phase = LifecyclePhase::Destroyed;
        self.controller.destroy();
        info!("Host destroyed");
    }
}

impl fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
