//! Bridge adapter
//!
//! The seam between the host bridge and the media session: decodes calls,
//! hands them to the controller without blocking, and exposes listener
//! subscription. Holds only handles; never touches session state itself.

use crate::codec::{encode_state, CommandCodec, RawCall};
use crate::controller::{MediaSessionController, PendingCommand};
use crate::host::BridgePlugin;
use crate::hub::{EventHub, ListenerId, Subscription};
use async_trait::async_trait;
use mellow_core::{CorrelationId, MediaError, PlaybackState, PlaybackStatus, Result, TrackRef};
use mellow_playback::{BridgeEvent, EventSink, PlaybackCommand, TrackSelector};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Deferred result of a dispatched call, resolving to the encoded state
#[derive(Debug)]
pub struct PendingCall {
    correlation_id: CorrelationId,
    pending: PendingCommand,
}

impl PendingCall {
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().pending)
            .poll(cx)
            .map(|result| result.and_then(|state| encode_state(&state).map_err(MediaError::from)))
    }
}

pub struct BridgeAdapter {
    plugin_id: String,
    codec: CommandCodec,
    controller: Arc<MediaSessionController>,
    hub: Arc<EventHub>,
    start_dedupe: Duration,
    last_start: Mutex<Option<(TrackRef, Instant)>>,
}

impl BridgeAdapter {
    pub fn new(
        plugin_id: impl Into<String>,
        codec: CommandCodec,
        controller: Arc<MediaSessionController>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            codec,
            controller,
            hub,
            start_dedupe: Duration::ZERO,
            last_start: Mutex::new(None),
        }
    }

    /// Resolve a play call carrying the same track as the previous one
    /// within `window` with the current state instead of queueing it
    ///
    /// Only applies while the session is loading or playing, so a retry
    /// after an error or a resume after pause still reaches the session.
    pub fn with_start_dedupe(mut self, window: Duration) -> Self {
        self.start_dedupe = window;
        self
    }

    /// Decode a call and queue it
    ///
    /// # Errors
    /// Fails immediately with `SessionDestroyed` once the session is torn
    /// down, `UnsupportedCommand` for unknown methods and `Decode` for
    /// malformed arguments; the latter is also broadcast as an `error` event.
    pub fn dispatch(&self, call: &RawCall) -> Result<PendingCall> {
        if self.controller.is_destroyed() {
            debug!(method = %call.method, "Call after session teardown");
            return Err(MediaError::SessionDestroyed);
        }

        let envelope = match self.codec.decode_envelope(call) {
            Ok(envelope) => envelope,
            Err(err) => {
                let err = MediaError::from(err);
                warn!(method = %call.method, error = %err, "Rejected web-layer call");
                if matches!(err, MediaError::Decode { .. }) {
                    self.hub.emit(BridgeEvent::from_error(&err));
                }
                return Err(err);
            }
        };

        let correlation_id = envelope.correlation_id.clone();
        let snapshot = self.controller.snapshot();
        if self.is_repeated_start(&envelope.command, &snapshot) {
            debug!(method = %call.method, "Repeated start inside the dedupe window");
            return Ok(PendingCall {
                correlation_id,
                pending: PendingCommand::settled(snapshot),
            });
        }

        debug!(
            method = %call.method,
            correlation_id = %correlation_id,
            "Dispatching web-layer call"
        );
        Ok(PendingCall {
            correlation_id,
            pending: self.controller.submit(envelope),
        })
    }

    fn is_repeated_start(&self, command: &PlaybackCommand, snapshot: &PlaybackState) -> bool {
        let PlaybackCommand::Play {
            track: Some(TrackSelector::Track(track)),
        } = command
        else {
            return false;
        };

        let active = matches!(
            snapshot.status,
            PlaybackStatus::Loading | PlaybackStatus::Playing
        ) && snapshot.current_track_id.as_deref() == Some(track.id.as_str());

        let now = Instant::now();
        let mut last = self.last_start.lock().unwrap_or_else(PoisonError::into_inner);
        let repeated = active
            && matches!(
                &*last,
                Some((previous, at))
                    if previous == track && now.duration_since(*at) < self.start_dedupe
            );
        if !repeated {
            *last = Some((track.clone(), now));
        }
        repeated
    }

    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.hub.unsubscribe(id)
    }

    pub fn methods(&self) -> Vec<String> {
        self.codec.methods()
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.controller.snapshot()
    }
}

#[async_trait]
impl BridgePlugin for BridgeAdapter {
    fn id(&self) -> &str {
        &self.plugin_id
    }

    fn methods(&self) -> Vec<String> {
        self.codec.methods()
    }

    async fn call(&self, call: RawCall) -> Result<Value> {
        self.dispatch(&call)?.await
    }

    fn on_destroy(&self) {
        self.controller.destroy();
    }
}

impl std::fmt::Debug for BridgeAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeAdapter")
            .field("plugin_id", &self.plugin_id)
            .field("listeners", &self.hub.listener_count())
            .finish_non_exhaustive()
    }
}
