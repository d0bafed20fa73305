//! Bridge Events
//!
//! Events flow from the session back to web-layer listeners:
//! - State changes (at most one per transition)
//! - Errors (session faults and rejected calls)
//! - Command acknowledgements (one per web-layer command)

use mellow_core::{CorrelationId, ErrorKind, MediaError, PlaybackState};
use serde::{Deserialize, Serialize};

/// Events emitted towards the web layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeEvent {
    /// Session state changed
    #[serde(rename_all = "camelCase")]
    StateChanged {
        /// Snapshot after the transition
        state: PlaybackState,
    },

    /// A command failed
    #[serde(rename_all = "camelCase")]
    Error { kind: ErrorKind, message: String },

    /// A web-layer command finished executing
    #[serde(rename_all = "camelCase")]
    CommandAck { correlation_id: CorrelationId },
}

impl BridgeEvent {
    pub fn state_changed(state: PlaybackState) -> Self {
        Self::StateChanged { state }
    }

    /// Error event carrying the wire kind and display message of `err`
    pub fn from_error(err: &MediaError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn ack(correlation_id: CorrelationId) -> Self {
        Self::CommandAck { correlation_id }
    }

    /// Wire name of the event type
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "stateChanged",
            Self::Error { .. } => "error",
            Self::CommandAck { .. } => "commandAck",
        }
    }
}

/// Receiver of session events
///
/// Implemented by the bridge's event hub. Called from the session worker;
/// implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BridgeEvent);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: BridgeEvent) {}
}

/// Sink that records events in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<BridgeEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every event recorded so far
    pub fn drain(&self) -> Vec<BridgeEvent> {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::take(&mut *events)
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: BridgeEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}
