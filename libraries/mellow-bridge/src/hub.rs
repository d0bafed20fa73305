//! Event hub - fan-out of bridge events to web-layer listeners
//!
//! Each listener owns an unbounded channel and drains it on its own thread,
//! so emission never blocks the session worker. While delivery is suspended
//! (app in background) or nobody is listening, events are coalesced: only
//! the latest `stateChanged` survives, errors are kept (bounded) and acks
//! are dropped.

use mellow_playback::{BridgeEvent, EventSink};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Errors kept while buffering; older ones are dropped first
pub const MAX_BUFFERED_ERRORS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Receiving end of one listener
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    receiver: mpsc::UnboundedReceiver<BridgeEvent>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next event; `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<BridgeEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BridgeEvent> {
        self.receiver.try_recv().ok()
    }

    /// Every event already delivered
    pub fn drain(&mut self) -> Vec<BridgeEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[derive(Debug, Default)]
struct HubInner {
    next_id: u64,
    listeners: Vec<(ListenerId, mpsc::UnboundedSender<BridgeEvent>)>,
    suspended: bool,
    buffer: VecDeque<BridgeEvent>,
}

impl HubInner {
    fn hold(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::StateChanged { .. } => {
                self.buffer
                    .retain(|e| !matches!(e, BridgeEvent::StateChanged { .. }));
                self.buffer.push_back(event);
            }
            BridgeEvent::Error { .. } => {
                let errors = self
                    .buffer
                    .iter()
                    .filter(|e| matches!(e, BridgeEvent::Error { .. }))
                    .count();
                if errors >= MAX_BUFFERED_ERRORS {
                    if let Some(oldest) = self
                        .buffer
                        .iter()
                        .position(|e| matches!(e, BridgeEvent::Error { .. }))
                    {
                        self.buffer.remove(oldest);
                        warn!("Event buffer full, dropped oldest error");
                    }
                }
                self.buffer.push_back(event);
            }
            BridgeEvent::CommandAck { .. } => {}
        }
    }

    /// Send to every listener, forgetting those whose receiver is gone
    fn broadcast(&mut self, event: &BridgeEvent) {
        self.listeners.retain(|(id, sender)| {
            let alive = sender.send(event.clone()).is_ok();
            if !alive {
                debug!(listener = %id, "Listener dropped, removing");
            }
            alive
        });
    }

    fn deliver(&mut self, event: BridgeEvent) {
        if self.suspended || self.listeners.is_empty() {
            self.hold(event);
            return;
        }

        self.broadcast(&event);
        if self.listeners.is_empty() {
            self.hold(event);
        }
    }

    fn flush(&mut self) {
        if self.suspended || self.listeners.is_empty() {
            return;
        }

        let pending = std::mem::take(&mut self.buffer);
        if !pending.is_empty() {
            debug!(count = pending.len(), "Flushing buffered events");
        }
        for event in pending {
            self.deliver(event);
        }
    }
}

#[derive(Debug, Default)]
pub struct EventHub {
    inner: Mutex<HubInner>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a listener
    ///
    /// Buffered events are delivered to it right away unless delivery is
    /// suspended.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner.listeners.push((id, sender));
        inner.flush();

        debug!(listener = %id, "Listener subscribed");
        Subscription { id, receiver }
    }

    /// Detach a listener; returns whether it was attached
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(listener, _)| *listener != id);
        let removed = inner.listeners.len() != before;

        if removed {
            debug!(listener = %id, "Listener unsubscribed");
        }
        removed
    }

    /// Stop delivering; events are buffered until [`EventHub::resume`]
    pub fn suspend(&self) {
        self.lock().suspended = true;
    }

    /// Resume delivery and flush the buffer
    pub fn resume(&self) {
        let mut inner = self.lock();
        inner.suspended = false;
        inner.flush();
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn buffered(&self) -> usize {
        self.lock().buffer.len()
    }
}

impl EventSink for EventHub {
    fn emit(&self, event: BridgeEvent) {
        self.lock().deliver(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mellow_core::{CorrelationId, MediaError, PlaybackState, PlaybackStatus};

    fn state(status: PlaybackStatus) -> BridgeEvent {
        let mut state = PlaybackState::idle(80);
        state.status = status;
        BridgeEvent::state_changed(state)
    }

    #[test]
    fn listeners_receive_in_emission_order() {
        let hub = EventHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.emit(state(PlaybackStatus::Loading));
        hub.emit(state(PlaybackStatus::Playing));

        for sub in [&mut a, &mut b] {
            assert_eq!(
                sub.drain(),
                vec![state(PlaybackStatus::Loading), state(PlaybackStatus::Playing)]
            );
        }
    }

    #[test]
    fn suspended_hub_keeps_latest_state_and_errors() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();
        hub.suspend();

        hub.emit(state(PlaybackStatus::Loading));
        hub.emit(BridgeEvent::from_error(&MediaError::playback("network lost")));
        hub.emit(BridgeEvent::ack(CorrelationId::new("c1")));
        hub.emit(state(PlaybackStatus::Error));

        assert!(sub.drain().is_empty());
        assert_eq!(hub.buffered(), 2);

        hub.resume();
        let events = sub.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].type_name(), "error");
        assert_eq!(events[1], state(PlaybackStatus::Error));
        assert_eq!(hub.buffered(), 0);
    }

    #[test]
    fn events_without_listeners_reach_next_subscriber() {
        let hub = EventHub::new();
        hub.emit(state(PlaybackStatus::Loading));
        hub.emit(state(PlaybackStatus::Playing));

        let mut sub = hub.subscribe();
        assert_eq!(sub.drain(), vec![state(PlaybackStatus::Playing)]);
    }

    #[test]
    fn subscribe_while_suspended_waits_for_resume() {
        let hub = EventHub::new();
        hub.suspend();
        hub.emit(state(PlaybackStatus::Paused));

        let mut sub = hub.subscribe();
        assert!(sub.try_recv().is_none());

        hub.resume();
        assert_eq!(sub.try_recv(), Some(state(PlaybackStatus::Paused)));
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = EventHub::new();
        let sub = hub.subscribe();

        assert!(hub.unsubscribe(sub.id()));
        assert!(!hub.unsubscribe(sub.id()));
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn dropped_receiver_is_forgotten() {
        let hub = EventHub::new();
        drop(hub.subscribe());

        hub.emit(state(PlaybackStatus::Playing));
        assert_eq!(hub.listener_count(), 0);
        assert_eq!(hub.buffered(), 1);
    }

    #[test]
    fn error_buffer_is_bounded() {
        let hub = EventHub::new();
        for i in 0..(MAX_BUFFERED_ERRORS + 5) {
            hub.emit(BridgeEvent::from_error(&MediaError::playback(format!("e{i}"))));
        }
        assert_eq!(hub.buffered(), MAX_BUFFERED_ERRORS);
    }
}
