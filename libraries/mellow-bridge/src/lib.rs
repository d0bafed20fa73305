//! Mellow - Native Media Bridge
//!
//! Exposes the native playback session to web-layer code through an
//! asynchronous message-passing boundary.
//!
//! Data flow: web layer → [`BridgeAdapter`] → [`CommandCodec`] →
//! [`MediaSessionController`] → native engine; events flow back through the
//! [`EventHub`]. The [`LifecycleCoordinator`] and the
//! [`MediaSessionTranslator`] sit beside the controller and feed it through
//! the same serialized queue.
//!
//! # Example
//!
//! ```rust
//! use mellow_bridge::{BridgeConfig, MediaBridgeContext};
//! use mellow_playback::simulated_native;
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let (native, _probe) = simulated_native();
//! let context = MediaBridgeContext::start(BridgeConfig::default(), native).unwrap();
//! let mut events = context.adapter().subscribe();
//!
//! let state = context
//!     .call("play", json!({ "track": { "id": "t1", "sourceUri": "file:///t1.mp3" } }))
//!     .await
//!     .unwrap();
//! assert_eq!(state["status"], "playing");
//! assert!(events.recv().await.is_some());
//!
//! context.shutdown().await;
//! # });
//! ```

#![forbid(unsafe_code)]

pub mod adapter;
pub mod codec;
pub mod config;
pub mod context;
pub mod controller;
pub mod host;
pub mod hub;
pub mod lifecycle;
pub mod os_session;

pub use adapter::{BridgeAdapter, PendingCall};
pub use codec::{
    decode_event, decode_state, encode_error, encode_event, encode_state, CodecError,
    CommandCodec, RawCall,
};
pub use config::BridgeConfig;
pub use context::MediaBridgeContext;
pub use controller::{MediaSessionController, PendingCommand};
pub use host::{BridgePlugin, HostBridge};
pub use hub::{EventHub, ListenerId, Subscription};
pub use lifecycle::{LifecycleCoordinator, LifecyclePhase};
pub use os_session::{MediaSessionSignal, MediaSessionTranslator};
