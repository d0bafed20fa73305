//! Application context
//!
//! The one explicitly owned object wiring the bridge together. Created once
//! at process start and passed around by handle.

use crate::adapter::BridgeAdapter;
use crate::codec::{CommandCodec, RawCall};
use crate::config::BridgeConfig;
use crate::controller::MediaSessionController;
use crate::host::HostBridge;
use crate::hub::EventHub;
use crate::lifecycle::LifecycleCoordinator;
use crate::os_session::MediaSessionTranslator;
use mellow_core::{NativeMedia, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub struct MediaBridgeContext {
    config: BridgeConfig,
    bridge: Arc<HostBridge>,
    adapter: Arc<BridgeAdapter>,
    controller: Arc<MediaSessionController>,
    lifecycle: LifecycleCoordinator,
    media_session: MediaSessionTranslator,
}

impl MediaBridgeContext {
    /// Start the bridge with a fresh host bridge
    ///
    /// Must run inside a tokio runtime.
    pub fn start(config: BridgeConfig, native: NativeMedia) -> Result<Self> {
        Self::start_with_bridge(config, native, Arc::new(HostBridge::new()))
    }

    /// Start against an existing host bridge
    ///
    /// The plugin is registered before the bridge completes initialization.
    ///
    /// # Errors
    /// `Configuration` for invalid configuration or when the bridge refuses
    /// the registration (already initialized, duplicate id).
    pub fn start_with_bridge(
        config: BridgeConfig,
        native: NativeMedia,
        bridge: Arc<HostBridge>,
    ) -> Result<Self> {
        let codec = CommandCodec::from_config(&config)?;

        let hub = Arc::new(EventHub::new());
        let controller = Arc::new(MediaSessionController::spawn(
            native,
            hub.clone(),
            config.session_config(),
        ));
        let adapter = Arc::new(
            BridgeAdapter::new(
                config.plugin_id.clone(),
                codec,
                controller.clone(),
                hub.clone(),
            )
            .with_start_dedupe(config.start_dedupe_window()),
        );

        if let Err(err) = bridge.register_plugin(adapter.clone()) {
            controller.destroy();
            return Err(err);
        }
        bridge.complete_initialization();

        let lifecycle = LifecycleCoordinator::new(controller.clone(), hub);
        let media_session =
            MediaSessionTranslator::new(controller.clone(), config.dedupe_window());

        info!(plugin = %config.plugin_id, "Media bridge started");
        Ok(Self {
            config,
            bridge,
            adapter,
            controller,
            lifecycle,
            media_session,
        })
    }

    /// Call a method on the media plugin through the host bridge
    pub async fn call(&self, method: &str, args: Value) -> Result<Value> {
        self.call_raw(RawCall::new(method, args)).await
    }

    pub async fn call_raw(&self, call: RawCall) -> Result<Value> {
        self.bridge.call(&self.config.plugin_id, call).await
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn bridge(&self) -> &Arc<HostBridge> {
        &self.bridge
    }

    pub fn adapter(&self) -> &Arc<BridgeAdapter> {
        &self.adapter
    }

    pub fn controller(&self) -> &Arc<MediaSessionController> {
        &self.controller
    }

    pub fn lifecycle(&self) -> &LifecycleCoordinator {
        &self.lifecycle
    }

    pub fn media_session(&self) -> &MediaSessionTranslator {
        &self.media_session
    }

    /// Destroy the session and wait for the worker to release everything
    pub async fn shutdown(&self) {
        self.lifecycle.on_destroy();
        self.bridge.destroy();
        self.controller.closed().await;
    }
}

impl std::fmt::Debug for MediaBridgeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaBridgeContext")
            .field("plugin_id", &self.config.plugin_id)
            .field("bridge", &self.bridge)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}
