/// Host bridge plugin registry
///
/// Minimal model of the hybrid-app bridge: a table of plugins that is only
/// writable until the bridge finishes initializing.
use crate::codec::RawCall;
use async_trait::async_trait;
use mellow_core::{MediaError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Native capability exposed to the web layer
#[async_trait]
pub trait BridgePlugin: Send + Sync {
    /// Capability id the web layer addresses
    fn id(&self) -> &str;

    /// Invokable method names
    fn methods(&self) -> Vec<String>;

    /// Handle one call
    ///
    /// Resolves with the JSON result or a typed error.
    async fn call(&self, call: RawCall) -> Result<Value>;

    /// Host is tearing down; must return promptly
    fn on_destroy(&self);
}

#[derive(Default)]
pub struct HostBridge {
    plugins: RwLock<HashMap<String, Arc<dyn BridgePlugin>>>,
    initialized: AtomicBool,
}

impl HostBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin to the table
    ///
    /// # Errors
    /// `Configuration` when the bridge is already initialized or the id is
    /// taken.
    pub fn register_plugin(&self, plugin: Arc<dyn BridgePlugin>) -> Result<()> {
        let id = plugin.id().to_string();

        if self.is_initialized() {
            warn!(plugin = %id, "Plugin registered after bridge initialization");
            return Err(MediaError::configuration(format!(
                "plugin {id} registered after bridge initialization"
            )));
        }

        let mut plugins = self.plugins.write().unwrap_or_else(PoisonError::into_inner);
        if plugins.contains_key(&id) {
            return Err(MediaError::configuration(format!(
                "plugin {id} is already registered"
            )));
        }

        info!(plugin = %id, methods = ?plugin.methods(), "Plugin registered");
        plugins.insert(id, plugin);
        Ok(())
    }

    /// Freeze the plugin table
    pub fn complete_initialization(&self) {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            info!(plugins = self.plugin_ids().len(), "Host bridge initialized");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        let plugins = self.plugins.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<_> = plugins.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Route a web-layer call to a plugin
    pub async fn call(&self, plugin_id: &str, call: RawCall) -> Result<Value> {
        let plugin = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| MediaError::PluginNotFound(plugin_id.to_string()))?;

        plugin.call(call).await
    }

    /// Forward teardown to every plugin
    ///
    /// Plugins stay registered so late calls reach them and get the
    /// plugin's own teardown error instead of `PluginNotFound`.
    pub fn destroy(&self) {
        let plugins: Vec<_> = self
            .plugins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for plugin in plugins {
            plugin.on_destroy();
        }
        info!("Host bridge destroyed");
    }
}

impl std::fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("plugins", &self.plugin_ids())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
