/// Bridge configuration
use mellow_core::{MediaError, Result};
use mellow_playback::{CommandTag, SessionConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "mellow.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Capability id registered with the host bridge
    #[serde(default = "default_plugin_id")]
    pub plugin_id: String,

    #[serde(default = "default_initial_volume")]
    pub initial_volume: u8,

    #[serde(default = "default_restart_threshold_ms")]
    pub restart_threshold_ms: u64,

    /// Identical OS control signals inside this window are dropped
    #[serde(default = "default_control_dedupe_window_ms")]
    pub control_dedupe_window_ms: u64,

    /// A play call repeating the previous track payload inside this window
    /// resolves without reaching the session
    #[serde(default = "default_start_dedupe_window_ms")]
    pub start_dedupe_window_ms: u64,

    /// Extra method names mapped to canonical command tags
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            plugin_id: default_plugin_id(),
            initial_volume: default_initial_volume(),
            restart_threshold_ms: default_restart_threshold_ms(),
            control_dedupe_window_ms: default_control_dedupe_window_ms(),
            start_dedupe_window_ms: default_start_dedupe_window_ms(),
            aliases: default_aliases(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; without one, `mellow.toml` in the
    /// working directory is used when present. `MELLOW_`-prefixed variables
    /// override file values (`MELLOW_INITIAL_VOLUME=40`,
    /// `MELLOW_ALIASES__BACK=skipPrevious`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings =
                    settings.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables (prefixed with MELLOW_)
        settings = settings.add_source(
            config::Environment::with_prefix("MELLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| MediaError::configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| MediaError::configuration(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.plugin_id.trim().is_empty() {
            return Err(MediaError::configuration("plugin_id must not be empty"));
        }

        if self.initial_volume > 100 {
            return Err(MediaError::configuration(format!(
                "initial_volume must be within 0-100, got {}",
                self.initial_volume
            )));
        }

        for (alias, target) in &self.aliases {
            if alias.is_empty() {
                return Err(MediaError::configuration("alias names must not be empty"));
            }

            if target.parse::<CommandTag>().is_err() {
                return Err(MediaError::configuration(format!(
                    "alias {alias} points at unknown command {target}"
                )));
            }

            if CommandTag::ALL
                .iter()
                .any(|tag| tag.as_str().eq_ignore_ascii_case(alias))
            {
                return Err(MediaError::configuration(format!(
                    "alias {alias} shadows a built-in command"
                )));
            }
        }

        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            initial_volume: self.initial_volume,
            restart_threshold_ms: self.restart_threshold_ms,
        }
    }

    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.control_dedupe_window_ms)
    }

    pub fn start_dedupe_window(&self) -> Duration {
        Duration::from_millis(self.start_dedupe_window_ms)
    }
}

// Default values
fn default_plugin_id() -> String {
    "NativeMedia".to_string()
}

fn default_initial_volume() -> u8 {
    mellow_playback::DEFAULT_VOLUME
}

fn default_restart_threshold_ms() -> u64 {
    mellow_playback::DEFAULT_RESTART_THRESHOLD_MS
}

fn default_control_dedupe_window_ms() -> u64 {
    300
}

fn default_start_dedupe_window_ms() -> u64 {
    2000
}

fn default_aliases() -> BTreeMap<String, String> {
    [
        ("next", "skipNext"),
        ("prev", "skipPrevious"),
        ("previous", "skipPrevious"),
        ("resume", "play"),
        ("seekTo", "seek"),
        // Method names of the original Android plugin
        ("startService", "play"),
        ("stopService", "stop"),
        ("updatePosition", "seek"),
    ]
    .into_iter()
    .map(|(alias, target)| (alias.to_string(), target.to_string()))
    .collect()
}
