//! Configuration schema definitions.
//!
//! Defines the bridge configuration loaded from TOML. Every field has a
//! default so a missing or partial file still yields a usable config.

mod general;
mod loading;
mod paths;

pub use general::{GeneralConfig, LogLevel};
pub use paths::ConfigPaths;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backend origin used when nothing is stored.
pub const DEFAULT_BASE_URL: &str = "http://penguin.linux.test:5000";

/// Main configuration structure for the bridge.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BridgeConfig {
    /// General application settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Event stream settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Keepalive context settings.
    #[serde(default)]
    pub keepalive: KeepaliveConfig,

    /// Panel surface settings.
    #[serde(default)]
    pub panel: PanelConfig,

    /// Native media session settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL used when the store holds none.
    pub default_base_url: String,

    /// Timeout applied to one-shot HTTP calls, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            default_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

impl BackendConfig {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Event stream settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Fixed delay before reconnecting after any stream failure.
    pub reconnect_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 1_500,
        }
    }
}

impl StreamConfig {
    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Keepalive context settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KeepaliveConfig {
    /// Period of the watchdog that re-ensures the keepalive context.
    pub watchdog_interval_secs: u64,

    /// Frequency of the synthesized keepalive tone.
    pub tone_frequency_hz: f32,

    /// Gain applied to the keepalive tone.
    pub tone_gain: f32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_secs: 30,
            tone_frequency_hz: 220.0,
            tone_gain: 0.00001,
        }
    }
}

impl KeepaliveConfig {
    /// Watchdog period as a [`Duration`].
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs.max(1))
    }
}

/// Panel surface settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    /// Position sync / redraw period, in milliseconds.
    pub refresh_interval_ms: u64,

    /// Open a panel as soon as the daemon starts.
    pub open_on_start: bool,

    /// Number of log records shown at the bottom of the panel.
    pub visible_logs: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1_000,
            open_on_start: true,
            visible_logs: 8,
        }
    }
}

impl PanelConfig {
    /// Refresh period as a [`Duration`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(50))
    }
}

/// Native media session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Register an MPRIS player on the session bus.
    pub enable_mpris: bool,

    /// Suffix appended to `org.mpris.MediaPlayer2.` for the bus name.
    pub bus_name_suffix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enable_mpris: true,
            bus_name_suffix: "mediabridge".to_string(),
        }
    }
}
