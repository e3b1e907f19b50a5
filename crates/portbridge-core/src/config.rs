//! Bridge configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// API and socket endpoints handed to the core.
    pub endpoints: EndpointConfig,
    /// Socket connection parameters.
    pub socket: SocketConfig,
    /// Location watcher parameters.
    pub geolocation: GeolocationConfig,
    /// Map widget reconciliation.
    pub map: MapConfig,
    /// Session storage.
    pub storage: StorageConfig,
    /// Host environment reported in the startup flags.
    pub host: HostConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub api_url: String,
    pub socket_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Give up on a handshake after this many milliseconds.
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    /// Concurrent subscriptions allowed. Extra `start` intents are ignored.
    pub max_subscriptions: usize,
    /// Interval of the fixed sensor, in milliseconds.
    pub fixed_interval_ms: u64,
    pub fixed_latitude: f64,
    pub fixed_longitude: f64,
    pub fixed_accuracy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Reconciliation tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Absolute tolerance for drift detection. Zero compares exactly.
    pub drift_epsilon: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Total bytes the session store accepts. Unlimited when absent.
    pub quota_bytes: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub language: String,
    pub window_width: u32,
    pub window_height: u32,
    pub webgl: bool,
}

// ============================================================
// Defaults
// ============================================================

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080/api".to_string(),
            socket_url: "ws://127.0.0.1:8080/ws".to_string(),
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            max_subscriptions: 1,
            fixed_interval_ms: 1_000,
            fixed_latitude: 0.0,
            fixed_longitude: 0.0,
            fixed_accuracy: 10.0,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            drift_epsilon: 0.0,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            window_width: 1280,
            window_height: 720,
            webgl: false,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl BridgeConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
