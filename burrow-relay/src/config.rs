//! Configuration loading for burrow-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).
//! Every field has a default, so an empty file is valid.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for burrow-relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Fallback payload staging configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Liveness monitor configuration.
    #[serde(default)]
    pub liveness: LivenessConfig,
    /// Signaling configuration.
    #[serde(default)]
    pub signaling: SignalingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP and WebSocket listener (default: 0.0.0.0:5000).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Publicly reachable URL when the server sits behind a tunnel (reported only).
    pub public_url: Option<String>,
}

/// Fallback payload staging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per relayed transfer.
    #[serde(default = "default_transfer_dir")]
    pub transfer_dir: PathBuf,
    /// Maximum upload size in bytes (default: 1 GiB).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// Liveness monitor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LivenessConfig {
    /// Sweep interval in seconds (default: 30).
    #[serde(default = "default_liveness_interval")]
    pub interval_secs: u64,
    /// Silence tolerated before a peer is demoted (default: 60).
    #[serde(default = "default_liveness_timeout")]
    pub timeout_secs: u64,
    /// Enable the monitor (default: true).
    #[serde(default = "default_liveness_enabled")]
    pub enabled: bool,
    /// Forget offline peers after this many seconds. Unset keeps them forever.
    pub offline_retention_secs: Option<u64>,
}

/// Signaling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalingConfig {
    /// STUN servers handed to peers on connect.
    #[serde(default = "default_stun_servers")]
    pub stun_servers: Vec<String>,
    /// Outbound queue depth per channel (default: 64).
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
    /// Largest inbound channel frame in bytes (default: 16 MiB).
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_transfer_dir() -> PathBuf {
    PathBuf::from("transfers")
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024 // 1 GiB
}

fn default_liveness_interval() -> u64 {
    30
}

fn default_liveness_timeout() -> u64 {
    60
}

fn default_liveness_enabled() -> bool {
    true
}

fn default_stun_servers() -> Vec<String> {
    vec![
        "stun:stun.l.google.com:19302".to_string(),
        "stun:stun1.l.google.com:19302".to_string(),
        "stun:stun2.l.google.com:19302".to_string(),
    ]
}

fn default_max_frame_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_channel_buffer() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            public_url: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            transfer_dir: default_transfer_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_liveness_interval(),
            timeout_secs: default_liveness_timeout(),
            enabled: default_liveness_enabled(),
            offline_retention_secs: None,
        }
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            stun_servers: default_stun_servers(),
            channel_buffer: default_channel_buffer(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl LivenessConfig {
    /// Sweep interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Liveness timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Offline retention, if garbage collection is enabled.
    pub fn offline_retention(&self) -> Option<Duration> {
        self.offline_retention_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
