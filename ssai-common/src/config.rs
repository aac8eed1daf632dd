//! Ad insertion configuration loading and config file resolution
//!
//! Configuration is bootstrap-only: it is read once when a coordinator is
//! constructed. Backend identity fields are passed through verbatim into the
//! stream request and never interpreted here.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Value returned by time translation when no stream session exists yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFallback {
    /// Return the untranslated input
    #[default]
    Passthrough,
    /// Return 0
    Zero,
}

impl TimeFallback {
    pub fn apply(&self, time: f64) -> f64 {
        match self {
            TimeFallback::Passthrough => time,
            TimeFallback::Zero => 0.0,
        }
    }
}

/// Backend identity for the stream request
///
/// `live = true` selects a live stream request keyed by `asset_key`;
/// otherwise an on-demand request keyed by `content_source_id` + `video_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamIdentity {
    #[serde(default)]
    pub live: bool,
    #[serde(default)]
    pub asset_key: Option<String>,
    #[serde(default)]
    pub content_source_id: Option<String>,
    #[serde(default)]
    pub video_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// Ad insertion configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdInsertionConfig {
    /// Prevent viewers from seeking past unplayed ad breaks
    #[serde(default = "default_snapback")]
    pub snapback: bool,

    /// Use the debug build of the ad library and verbose logging
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub stream: StreamIdentity,

    /// Upper bound on the stream request round trip
    #[serde(default = "default_stream_request_timeout_ms")]
    pub stream_request_timeout_ms: u64,

    #[serde(default)]
    pub time_fallback: TimeFallback,

    /// Touch-class device (clicks on the ad surface always toggle playback)
    #[serde(default)]
    pub touch_device: bool,

    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

fn default_snapback() -> bool {
    true
}

fn default_stream_request_timeout_ms() -> u64 {
    10_000
}

fn default_event_bus_capacity() -> usize {
    256
}

impl Default for AdInsertionConfig {
    fn default() -> Self {
        Self {
            snapback: default_snapback(),
            debug: false,
            stream: StreamIdentity::default(),
            stream_request_timeout_ms: default_stream_request_timeout_ms(),
            time_fallback: TimeFallback::default(),
            touch_device: false,
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

impl AdInsertionConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AdInsertionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Stream request timeout as a Duration
    pub fn stream_request_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_request_timeout_ms)
    }

    /// Reject values that would stall loads or break the event bus
    pub fn validate(&self) -> Result<()> {
        if self.stream_request_timeout_ms == 0 {
            return Err(Error::Config(
                "stream_request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config(
                "event_bus_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Config file resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `<config dir>/ssai/config.toml` if it exists
///
/// Returns `None` when nothing is found; callers fall back to built-in defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let default_path = dirs::config_dir()?.join("ssai").join("config.toml");
    if default_path.exists() {
        Some(default_path)
    } else {
        debug!("No config file at {}, using defaults", default_path.display());
        None
    }
}
