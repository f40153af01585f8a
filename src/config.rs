//! Engine configuration: TOML file plus environment-based path resolution.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration file structure.
///
/// Note the two independent time windows: `recency_window_secs` gates which
/// events the ingestion loop even considers, while `decay_ttl_secs` gates
/// how long resulting overlays stay visible. They are deliberately separate
/// knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Station (RFF) feed, fetched at startup
    #[serde(default = "default_station_url")]
    pub station_url: String,
    /// Caller event feed, polled periodically
    #[serde(default = "default_event_url")]
    pub event_url: String,
    /// Event feed poll period in seconds
    #[serde(default = "default_event_poll_secs")]
    pub event_poll_secs: u64,
    /// Decay sweep period in seconds
    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
    /// Only events newer than this window are ingested (seconds)
    #[serde(default = "default_recency_window_secs")]
    pub recency_window_secs: u64,
    /// Initial decay TTL for overlays (seconds); adjustable at runtime
    #[serde(default = "default_decay_ttl_secs")]
    pub decay_ttl_secs: u64,
    /// Coalescing window for batched line insertion (milliseconds)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Radius of position-fix circles in statute miles
    #[serde(default = "default_circle_radius_miles")]
    pub circle_radius_miles: f64,
}

fn default_station_url() -> String {
    "http://localhost:8000/caller/RFFs".to_string()
}

fn default_event_url() -> String {
    "http://localhost:8000/caller/callers".to_string()
}

fn default_event_poll_secs() -> u64 {
    3
}

fn default_sweep_secs() -> u64 {
    3
}

fn default_recency_window_secs() -> u64 {
    300
}

fn default_decay_ttl_secs() -> u64 {
    300
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_circle_radius_miles() -> f64 {
    2.0
}

impl Default for Config {
    fn default() -> Self {
        // serde's field defaults are the single source of truth
        toml::from_str("").expect("empty config must deserialize")
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise from the resolved default path
    /// when that file exists, otherwise built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let p = config_path();
                if p.exists() {
                    Self::load(&p)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_secs(self.event_poll_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_secs)
    }

    pub fn recency_window(&self) -> Duration {
        Duration::from_secs(self.recency_window_secs)
    }

    pub fn decay_ttl(&self) -> Duration {
        Duration::from_secs(self.decay_ttl_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Resolve the config file path.
///
/// Priority:
/// 1. `RDFMAP_CONFIG` env var
/// 2. `./rdfmap.toml`
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("RDFMAP_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("./rdfmap.toml")
}
