//! Runtime configuration.

use std::{env, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{errors::ConfigError, models::UnitSystem, stats::DEFAULT_PACE_LOG_CAPACITY};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrideConfig {
    pub stats: StatsConfig,
    pub scheduler: SchedulerConfig,
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Maximum number of points kept for rolling-pace interpolation.
    pub pace_log_capacity: usize,
    pub unit_system: UnitSystem,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            pace_log_capacity: DEFAULT_PACE_LOG_CAPACITY,
            unit_system: UnitSystem::Metric,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tracks queued right after a flush.
    pub initial_batch_size: usize,
    /// Tracks queued per refill.
    pub refill_batch_size: usize,
    /// Refill once the believed queue depth drops to this.
    pub low_water_mark: usize,
    /// Upper bound on skips while flushing.
    pub max_flush_skips: usize,
    pub skip_confirm_timeout_ms: u64,
    /// Known track used as the end-of-queue marker while flushing.
    pub placeholder_track_id: String,
    pub track_uri_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: 10,
            refill_batch_size: 10,
            low_water_mark: 5,
            max_flush_skips: 50,
            skip_confirm_timeout_ms: 5000,
            placeholder_track_id: "4uLU6hMCjMI75M1A2tKUQC".to_string(),
            track_uri_prefix: "spotify:track:".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn skip_confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.skip_confirm_timeout_ms)
    }

    pub fn track_uri(&self, id: &str) -> String {
        format!("{}{}", self.track_uri_prefix, id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl StrideConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Defaults, then an optional file named by `STRIDE_CONFIG`, then env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var("STRIDE_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `STRIDE_*` overrides looked up through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("STRIDE_BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Some(value) = lookup("STRIDE_INITIAL_BATCH") {
            self.scheduler.initial_batch_size = parse_count("STRIDE_INITIAL_BATCH", value)?;
        }
        if let Some(value) = lookup("STRIDE_REFILL_BATCH") {
            self.scheduler.refill_batch_size = parse_count("STRIDE_REFILL_BATCH", value)?;
        }
        if let Some(value) = lookup("STRIDE_UNITS") {
            self.stats.unit_system = UnitSystem::parse(&value).ok_or(ConfigError::InvalidEnv {
                key: "STRIDE_UNITS",
                value,
            })?;
        }
        Ok(())
    }
}

fn parse_count(key: &'static str, value: String) -> Result<usize, ConfigError> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidEnv { key, value }),
    }
}
