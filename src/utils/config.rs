// src/utils/config.rs
//! Layered application configuration
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. Built-in defaults of every section
//! 2. Optional config file (`RECORDER_CONFIG`, default `recorder.toml`)
//! 3. Environment variables `RECORDER__<SECTION>__<KEY>`

use crate::agent::grabber::GrabberConfig;
use crate::contest::feed::FeedConfig;
use crate::observability::ObservabilityConfig;
use crate::recording::audit::AuditConfig;
use crate::recording::engine::RecordingTimings;
use crate::recording::storage::StorageConfig;
use crate::utils::errors::{RecorderError, Result};
use serde::Deserialize;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "RECORDER_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "recorder";
const ENV_PREFIX: &str = "RECORDER";

/// Upper bound for any configured duration (one day)
const MAX_TIMING_MS: u64 = 24 * 60 * 60 * 1000;

/// Full recorder configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub audit: AuditConfig,
    pub feed: FeedConfig,
    pub timings: RecordingTimings,
    pub agent: GrabberConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from the default file location and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from `path` (extension optional) and the environment
    pub fn load_from(path: &str) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| RecorderError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = raw
            .try_deserialize()
            .map_err(|e| RecorderError::ConfigError(format!("Invalid config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the recorder cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.storage.path.as_os_str().is_empty() {
            return Err(RecorderError::ConfigError("storage.path must not be empty".into()));
        }
        if self.feed.path.is_empty() {
            return Err(RecorderError::ConfigError("feed.path must not be empty".into()));
        }

        let timings = [
            ("timings.max_record_delay_ms", self.timings.max_record_delay_ms),
            ("timings.max_record_duration_ms", self.timings.max_record_duration_ms),
            ("timings.record_after_stop_ms", self.timings.record_after_stop_ms),
            ("agent.request_timeout_ms", self.agent.request_timeout_ms),
        ];
        if let Some((name, _)) = timings.iter().find(|(_, value)| *value == 0) {
            return Err(RecorderError::ConfigError(format!("{} must be positive", name)));
        }

        let margin = ("timings.contest_end_margin_ms", self.timings.contest_end_margin_ms);
        if let Some((name, _)) = timings
            .iter()
            .chain(std::iter::once(&margin))
            .find(|(_, value)| *value > MAX_TIMING_MS)
        {
            return Err(RecorderError::ConfigError(format!(
                "{} must not exceed {} ms",
                name, MAX_TIMING_MS
            )));
        }

        Ok(())
    }
}
