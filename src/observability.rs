// src/observability.rs
//! Tracing and metrics setup
//!
//! `RUST_LOG` takes precedence over the configured log level. Metrics are
//! exported over HTTP in Prometheus format only when `metrics_addr` is set.

use crate::utils::errors::{RecorderError, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Counter: decisions taken by the engine, labelled by `kind`
pub const DECISIONS_TOTAL: &str = "recorder_decisions_total";

/// Counter: dispatched agent commands, labelled by `command`
pub const DISPATCH_TOTAL: &str = "recorder_dispatch_total";

/// Counter: failed agent commands, labelled by `command`
pub const DISPATCH_FAILURES_TOTAL: &str = "recorder_dispatch_failures_total";

/// Logging and metrics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,

    /// Prometheus listener address
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_addr: None,
        }
    }
}

/// Install the global tracing subscriber
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| RecorderError::ConfigError(format!("Invalid log level: {}", e)))?;

    let (json_layer, plain_layer) = if config.json_logs {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .try_init()
        .map_err(|e| RecorderError::ConfigError(format!("Failed to install subscriber: {}", e)))?;

    Ok(())
}

/// Install the Prometheus exporter if an address is configured
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let Some(addr) = config.metrics_addr else {
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| RecorderError::ConfigError(format!("Failed to start metrics exporter: {}", e)))?;

    info!("Metrics exporter listening on {}", addr);
    Ok(())
}
