//! Structured logging via the `tracing` stack.
//!
//! Level and format come from configuration; the `STRATA_LOG` environment
//! variable overrides the configured filter entirely, using the usual
//! `EnvFilter` directive syntax.

use crate::error::MapError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Colored output (text format only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Install the global subscriber. Call once, early; a second call fails
/// inside `tracing` and is reported as a configuration error.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), MapError> {
    let filter = build_env_filter(config)?;
    let base = Registry::default().with(filter);

    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    let use_color = config.map(|c| c.color).unwrap_or(true);

    if format == "json" {
        base.with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .try_init()
    } else {
        base.with(
            fmt::layer()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(use_color)
                .with_writer(std::io::stderr),
        )
        .try_init()
    }
    .map_err(|e| config_error(format!("failed to install subscriber: {e}")))
}

fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, MapError> {
    if let Ok(filter) = EnvFilter::try_from_env("STRATA_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            let directive = format!("{module}={module_level}");
            filter = filter.add_directive(
                directive
                    .parse()
                    .map_err(|e| config_error(format!("invalid log directive: {e}")))?,
            );
        }
    }
    Ok(filter)
}

fn config_error(message: String) -> MapError {
    MapError::Config(config::ConfigError::Message(message))
}
