//! Mapper configuration.
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `STRATA_*` environment variables (`STRATA_LAZY_THRESHOLD=16`,
//! `STRATA_ON_STALE=reopen`, `STRATA_LOGGING__LEVEL=debug`).

use crate::error::MapError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a lazy series collection does when its backing store session has
/// closed by the time it is first accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnStale {
    /// Fail the access with a stale-handle error.
    #[default]
    Fail,
    /// Reopen the store read-only at its recorded location and retry.
    Reopen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperConfig {
    #[serde(default)]
    pub on_stale: OnStale,

    /// Sub-recordings with at least this many series tags read back as a
    /// lazy collection instead of being decoded eagerly.
    #[serde(default = "default_lazy_threshold")]
    pub lazy_threshold: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_lazy_threshold() -> usize {
    64
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            on_stale: OnStale::default(),
            lazy_threshold: default_lazy_threshold(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MapperConfig {
    /// Load with the full layering. A named file that does not exist is an
    /// error; pass `None` to skip the file layer.
    pub fn load(file: Option<&Path>) -> Result<Self, MapError> {
        let mut builder = Config::builder()
            .set_default("on_stale", "fail")?
            .set_default("lazy_threshold", default_lazy_threshold() as i64)?;
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        let merged = builder
            .add_source(Environment::with_prefix("STRATA").separator("__"))
            .build()?;
        Ok(merged.try_deserialize()?)
    }
}
