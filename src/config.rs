//! Configuration
//!
//! Bus configuration composed from defaults, an optional TOML file and
//! `REBUS__*` environment variables.

pub mod facade;
pub mod sources;
pub mod storage_paths;

pub use facade::ConfigLoader;
pub use storage_paths::StorageConfig;

use crate::logging::LoggingConfig;
use crate::types::DEFAULT_DOMAIN;
use serde::{Deserialize, Serialize};

/// Top-level bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebusConfig {
    /// Domain agents join when none is given
    #[serde(default = "default_domain")]
    pub default_domain: String,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

impl Default for RebusConfig {
    fn default() -> Self {
        Self {
            default_domain: default_domain(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
