//! ConfigLoader facade composing the configuration sources.

use super::sources::{environment, file};
use super::RebusConfig;
use crate::error::ConfigError;
use crate::storage::memory::RAM_STORAGE;
use crate::types::DEFAULT_DOMAIN;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder};
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, an optional file and environment.
    /// Precedence: defaults (lowest) -> file -> environment (highest).
    pub fn load(path: Option<&Path>) -> Result<RebusConfig, ConfigError> {
        let mut builder = Self::builder_with_defaults()?;
        if let Some(path) = path {
            builder = file::add_to_builder(builder, path, false)?;
        }
        let builder = environment::add_to_builder(builder)?;
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load configuration from a file that must exist, with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<RebusConfig, ConfigError> {
        let builder = Self::builder_with_defaults()?;
        let builder = file::add_to_builder(builder, path, true)?;
        let builder = environment::add_to_builder(builder)?;
        Ok(builder.build()?.try_deserialize()?)
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("default_domain", DEFAULT_DOMAIN)?
            .set_default("storage.backend", RAM_STORAGE)?)
    }
}
