//! StorageConfig and store path resolution.

use crate::error::ConfigError;
use crate::storage::memory::RAM_STORAGE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_backend() -> String {
    RAM_STORAGE.to_string()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend registry name (`ramstorage`, `diskstorage`)
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Store location for persistent backends; None means the platform data
    /// directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the store location for persistent backends.
    pub fn resolve_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.path {
            if !path.as_os_str().is_empty() {
                return Ok(path.clone());
            }
        }
        let project_dirs = directories::ProjectDirs::from("", "rebus", "rebus").ok_or_else(|| {
            ConfigError::Invalid("Could not determine platform data directory for store".to_string())
        })?;
        Ok(project_dirs.data_dir().join("store"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
        }
    }
}
