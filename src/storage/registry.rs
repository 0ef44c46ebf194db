//! Storage backend registry
//!
//! Maps backend names to constructors so a configuration can pick the
//! persistence engine by name.

use super::disk::{DiskStorage, DISK_STORAGE};
use super::memory::{RamStorage, RAM_STORAGE};
use super::StorageBackend;
use crate::config::StorageConfig;
use crate::error::{BusError, ConfigError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Constructor for a storage backend
pub type StorageFactory = fn(&StorageConfig) -> Result<Arc<dyn StorageBackend>, BusError>;

/// Name -> constructor table for storage backends
#[derive(Clone, Default)]
pub struct StorageRegistry {
    factories: BTreeMap<String, StorageFactory>,
}

impl StorageRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `ramstorage` and `diskstorage`
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(RAM_STORAGE, create_ram_storage);
        registry.register(DISK_STORAGE, create_disk_storage);
        registry
    }

    /// Register a backend; a later registration under the same name wins
    pub fn register(&mut self, name: &str, factory: StorageFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    /// Registered backend names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiate the backend named by `config.backend`
    pub fn create(&self, config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, BusError> {
        let factory = self
            .factories
            .get(&config.backend)
            .ok_or_else(|| ConfigError::UnknownBackend(config.backend.clone()))?;
        debug!(backend = %config.backend, "Creating storage backend");
        factory(config)
    }
}

fn create_ram_storage(_config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, BusError> {
    Ok(Arc::new(RamStorage::new()))
}

fn create_disk_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, BusError> {
    let path = config.resolve_path()?;
    Ok(Arc::new(DiskStorage::open(&path)?))
}
