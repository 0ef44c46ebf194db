//! Error types
//!
//! One error enum per layer: descriptor construction and encoding, storage
//! backends, configuration, and the bus that composes them.

use thiserror::Error;

/// Errors raised while building or encoding a descriptor
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Value cannot be deterministically serialized for hashing
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Selector carries a content pin that is not a sha256 hex digest
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// Requested selector or uuid is unknown in the domain
    #[error("Not found: {0}")]
    NotFound(String),

    /// Selector or value pattern failed to compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

impl StorageError {
    /// Create a new NotFound error for a domain-scoped key
    pub fn not_found(domain: &str, key: impl AsRef<str>) -> Self {
        Self::NotFound(format!("{}:{}", domain, key.as_ref()))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<regex::Error> for StorageError {
    fn from(err: regex::Error) -> Self {
        StorageError::InvalidPattern(err.to_string())
    }
}

/// Configuration loading and resolution errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("Unknown storage backend: {0}")]
    UnknownBackend(String),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Errors surfaced by bus operations
#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No agent registered under this name
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Agent thread could not be started
    #[error("Failed to start agent {agent}: {reason}")]
    AgentSpawn { agent: String, reason: String },
}

impl BusError {
    /// True when the underlying cause is an unknown selector or uuid
    pub fn is_not_found(&self) -> bool {
        matches!(self, BusError::Storage(StorageError::NotFound(_)))
    }
}
