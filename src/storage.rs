//! Descriptor Storage
//!
//! Service contract every persistence engine satisfies, plus the in-memory
//! reference backend and a sled-backed on-disk backend. Storage is
//! content-addressed: a descriptor is stored once per (domain, selector) and
//! indexed by uuid, base selector path and precursor links.

pub mod disk;
pub(crate) mod index;
pub mod memory;
pub mod registry;

pub use disk::DiskStorage;
pub use index::byte_pattern;
pub use memory::RamStorage;
pub use registry::StorageRegistry;

use crate::descriptor::{Descriptor, Value};
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Processed-ledger summary for one domain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedStats {
    /// Agent name -> number of distinct descriptors it marked processed
    pub per_agent: BTreeMap<String, usize>,
    /// Number of descriptors stored in the domain
    pub total_descriptors: usize,
    /// Most recent mark in the domain
    pub last_processed: Option<DateTime<Utc>>,
}

/// Descriptor store contract
///
/// Reads of an unknown domain behave as reads of an empty domain. All methods
/// take `&self`; implementations synchronize internally so one backend can be
/// shared by every agent thread.
pub trait StorageBackend: Send + Sync {
    /// Registry name of the backend
    fn name(&self) -> &'static str;

    /// Insert a descriptor unless (domain, selector) is already stored.
    ///
    /// Returns whether the insertion happened. The check and the insert are
    /// one atomic step.
    fn add(&self, descriptor: &Descriptor) -> Result<bool, StorageError>;

    /// Fetch by pinned selector or by `<base>~<n>` version query
    fn get_descriptor(&self, domain: &str, selector: &str) -> Result<Descriptor, StorageError>;

    fn get_value(&self, domain: &str, selector: &str) -> Result<Value, StorageError> {
        self.get_descriptor(domain, selector)
            .map(|d| d.value().clone())
    }

    /// Lineage uuids in first-seen order
    fn list_uuids(&self, domain: &str) -> Result<Vec<String>, StorageError>;

    /// Selectors matching a regex anchored at the selector start.
    ///
    /// At most `limit` selectors in insertion order; `0` means no limit.
    fn find(
        &self,
        domain: &str,
        selector_regex: &str,
        limit: usize,
    ) -> Result<Vec<String>, StorageError>;

    /// Every version sharing a lineage uuid
    fn find_by_uuid(&self, domain: &str, uuid: &str) -> Result<Vec<Descriptor>, StorageError>;

    /// Descriptors whose selector starts with `prefix`
    fn find_by_selector(&self, domain: &str, prefix: &str)
        -> Result<Vec<Descriptor>, StorageError>;

    /// Descriptors under `prefix` whose value bytes match `value_pattern`.
    ///
    /// The pattern is a byte regex with Unicode off; use [`byte_pattern`] to
    /// search for a literal byte string.
    fn find_by_value(
        &self,
        domain: &str,
        prefix: &str,
        value_pattern: &str,
    ) -> Result<Vec<Descriptor>, StorageError>;

    /// Direct children, or the transitive closure when `recurse` is set
    fn get_children(
        &self,
        domain: &str,
        selector: &str,
        recurse: bool,
    ) -> Result<Vec<Descriptor>, StorageError>;

    /// Record that an agent processed a descriptor with a given configuration
    fn mark_processed(
        &self,
        domain: &str,
        selector: &str,
        agent_id: &str,
        config_text: &str,
    ) -> Result<(), StorageError>;

    fn processed_stats(&self, domain: &str) -> Result<ProcessedStats, StorageError>;

    /// Whether `store_state`/`load_state` persist anything
    fn supports_internal_state(&self) -> bool {
        false
    }

    fn store_state(&self, _key: &str, _state: &[u8]) -> Result<(), StorageError> {
        Ok(())
    }

    fn load_state(&self, _key: &str) -> Result<Vec<u8>, StorageError> {
        Ok(Vec::new())
    }
}
