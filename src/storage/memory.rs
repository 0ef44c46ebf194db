//! In-memory storage backend
//!
//! Volatile reference implementation of [`StorageBackend`]. Everything lives
//! in the shared index and is lost with the process; internal agent state is
//! not supported.

use super::index::{selector_regex, value_regex, IndexSet};
use super::{ProcessedStats, StorageBackend};
use crate::descriptor::Descriptor;
use crate::error::StorageError;
use chrono::Utc;
use tracing::{debug, trace};

/// Registry name of the in-memory backend
pub const RAM_STORAGE: &str = "ramstorage";

/// In-memory descriptor store
#[derive(Debug, Default)]
pub struct RamStorage {
    indices: IndexSet,
}

impl RamStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            indices: IndexSet::new(),
        }
    }
}

impl StorageBackend for RamStorage {
    fn name(&self) -> &'static str {
        RAM_STORAGE
    }

    fn add(&self, descriptor: &Descriptor) -> Result<bool, StorageError> {
        let stored = self
            .indices
            .write(descriptor.domain(), |index| index.insert(descriptor));
        if let Some(stored) = &stored {
            trace!(
                domain = stored.domain(),
                selector = stored.selector(),
                uuid = stored.uuid(),
                "Stored descriptor"
            );
        }
        Ok(stored.is_some())
    }

    fn get_descriptor(&self, domain: &str, selector: &str) -> Result<Descriptor, StorageError> {
        self.indices.read(domain, |index| index.get(domain, selector))
    }

    fn list_uuids(&self, domain: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.indices.read(domain, |index| index.uuids()))
    }

    fn find(
        &self,
        domain: &str,
        selector_regex_text: &str,
        limit: usize,
    ) -> Result<Vec<String>, StorageError> {
        let regex = selector_regex(selector_regex_text)?;
        Ok(self.indices.read(domain, |index| index.find(&regex, limit)))
    }

    fn find_by_uuid(&self, domain: &str, uuid: &str) -> Result<Vec<Descriptor>, StorageError> {
        self.indices.read(domain, |index| index.find_by_uuid(domain, uuid))
    }

    fn find_by_selector(
        &self,
        domain: &str,
        prefix: &str,
    ) -> Result<Vec<Descriptor>, StorageError> {
        Ok(self.indices.read(domain, |index| index.find_by_selector(prefix)))
    }

    fn find_by_value(
        &self,
        domain: &str,
        prefix: &str,
        value_pattern: &str,
    ) -> Result<Vec<Descriptor>, StorageError> {
        let pattern = value_regex(value_pattern)?;
        Ok(self
            .indices
            .read(domain, |index| index.find_by_value(prefix, &pattern)))
    }

    fn get_children(
        &self,
        domain: &str,
        selector: &str,
        recurse: bool,
    ) -> Result<Vec<Descriptor>, StorageError> {
        self.indices
            .read(domain, |index| index.children(domain, selector, recurse))
    }

    fn mark_processed(
        &self,
        domain: &str,
        selector: &str,
        agent_id: &str,
        config_text: &str,
    ) -> Result<(), StorageError> {
        let (_, entry) = self.indices.write(domain, |index| {
            index.mark_processed(selector, agent_id, config_text, Utc::now())
        });
        debug!(domain, selector, agent_id, count = entry.count, "Marked processed");
        Ok(())
    }

    fn processed_stats(&self, domain: &str) -> Result<ProcessedStats, StorageError> {
        Ok(self.indices.read(domain, |index| index.processed_stats()))
    }
}
