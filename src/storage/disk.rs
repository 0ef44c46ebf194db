//! On-disk storage backend
//!
//! Persists descriptors (wire form), the processed ledger and internal agent
//! state in a sled database. Queries run against the shared in-memory index,
//! which is rebuilt from the database on open by replaying descriptors in
//! their original insertion order, so lineage uuids come back unchanged.

use super::index::{selector_regex, value_regex, IndexSet, LedgerEntry};
use super::{ProcessedStats, StorageBackend};
use crate::descriptor::Descriptor;
use crate::error::StorageError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Registry name of the on-disk backend
pub const DISK_STORAGE: &str = "diskstorage";

const DESCRIPTORS_TREE: &str = "descriptors";
const LEDGER_TREE: &str = "processed";
const STATE_TREE: &str = "state";

/// sled-backed descriptor store
pub struct DiskStorage {
    path: PathBuf,
    db: sled::Db,
    /// Insertion id (big-endian u64) -> wire-encoded descriptor
    descriptors: sled::Tree,
    /// (domain, selector, agent name, config) -> (count, last mark millis)
    ledger: sled::Tree,
    /// Agent id -> opaque state blob
    state: sled::Tree,
    indices: IndexSet,
}

impl DiskStorage {
    /// Open (or create) a store at `path` and rebuild its indices
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let storage = Self {
            path: path.to_path_buf(),
            descriptors: db.open_tree(DESCRIPTORS_TREE)?,
            ledger: db.open_tree(LEDGER_TREE)?,
            state: db.open_tree(STATE_TREE)?,
            db,
            indices: IndexSet::new(),
        };
        let restored = storage.restore()?;
        info!(
            path = %storage.path.display(),
            descriptors = restored,
            "Opened disk storage"
        );
        Ok(storage)
    }

    /// Database location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn restore(&self) -> Result<usize, StorageError> {
        let mut restored = 0;
        for item in self.descriptors.iter() {
            let (key, bytes) = item?;
            let descriptor = match Descriptor::deserialize(&bytes) {
                Ok(Some(descriptor)) => descriptor,
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        record = %hex::encode(&key),
                        error = %e,
                        "Skipping undecodable descriptor record"
                    );
                    continue;
                }
            };
            self.indices
                .write(descriptor.domain(), |index| index.insert(&descriptor));
            restored += 1;
        }

        for item in self.ledger.iter() {
            let (key, value) = item?;
            let (domain, selector, agent, config): (String, String, String, String) =
                bincode::deserialize(&key)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
            let (count, millis): (u64, i64) = bincode::deserialize(&value)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            let Some(last) = DateTime::<Utc>::from_timestamp_millis(millis) else {
                warn!(
                    domain = %domain,
                    selector = %selector,
                    millis,
                    "Skipping ledger entry with invalid timestamp"
                );
                continue;
            };
            self.indices.write(&domain, |index| {
                index.restore_ledger_entry((selector, agent, config), LedgerEntry { count, last })
            });
        }

        Ok(restored)
    }
}

impl StorageBackend for DiskStorage {
    fn name(&self) -> &'static str {
        DISK_STORAGE
    }

    fn add(&self, descriptor: &Descriptor) -> Result<bool, StorageError> {
        // Persist under the index lock so check, write and insert are one step
        let stored = self.indices.write(descriptor.domain(), |index| {
            if index.contains(descriptor.selector()) {
                return Ok(None);
            }
            let bytes = descriptor.serialize()?;
            let id = self.db.generate_id()?;
            self.descriptors.insert(id.to_be_bytes(), bytes)?;
            Ok::<_, StorageError>(index.insert(descriptor))
        })?;

        if let Some(stored) = &stored {
            trace!(
                domain = stored.domain(),
                selector = stored.selector(),
                uuid = stored.uuid(),
                "Persisted descriptor"
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
        let count = self.indices.write(domain, |index| {
            let ((selector, agent, config), entry) =
                index.mark_processed(selector, agent_id, config_text, Utc::now());
            let key = bincode::serialize(&(domain, selector, agent, config))
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            let value = bincode::serialize(&(entry.count, entry.last.timestamp_millis()))
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            self.ledger.insert(key, value)?;
            Ok::<_, StorageError>(entry.count)
        })?;
        debug!(domain, selector, agent_id, count, "Marked processed");
        Ok(())
    }

    fn processed_stats(&self, domain: &str) -> Result<ProcessedStats, StorageError> {
        Ok(self.indices.read(domain, |index| index.processed_stats()))
    }

    fn supports_internal_state(&self) -> bool {
        true
    }

    fn store_state(&self, key: &str, state: &[u8]) -> Result<(), StorageError> {
        self.state.insert(key.as_bytes(), state)?;
        Ok(())
    }

    fn load_state(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        Ok(self
            .state
            .get(key.as_bytes())?
            .map(|v| v.to_vec())
            .unwrap_or_default())
    }
}
