//! Per-domain descriptor index
//!
//! Shared by every backend: the on-disk backend rebuilds it on open and keeps
//! it in memory for queries.

use super::ProcessedStats;
use crate::descriptor::selector::{self, LATEST_VERSION};
use crate::descriptor::Descriptor;
use crate::error::StorageError;
use crate::types::agent_name;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

/// Namespace for lineage uuids derived from `domain:selector`
const LINEAGE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93d0_4b8e_a5f7_1e2d_3c4b_5a69);

/// Key of one processed-ledger entry: (selector, agent name, config text)
pub(crate) type LedgerKey = (String, String, String);

/// Processed-ledger entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LedgerEntry {
    pub count: u64,
    pub last: DateTime<Utc>,
}

/// Descriptors and secondary indices of one domain
#[derive(Debug, Default)]
pub(crate) struct DomainIndex {
    /// Pinned selectors in insertion order
    order: Vec<String>,
    /// Pinned selector -> stored descriptor (uuid assigned)
    descriptors: HashMap<String, Descriptor>,
    /// Lineage uuid -> selectors, insertion order
    by_uuid: HashMap<String, Vec<String>>,
    /// Lineage uuids in first-seen order
    uuid_order: Vec<String>,
    /// Chain key (base path) -> selectors, insertion order
    chains: HashMap<String, Vec<String>>,
    /// Precursor selector -> child selectors
    children: HashMap<String, Vec<String>>,
    ledger: HashMap<LedgerKey, LedgerEntry>,
}

impl DomainIndex {
    pub fn contains(&self, selector: &str) -> bool {
        self.descriptors.contains_key(selector)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Insert a descriptor, assigning its lineage uuid.
    ///
    /// Returns the stored copy, or `None` when the selector is already known.
    pub fn insert(&mut self, descriptor: &Descriptor) -> Option<Descriptor> {
        let selector = descriptor.selector().to_string();
        if self.contains(&selector) {
            return None;
        }

        let chain = selector::chain_key(&selector).to_string();
        let uuid = self.lineage_uuid(descriptor, &chain);
        let stored = descriptor.clone().with_uuid(uuid.clone());

        let members = self.by_uuid.entry(uuid.clone()).or_default();
        if members.is_empty() {
            self.uuid_order.push(uuid);
        }
        members.push(selector.clone());
        self.chains.entry(chain).or_default().push(selector.clone());
        for precursor in stored.precursors() {
            let siblings = self.children.entry(precursor.clone()).or_default();
            if !siblings.contains(&selector) {
                siblings.push(selector.clone());
            }
        }
        self.order.push(selector.clone());
        self.descriptors.insert(selector, stored.clone());
        Some(stored)
    }

    /// Version 0 opens a lineage; later versions join their predecessor's.
    fn lineage_uuid(&self, descriptor: &Descriptor, chain: &str) -> String {
        if descriptor.version() > 0 {
            if let Some(uuid) = self.predecessor(descriptor, chain).and_then(Descriptor::uuid) {
                return uuid.to_string();
            }
        }
        let name = format!("{}:{}", descriptor.domain(), descriptor.selector());
        Uuid::new_v5(&LINEAGE_NAMESPACE, name.as_bytes()).to_string()
    }

    /// Previous version of a descriptor: same chain, version one lower, and
    /// the lineage it extended. Falls back to the newest version in the chain.
    fn predecessor(&self, descriptor: &Descriptor, chain: &str) -> Option<&Descriptor> {
        let extended = descriptor.precursors().get(1..).unwrap_or(&[]);
        self.chains
            .get(chain)?
            .iter()
            .rev()
            .filter_map(|s| self.descriptors.get(s))
            .find(|d| d.version() + 1 == descriptor.version() && d.precursors() == extended)
            .or_else(|| self.latest_in_chain(chain))
    }

    /// Highest version under a chain key; later insertion wins ties
    fn latest_in_chain(&self, chain: &str) -> Option<&Descriptor> {
        self.chains
            .get(chain)?
            .iter()
            .filter_map(|s| self.descriptors.get(s))
            .max_by_key(|d| d.version())
    }

    /// Resolve a pinned selector or a `<base>~<n>` query
    pub fn resolve(&self, selector: &str) -> Option<&Descriptor> {
        match selector::parse_version_query(selector) {
            Some((chain, LATEST_VERSION)) => self.latest_in_chain(chain),
            Some((_, version)) if version < 0 => None,
            Some((chain, version)) => self
                .chains
                .get(chain)?
                .iter()
                .rev()
                .filter_map(|s| self.descriptors.get(s))
                .find(|d| d.version() == version as u64),
            None => self.descriptors.get(selector),
        }
    }

    pub fn get(&self, domain: &str, selector: &str) -> Result<Descriptor, StorageError> {
        self.resolve(selector)
            .cloned()
            .ok_or_else(|| StorageError::not_found(domain, selector))
    }

    pub fn uuids(&self) -> Vec<String> {
        self.uuid_order.clone()
    }

    pub fn find(&self, regex: &regex::Regex, limit: usize) -> Vec<String> {
        let matches = self.order.iter().filter(|s| regex.is_match(s)).cloned();
        if limit == 0 {
            matches.collect()
        } else {
            matches.take(limit).collect()
        }
    }

    pub fn find_by_uuid(&self, domain: &str, uuid: &str) -> Result<Vec<Descriptor>, StorageError> {
        let selectors = self
            .by_uuid
            .get(uuid)
            .ok_or_else(|| StorageError::not_found(domain, uuid))?;
        Ok(self.collect(selectors.iter()))
    }

    pub fn find_by_selector(&self, prefix: &str) -> Vec<Descriptor> {
        self.collect(self.order.iter().filter(|s| s.starts_with(prefix)))
    }

    pub fn find_by_value(&self, prefix: &str, pattern: &regex::bytes::Regex) -> Vec<Descriptor> {
        self.order
            .iter()
            .filter(|s| s.starts_with(prefix))
            .filter_map(|s| self.descriptors.get(s))
            .filter(|d| {
                d.value()
                    .canonical_bytes()
                    .map(|bytes| pattern.is_match(&bytes))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Breadth-first walk of precursor -> child links
    pub fn children(
        &self,
        domain: &str,
        selector: &str,
        recurse: bool,
    ) -> Result<Vec<Descriptor>, StorageError> {
        let root = self
            .resolve(selector)
            .ok_or_else(|| StorageError::not_found(domain, selector))?
            .selector()
            .to_string();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut found: Vec<&String> = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(root.as_str());
        while let Some(current) = queue.pop_front() {
            for child in self.children.get(current).into_iter().flatten() {
                if child == &root || !seen.insert(child.as_str()) {
                    continue;
                }
                found.push(child);
                if recurse {
                    queue.push_back(child);
                }
            }
        }
        Ok(self.collect(found.into_iter()))
    }

    /// Bump the ledger entry for (selector, agent, config); returns the key
    /// and updated entry so persistent backends can write it through.
    pub fn mark_processed(
        &mut self,
        selector: &str,
        agent_id: &str,
        config_text: &str,
        at: DateTime<Utc>,
    ) -> (LedgerKey, LedgerEntry) {
        let key = (
            selector.to_string(),
            agent_name(agent_id).to_string(),
            config_text.to_string(),
        );
        let entry = self
            .ledger
            .entry(key.clone())
            .and_modify(|e| {
                e.count += 1;
                e.last = at;
            })
            .or_insert(LedgerEntry { count: 1, last: at });
        (key, *entry)
    }

    /// Restore a ledger entry read back from persistent storage
    pub fn restore_ledger_entry(&mut self, key: LedgerKey, entry: LedgerEntry) {
        self.ledger.insert(key, entry);
    }

    pub fn processed_stats(&self) -> ProcessedStats {
        let mut distinct: HashMap<&str, HashSet<&str>> = HashMap::new();
        for (selector, agent, _) in self.ledger.keys() {
            distinct.entry(agent.as_str()).or_default().insert(selector.as_str());
        }
        ProcessedStats {
            per_agent: distinct
                .into_iter()
                .map(|(agent, selectors)| (agent.to_string(), selectors.len()))
                .collect(),
            total_descriptors: self.len(),
            last_processed: self.ledger.values().map(|e| e.last).max(),
        }
    }

    fn collect<'a>(&self, selectors: impl Iterator<Item = &'a String>) -> Vec<Descriptor> {
        selectors
            .filter_map(|s| self.descriptors.get(s))
            .cloned()
            .collect()
    }
}

/// Domain -> index map behind a single lock
#[derive(Debug, Default)]
pub(crate) struct IndexSet {
    domains: RwLock<HashMap<String, DomainIndex>>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a read against a domain; unknown domains read as empty
    pub fn read<T>(&self, domain: &str, f: impl FnOnce(&DomainIndex) -> T) -> T {
        let domains = self.domains.read();
        match domains.get(domain) {
            Some(index) => f(index),
            None => f(&DomainIndex::default()),
        }
    }

    /// Run a mutation against a domain, creating it on first use
    pub fn write<T>(&self, domain: &str, f: impl FnOnce(&mut DomainIndex) -> T) -> T {
        let mut domains = self.domains.write();
        f(domains.entry(domain.to_string()).or_default())
    }
}

/// Compile a selector regex anchored at the selector start
pub(crate) fn selector_regex(pattern: &str) -> Result<regex::Regex, StorageError> {
    Ok(regex::Regex::new(&format!("^(?:{})", pattern))?)
}

/// Compile a pattern matched anywhere in value bytes.
///
/// Unicode mode is off, so `\x90` matches the single byte 0x90 rather than
/// the UTF-8 encoding of U+0090.
pub(crate) fn value_regex(pattern: &str) -> Result<regex::bytes::Regex, StorageError> {
    Ok(regex::bytes::RegexBuilder::new(pattern)
        .unicode(false)
        .build()?)
}

/// Escape raw bytes into a value pattern that matches them literally
pub fn byte_pattern(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| {
            if b.is_ascii_alphanumeric() {
                char::from(b).to_string()
            } else {
                format!("\\x{:02x}", b)
            }
        })
        .collect()
}
