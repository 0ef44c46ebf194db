//! Descriptors
//!
//! Immutable, content-addressed units of knowledge about an artifact. A
//! descriptor's identity is its pinned selector; its lineage is the ordered
//! list of precursor selectors it was derived from.

pub mod selector;
pub mod value;
pub mod wire;

pub use value::Value;

use crate::error::DescriptorError;
use crate::types::DEFAULT_DOMAIN;
use sha2::{Digest, Sha256};
use std::fmt;

/// Processing time recorded when the producer did not measure it
pub const UNKNOWN_PROCESSING_TIME: f64 = -1.0;

/// Value representations longer than this are truncated in `Display`
const DISPLAY_VALUE_MAX: usize = 30;
const DISPLAY_VALUE_PREFIX: usize = 22;

/// One unit of derived knowledge
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    label: String,
    selector: String,
    value: Value,
    domain: String,
    agent: Option<String>,
    precursors: Vec<String>,
    version: u64,
    processing_time: f64,
    hash: String,
    uuid: Option<String>,
}

/// Optional construction parameters for a [`Descriptor`]
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    label: String,
    selector: String,
    value: Value,
    domain: String,
    agent: Option<String>,
    precursors: Vec<String>,
    version: u64,
    processing_time: f64,
}

impl DescriptorBuilder {
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn precursors(mut self, precursors: Vec<String>) -> Self {
        self.precursors = precursors;
        self
    }

    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn processing_time(mut self, seconds: f64) -> Self {
        self.processing_time = seconds;
        self
    }

    /// Compute identity and produce the immutable descriptor
    pub fn build(self) -> Result<Descriptor, DescriptorError> {
        let (selector, hash) = match selector::split_pin(&self.selector) {
            Some((_, pinned)) => {
                if !selector::is_valid_hash(pinned) {
                    return Err(DescriptorError::InvalidSelector(format!(
                        "malformed content pin in {}",
                        self.selector
                    )));
                }
                (self.selector.clone(), pinned.to_string())
            }
            None => {
                let hash = content_hash(
                    &self.selector,
                    &self.value,
                    self.agent.as_deref(),
                    &self.precursors,
                )?;
                (selector::pin(&self.selector, &hash), hash)
            }
        };

        Ok(Descriptor {
            label: self.label,
            selector,
            value: self.value,
            domain: self.domain,
            agent: self.agent,
            precursors: self.precursors,
            version: self.version,
            processing_time: self.processing_time,
            hash,
            uuid: None,
        })
    }
}

/// Compute a descriptor hash from its unpinned inputs.
///
/// Provenance (agent + precursors + selector) is hashed when both agent and
/// precursors are present, so derived descriptors with colliding values (empty
/// markers, for instance) keep distinct identities. Root descriptors hash
/// their value.
pub fn content_hash(
    selector: &str,
    value: &Value,
    agent: Option<&str>,
    precursors: &[String],
) -> Result<String, DescriptorError> {
    let mut hasher = Sha256::new();
    match agent {
        Some(agent) if !agent.is_empty() && !precursors.is_empty() => {
            hasher.update(agent.as_bytes());
            hasher.update(render_precursors(precursors).as_bytes());
            hasher.update(selector.as_bytes());
        }
        _ => hasher.update(value.canonical_bytes()?.as_ref()),
    }
    Ok(hex::encode(hasher.finalize()))
}

/// List rendering of precursors mixed into provenance hashes: `['a', 'b']`
fn render_precursors(precursors: &[String]) -> String {
    let items: Vec<String> = precursors.iter().map(|p| format!("'{}'", p)).collect();
    format!("[{}]", items.join(", "))
}

impl Descriptor {
    /// Start building a descriptor in the default domain
    pub fn builder(
        label: impl Into<String>,
        selector: impl Into<String>,
        value: impl Into<Value>,
    ) -> DescriptorBuilder {
        DescriptorBuilder {
            label: label.into(),
            selector: selector.into(),
            value: value.into(),
            domain: DEFAULT_DOMAIN.to_string(),
            agent: None,
            precursors: Vec::new(),
            version: 0,
            processing_time: UNKNOWN_PROCESSING_TIME,
        }
    }

    /// Construct a root descriptor with no agent and no precursors
    pub fn new(
        label: impl Into<String>,
        selector: impl Into<String>,
        value: impl Into<Value>,
        domain: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        Self::builder(label, selector, value).domain(domain).build()
    }

    /// Derive a child descriptor from this one.
    ///
    /// The child lives in the same domain, has this descriptor as its only
    /// precursor, and starts at version 0. The label is inherited unless one
    /// is given.
    pub fn spawn(
        &self,
        selector: impl Into<String>,
        value: impl Into<Value>,
        agent: impl Into<String>,
        processing_time: Option<f64>,
        label: Option<&str>,
    ) -> Result<Descriptor, DescriptorError> {
        Self::builder(label.unwrap_or(self.label.as_str()), selector, value)
            .domain(self.domain.clone())
            .agent(agent)
            .precursors(vec![self.selector.clone()])
            .processing_time(processing_time.unwrap_or(UNKNOWN_PROCESSING_TIME))
            .build()
    }

    /// Derive the next version of this descriptor.
    ///
    /// Used by aggregating agents: the new version keeps the base selector
    /// path, domain and agent, prepends `new_precursor` to the lineage and
    /// bumps the version.
    pub fn new_version(
        &self,
        label: impl Into<String>,
        value: impl Into<Value>,
        new_precursor: impl Into<String>,
        processing_time: Option<f64>,
    ) -> Result<Descriptor, DescriptorError> {
        let mut precursors = Vec::with_capacity(self.precursors.len() + 1);
        precursors.push(new_precursor.into());
        precursors.extend(self.precursors.iter().cloned());

        let mut builder = Self::builder(label, self.base_path(), value)
            .domain(self.domain.clone())
            .precursors(precursors)
            .version(self.version + 1)
            .processing_time(processing_time.unwrap_or(UNKNOWN_PROCESSING_TIME));
        if let Some(agent) = &self.agent {
            builder = builder.agent(agent.clone());
        }
        builder.build()
    }

    /// Encode the persisted fields in the portable wire form
    pub fn serialize(&self) -> Result<Vec<u8>, DescriptorError> {
        wire::encode(self)
    }

    /// Decode a wire payload; an empty payload carries no descriptor
    pub fn deserialize(bytes: &[u8]) -> Result<Option<Descriptor>, DescriptorError> {
        wire::decode(bytes)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Pinned selector
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Selector path without the content pin
    pub fn base_path(&self) -> &str {
        selector::base_path(&self.selector)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn agent(&self) -> Option<&str> {
        self.agent.as_deref()
    }

    pub fn precursors(&self) -> &[String] {
        &self.precursors
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn processing_time(&self) -> f64 {
        self.processing_time
    }

    /// sha256 hex digest pinned in the selector
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Lineage identifier, set once the descriptor has been stored
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    pub(crate) fn with_uuid(mut self, uuid: String) -> Self {
        self.uuid = Some(uuid);
        self
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = self.value.to_string();
        let count = repr.chars().count();
        let shown = if count > DISPLAY_VALUE_MAX {
            let prefix: String = repr.chars().take(DISPLAY_VALUE_PREFIX).collect();
            format!("[{}][{}...]", count, prefix)
        } else {
            repr
        };
        write!(f, "{}:{}({})={}", self.domain, self.selector, self.label, shown)
    }
}
