//! Portable wire form
//!
//! A one-byte format tag followed by a bincode record holding exactly the
//! persisted descriptor fields. The hash is re-derived from the pinned
//! selector on decode and the uuid belongs to the storage layer, so neither
//! travels on the wire.

use super::{Descriptor, Value};
use crate::error::DescriptorError;
use serde::{Deserialize, Serialize};

/// Current wire format tag
pub const WIRE_FORMAT_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
enum WireValue {
    Bytes(Vec<u8>),
    Text(String),
    /// Canonical JSON text
    Json(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct WireDescriptor {
    label: String,
    selector: String,
    value: WireValue,
    domain: String,
    agent: Option<String>,
    precursors: Vec<String>,
    version: u64,
    processing_time: f64,
}

/// Encode a descriptor
pub fn encode(descriptor: &Descriptor) -> Result<Vec<u8>, DescriptorError> {
    let value = match &descriptor.value {
        Value::Bytes(bytes) => WireValue::Bytes(bytes.clone()),
        Value::Text(text) => WireValue::Text(text.clone()),
        Value::Structured(json) => WireValue::Json(
            serde_json::to_string(json).map_err(|e| DescriptorError::Encode(e.to_string()))?,
        ),
    };
    let record = WireDescriptor {
        label: descriptor.label.clone(),
        selector: descriptor.selector.clone(),
        value,
        domain: descriptor.domain.clone(),
        agent: descriptor.agent.clone(),
        precursors: descriptor.precursors.clone(),
        version: descriptor.version,
        processing_time: descriptor.processing_time,
    };

    let body = bincode::serialize(&record).map_err(|e| DescriptorError::Encode(e.to_string()))?;
    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(WIRE_FORMAT_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a descriptor. Empty input decodes to `None`.
pub fn decode(bytes: &[u8]) -> Result<Option<Descriptor>, DescriptorError> {
    let Some((&tag, body)) = bytes.split_first() else {
        return Ok(None);
    };
    if tag != WIRE_FORMAT_VERSION {
        return Err(DescriptorError::Decode(format!(
            "unsupported wire format {} (expected {})",
            tag, WIRE_FORMAT_VERSION
        )));
    }

    let record: WireDescriptor =
        bincode::deserialize(body).map_err(|e| DescriptorError::Decode(e.to_string()))?;
    let value = match record.value {
        WireValue::Bytes(bytes) => Value::Bytes(bytes),
        WireValue::Text(text) => Value::Text(text),
        WireValue::Json(text) => Value::Structured(
            serde_json::from_str(&text).map_err(|e| DescriptorError::Decode(e.to_string()))?,
        ),
    };

    let mut builder = Descriptor::builder(record.label, record.selector, value)
        .domain(record.domain)
        .precursors(record.precursors)
        .version(record.version)
        .processing_time(record.processing_time);
    if let Some(agent) = record.agent {
        builder = builder.agent(agent);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| DescriptorError::Decode(e.to_string()))
}
