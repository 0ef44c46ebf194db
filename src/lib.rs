//! REbus: Content-Addressed Descriptor Bus
//!
//! An in-process bus on which analysis agents exchange immutable,
//! content-addressed descriptors. Each descriptor records the descriptors it
//! was derived from, so every result can be traced back to its input.

pub mod agent;
pub mod bus;
pub mod claims;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod logging;
pub mod storage;
pub mod types;

pub use agent::{attach, Agent, AgentContext, AgentRegistry};
pub use bus::{Bus, DrainSummary};
pub use descriptor::{Descriptor, Value};
pub use error::{BusError, ConfigError, DescriptorError, StorageError};
