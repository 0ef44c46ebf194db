//! Agent registry
//!
//! Explicit name -> factory table. Hosts build it at startup with
//! [`AgentRegistry::with_builtin`] and register their own agents on top.

use super::inject::{InjectAgent, INJECT};
use super::{launch, Agent, AgentContext};
use crate::bus::Bus;
use crate::error::BusError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Constructor for an agent instance
pub type AgentFactory = Arc<dyn Fn() -> Arc<dyn Agent> + Send + Sync>;

/// Registry of agent factories by name
#[derive(Clone, Default)]
pub struct AgentRegistry {
    factories: BTreeMap<String, AgentFactory>,
}

impl AgentRegistry {
    /// Create an empty agent registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in agents (`inject`)
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(INJECT, || Arc::new(InjectAgent) as Arc<dyn Agent>);
        registry
    }

    /// Register a factory; a later registration under the same name wins
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    /// Check whether an agent name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered agent names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiate an agent by name
    pub fn create(&self, name: &str) -> Result<Arc<dyn Agent>, BusError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| BusError::UnknownAgent(name.to_string()))
    }

    /// Instantiate, attach and run an agent by name
    pub fn launch(
        &self,
        bus: &Arc<Bus>,
        name: &str,
        domain: &str,
        args: Vec<String>,
    ) -> Result<AgentContext, BusError> {
        let agent = self.create(name)?;
        launch(bus, agent, domain, args)
    }
}
