//! Agent Runtime
//!
//! Agents are the units of analysis on the bus. An agent subscribes to new
//! descriptors through [`attach`], filters them by selector, fetches the ones
//! it wants and publishes derived descriptors back. Agents with work of their
//! own (injecting files, polling) do it in [`Agent::run`], which the bus runs
//! on a dedicated thread.

pub mod inject;
pub mod registry;

pub use inject::InjectAgent;
pub use registry::AgentRegistry;

use crate::bus::{Bus, Callback};
use crate::descriptor::Descriptor;
use crate::error::BusError;
use crate::types::AgentId;
use std::sync::Arc;
use tracing::trace;

/// Agent SPI
pub trait Agent: Send + Sync {
    /// Agent name; ids are allocated as `<name>-<n>`
    fn name(&self) -> &str;

    /// Whether a new descriptor with this selector should be processed
    fn selector_filter(&self, _selector: &str) -> bool {
        true
    }

    /// Handle a new descriptor published by `publisher_id`
    fn process(
        &self,
        _ctx: &AgentContext,
        _descriptor: &Descriptor,
        _publisher_id: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Entry point run by [`Bus::run_agent`]
    fn run(&self, _ctx: &AgentContext, _args: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Identity and bus handle passed to agent methods
#[derive(Clone)]
pub struct AgentContext {
    pub bus: Arc<Bus>,
    pub agent_id: AgentId,
    pub domain: String,
}

impl AgentContext {
    /// Publish as this agent
    pub fn publish(&self, descriptor: &Descriptor) -> Result<bool, BusError> {
        self.bus.publish(&self.agent_id, descriptor)
    }

    /// Fetch a descriptor from this agent's domain
    pub fn get(&self, selector: &str) -> Result<Descriptor, BusError> {
        self.bus.get(&self.agent_id, &self.domain, selector)
    }

    pub fn try_claim(&self, purpose: &str, selector: &str) -> bool {
        self.bus
            .try_claim(&self.agent_id, purpose, &self.domain, selector)
    }

    pub fn mark_processed(&self, selector: &str, config_text: &str) -> Result<(), BusError> {
        self.bus
            .mark_processed(&self.domain, selector, &self.agent_id, config_text)
    }

    pub fn store_internal_state(&self, state: &[u8]) -> Result<(), BusError> {
        self.bus.store_internal_state(&self.agent_id, state)
    }

    pub fn load_internal_state(&self) -> Result<Vec<u8>, BusError> {
        self.bus.load_internal_state(&self.agent_id)
    }
}

/// Join `agent` to the bus as a subscriber of `domain`.
///
/// The callback ignores other domains and selectors rejected by
/// [`Agent::selector_filter`], fetches the descriptor and hands it to
/// [`Agent::process`]. It only holds a weak reference to the bus.
pub fn attach(bus: &Arc<Bus>, agent: Arc<dyn Agent>, domain: &str) -> AgentContext {
    let weak_bus = Arc::downgrade(bus);
    let subscribed_domain = domain.to_string();
    let subscriber = Arc::clone(&agent);

    let agent_id = bus.join_with(agent.name(), domain, move |agent_id| {
        let agent_id = agent_id.to_string();
        let callback: Callback = Arc::new(
            move |publisher_id: &str, desc_domain: &str, selector: &str| -> anyhow::Result<()> {
                if desc_domain != subscribed_domain || !subscriber.selector_filter(selector) {
                    return Ok(());
                }
                let Some(bus) = weak_bus.upgrade() else {
                    return Ok(());
                };
                let ctx = AgentContext {
                    bus,
                    agent_id: agent_id.clone(),
                    domain: subscribed_domain.clone(),
                };
                let descriptor = ctx.get(selector)?;
                trace!(agent_id = %ctx.agent_id, selector, "Processing descriptor");
                subscriber.process(&ctx, &descriptor, publisher_id)
            },
        );
        callback
    });
    AgentContext {
        bus: Arc::clone(bus),
        agent_id,
        domain: domain.to_string(),
    }
}

/// Attach `agent` and start its entry point on a bus-tracked thread
pub fn launch(
    bus: &Arc<Bus>,
    agent: Arc<dyn Agent>,
    domain: &str,
    args: Vec<String>,
) -> Result<AgentContext, BusError> {
    let ctx = attach(bus, Arc::clone(&agent), domain);
    bus.run_agent(agent, ctx.clone(), args)?;
    Ok(ctx)
}
