//! Descriptor Bus
//!
//! In-process message bus. Agents join to obtain an id, publish descriptors
//! through [`Bus::publish`] and, when they joined with a callback, are told
//! about every new descriptor. The bus owns the storage backend and the claim
//! registry and tracks agent threads until [`Bus::drain`].
//!
//! Shared state is guarded by `parking_lot` locks. Fan-out iterates over a
//! snapshot of the subscriber list, so callbacks may re-enter the bus.

use crate::agent::{Agent, AgentContext};
use crate::claims::ClaimRegistry;
use crate::config::RebusConfig;
use crate::descriptor::{Descriptor, Value};
use crate::error::BusError;
use crate::storage::{ProcessedStats, StorageBackend, StorageRegistry};
use crate::types::{agent_name, AgentId};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Subscriber callback: `(publisher_id, domain, selector)`
pub type Callback = Arc<dyn Fn(&str, &str, &str) -> anyhow::Result<()> + Send + Sync>;

/// One joined agent
#[derive(Clone)]
pub struct AgentRegistration {
    pub agent_id: AgentId,
    pub domain: String,
    pub callback: Option<Callback>,
}

impl std::fmt::Debug for AgentRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistration")
            .field("agent_id", &self.agent_id)
            .field("domain", &self.domain)
            .field("subscribed", &self.callback.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Registrations {
    next_id: u64,
    agents: Vec<AgentRegistration>,
}

/// Outcome of [`Bus::drain`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Agent threads that returned `Ok`
    pub completed: usize,
    /// Agent threads that returned an error or panicked
    pub failed: usize,
}

/// In-process descriptor bus
pub struct Bus {
    storage: Arc<dyn StorageBackend>,
    claims: ClaimRegistry,
    registrations: Mutex<Registrations>,
    subscribers: RwLock<Vec<(AgentId, Callback)>>,
    threads: Mutex<Vec<(AgentId, JoinHandle<anyhow::Result<()>>)>>,
    default_domain: String,
}

impl Bus {
    /// Create a bus over an existing storage backend
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_default_domain(storage, crate::types::DEFAULT_DOMAIN)
    }

    fn with_default_domain(storage: Arc<dyn StorageBackend>, default_domain: &str) -> Self {
        info!(storage = storage.name(), "Bus created");
        Self {
            storage,
            claims: ClaimRegistry::new(),
            registrations: Mutex::new(Registrations::default()),
            subscribers: RwLock::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
            default_domain: default_domain.to_string(),
        }
    }

    /// Create a bus whose storage backend is chosen by name
    pub fn from_config(config: &RebusConfig) -> Result<Self, BusError> {
        let storage = StorageRegistry::with_builtin().create(&config.storage)?;
        Ok(Self::with_default_domain(storage, &config.default_domain))
    }

    /// Domain used when an agent does not name one
    pub fn default_domain(&self) -> &str {
        &self.default_domain
    }

    /// Storage backend in use
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Register an agent and allocate its id (`<name>-<n>`).
    ///
    /// Callbacks are invoked in join order. Registrations are never removed.
    pub fn join(&self, agent_name: &str, domain: &str, callback: Option<Callback>) -> AgentId {
        self.register(agent_name, domain, callback.map(|cb| move |_: &str| cb))
    }

    /// Register an agent whose callback needs its own id.
    ///
    /// `make_callback` receives the allocated id and runs under the
    /// registration lock, before the subscriber becomes visible to
    /// [`Bus::publish`]. It must not call back into `join`.
    pub fn join_with<F>(&self, agent_name: &str, domain: &str, make_callback: F) -> AgentId
    where
        F: FnOnce(&str) -> Callback,
    {
        self.register(agent_name, domain, Some(make_callback))
    }

    fn register<F>(&self, agent_name: &str, domain: &str, make_callback: Option<F>) -> AgentId
    where
        F: FnOnce(&str) -> Callback,
    {
        let mut registrations = self.registrations.lock();
        let agent_id = format!("{}-{}", agent_name, registrations.next_id);
        registrations.next_id += 1;
        let callback = make_callback.map(|make| make(agent_id.as_str()));
        if let Some(callback) = &callback {
            // Still under the registration lock, so subscriber order follows id order
            self.subscribers
                .write()
                .push((agent_id.clone(), Arc::clone(callback)));
        }
        registrations.agents.push(AgentRegistration {
            agent_id: agent_id.clone(),
            domain: domain.to_string(),
            callback,
        });
        info!(agent_id = %agent_id, domain, "JOIN");
        agent_id
    }

    /// Store a descriptor and, when it is new, notify every subscriber.
    ///
    /// Returns whether the descriptor was new. Subscriber failures and
    /// panics are logged and never reach the publisher.
    pub fn publish(&self, publisher_id: &str, descriptor: &Descriptor) -> Result<bool, BusError> {
        let domain = descriptor.domain();
        let selector = descriptor.selector();
        if !self.storage.add(descriptor)? {
            debug!(publisher_id, domain, selector, "PUSH: already seen");
            return Ok(false);
        }
        info!(publisher_id, domain, selector, "PUSH");

        let subscribers = self.subscribers.read().clone();
        for (agent_id, callback) in subscribers {
            debug!(agent_id = %agent_id, "Calling callback");
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| callback(publisher_id, domain, selector)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(agent_id = %agent_id, selector, error = %e, "Callback failed");
                }
                Err(payload) => {
                    error!(
                        agent_id = %agent_id,
                        selector,
                        panic = panic_message(payload.as_ref()),
                        "Callback panicked"
                    );
                }
            }
        }
        Ok(true)
    }

    pub fn get(&self, requester: &str, domain: &str, selector: &str) -> Result<Descriptor, BusError> {
        info!(requester, domain, selector, "GET");
        Ok(self.storage.get_descriptor(domain, selector)?)
    }

    pub fn get_value(&self, requester: &str, domain: &str, selector: &str) -> Result<Value, BusError> {
        info!(requester, domain, selector, "GET_VALUE");
        Ok(self.storage.get_value(domain, selector)?)
    }

    pub fn list_uuids(&self, requester: &str, domain: &str) -> Result<Vec<String>, BusError> {
        debug!(requester, domain, "LIST_UUIDS");
        Ok(self.storage.list_uuids(domain)?)
    }

    /// Selectors matching `selector_regex`; `limit == 0` means no limit
    pub fn find(
        &self,
        requester: &str,
        domain: &str,
        selector_regex: &str,
        limit: usize,
    ) -> Result<Vec<String>, BusError> {
        debug!(requester, domain, selector_regex, limit, "FIND");
        Ok(self.storage.find(domain, selector_regex, limit)?)
    }

    pub fn find_by_uuid(
        &self,
        requester: &str,
        domain: &str,
        uuid: &str,
    ) -> Result<Vec<Descriptor>, BusError> {
        debug!(requester, domain, uuid, "FIND_BY_UUID");
        Ok(self.storage.find_by_uuid(domain, uuid)?)
    }

    pub fn find_by_selector(
        &self,
        requester: &str,
        domain: &str,
        prefix: &str,
    ) -> Result<Vec<Descriptor>, BusError> {
        debug!(requester, domain, prefix, "FIND_BY_SELECTOR");
        Ok(self.storage.find_by_selector(domain, prefix)?)
    }

    pub fn find_by_value(
        &self,
        requester: &str,
        domain: &str,
        prefix: &str,
        value_pattern: &str,
    ) -> Result<Vec<Descriptor>, BusError> {
        debug!(requester, domain, prefix, "FIND_BY_VALUE");
        Ok(self.storage.find_by_value(domain, prefix, value_pattern)?)
    }

    pub fn get_children(
        &self,
        requester: &str,
        domain: &str,
        selector: &str,
        recurse: bool,
    ) -> Result<Vec<Descriptor>, BusError> {
        info!(requester, domain, selector, recurse, "GET_CHILDREN");
        Ok(self.storage.get_children(domain, selector, recurse)?)
    }

    pub fn mark_processed(
        &self,
        domain: &str,
        selector: &str,
        agent_id: &str,
        config_text: &str,
    ) -> Result<(), BusError> {
        debug!(domain, selector, agent_id, "MARK_PROCESSED");
        Ok(self
            .storage
            .mark_processed(domain, selector, agent_id, config_text)?)
    }

    pub fn processed_stats(&self, requester: &str, domain: &str) -> Result<ProcessedStats, BusError> {
        debug!(requester, domain, "PROCESSED_STATS");
        Ok(self.storage.processed_stats(domain)?)
    }

    /// Number of joined agents per agent name
    pub fn list_agents(&self, requester: &str) -> BTreeMap<String, usize> {
        debug!(requester, "LIST_AGENTS");
        let registrations = self.registrations.lock();
        let mut counts = BTreeMap::new();
        for registration in &registrations.agents {
            *counts
                .entry(agent_name(&registration.agent_id).to_string())
                .or_insert(0) += 1;
        }
        counts
    }

    /// Registration record of a joined agent
    pub fn registration(&self, agent_id: &str) -> Option<AgentRegistration> {
        self.registrations
            .lock()
            .agents
            .iter()
            .find(|r| r.agent_id == agent_id)
            .cloned()
    }

    /// Claim `(purpose, domain, selector)`; true for exactly one caller
    pub fn try_claim(&self, agent_id: &str, purpose: &str, domain: &str, selector: &str) -> bool {
        let won = self.claims.try_claim(purpose, domain, selector);
        info!(agent_id, purpose, domain, selector, won, "LOCK");
        won
    }

    /// Persist an agent's opaque state; a no-op when the backend cannot
    pub fn store_internal_state(&self, agent_id: &str, state: &[u8]) -> Result<(), BusError> {
        debug!(agent_id, bytes = state.len(), "STORE_INTSTATE");
        if self.storage.supports_internal_state() {
            self.storage.store_state(agent_id, state)?;
        }
        Ok(())
    }

    /// Load an agent's opaque state; empty when none or unsupported
    pub fn load_internal_state(&self, agent_id: &str) -> Result<Vec<u8>, BusError> {
        debug!(agent_id, "LOAD_INTSTATE");
        if self.storage.supports_internal_state() {
            return Ok(self.storage.load_state(agent_id)?);
        }
        Ok(Vec::new())
    }

    /// Run an agent's entry point on its own named thread
    pub fn run_agent(
        &self,
        agent: Arc<dyn Agent>,
        ctx: AgentContext,
        args: Vec<String>,
    ) -> Result<(), BusError> {
        let agent_id = ctx.agent_id.clone();
        let handle = thread::Builder::new()
            .name(agent_id.clone())
            .spawn(move || agent.run(&ctx, &args))
            .map_err(|e| BusError::AgentSpawn {
                agent: agent_id.clone(),
                reason: e.to_string(),
            })?;
        debug!(agent_id = %agent_id, "Agent thread started");
        self.threads.lock().push((agent_id, handle));
        Ok(())
    }

    /// Join every agent thread, including ones started while draining
    pub fn drain(&self) -> DrainSummary {
        let mut summary = DrainSummary::default();
        loop {
            let handles = std::mem::take(&mut *self.threads.lock());
            if handles.is_empty() {
                break;
            }
            for (agent_id, handle) in handles {
                match handle.join() {
                    Ok(Ok(())) => summary.completed += 1,
                    Ok(Err(e)) => {
                        warn!(agent_id = %agent_id, error = %e, "Agent run failed");
                        summary.failed += 1;
                    }
                    Err(payload) => {
                        error!(
                            agent_id = %agent_id,
                            panic = panic_message(payload.as_ref()),
                            "Agent thread panicked"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }
        info!(
            completed = summary.completed,
            failed = summary.failed,
            "Bus drained"
        );
        summary
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
