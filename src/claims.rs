//! Processing claims
//!
//! At-most-once gate for racing agents. A claim on (purpose, domain, selector)
//! is granted to exactly one caller and is never released for the lifetime of
//! the registry.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Per-domain set of claimed (purpose, selector) keys
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    /// Map from domain to claimed (purpose, selector) pairs.
    /// A single mutex makes test-and-insert atomic across domains.
    claims: Mutex<HashMap<String, HashSet<(String, String)>>>,
}

impl ClaimRegistry {
    /// Create an empty claim registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim (purpose, domain, selector).
    ///
    /// Returns true for the first caller only; every later caller, concurrent
    /// or not, gets false and must not redo the work.
    pub fn try_claim(&self, purpose: &str, domain: &str, selector: &str) -> bool {
        let mut claims = self.claims.lock();
        let granted = claims
            .entry(domain.to_string())
            .or_default()
            .insert((purpose.to_string(), selector.to_string()));
        debug!(purpose, domain, selector, granted, "Claim attempt");
        granted
    }

    /// Whether (purpose, domain, selector) has been claimed
    pub fn is_claimed(&self, purpose: &str, domain: &str, selector: &str) -> bool {
        self.claims
            .lock()
            .get(domain)
            .map(|set| set.contains(&(purpose.to_string(), selector.to_string())))
            .unwrap_or(false)
    }

    /// Number of claims held in a domain
    pub fn claimed_count(&self, domain: &str) -> usize {
        self.claims.lock().get(domain).map(HashSet::len).unwrap_or(0)
    }
}
