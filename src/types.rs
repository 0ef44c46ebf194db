//! Core types shared across the bus, storage and agents.

/// Domain used when none is given
pub const DEFAULT_DOMAIN: &str = "default";

/// AgentId: `<agent-name>-<counter>`, unique within one bus
pub type AgentId = String;

/// Agent name portion of an agent id (everything before the last `-`)
pub fn agent_name(agent_id: &str) -> &str {
    agent_id
        .rsplit_once('-')
        .map(|(name, _)| name)
        .unwrap_or(agent_id)
}
