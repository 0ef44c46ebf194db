//! Inject agent
//!
//! Reads files named on its argument list and publishes each as a root
//! descriptor, typed by file magic.

use super::{Agent, AgentContext};
use crate::descriptor::Descriptor;
use anyhow::Context;
use std::path::Path;
use tracing::info;

/// Registry name of the inject agent
pub const INJECT: &str = "inject";

const ELF_MAGIC: &[u8] = b"\x7fELF";
const PE_MAGIC: &[u8] = b"MZ";

/// Selector for a file's contents, chosen by magic bytes
pub fn sniff_selector(data: &[u8]) -> &'static str {
    if data.starts_with(ELF_MAGIC) {
        "/binary/elf"
    } else if data.starts_with(PE_MAGIC) {
        "/binary/pe"
    } else {
        "/binary/unknown"
    }
}

/// Publishes files as root descriptors
#[derive(Debug, Default, Clone, Copy)]
pub struct InjectAgent;

impl InjectAgent {
    /// Build the root descriptor for one file
    pub fn descriptor_for(&self, path: &Path, domain: &str) -> anyhow::Result<Descriptor> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let selector = sniff_selector(&data);
        Ok(Descriptor::builder(label, selector, data)
            .domain(domain)
            .agent(INJECT)
            .build()?)
    }
}

impl Agent for InjectAgent {
    fn name(&self) -> &str {
        INJECT
    }

    // Inject only produces
    fn selector_filter(&self, _selector: &str) -> bool {
        false
    }

    fn run(&self, ctx: &AgentContext, args: &[String]) -> anyhow::Result<()> {
        for arg in args {
            let descriptor = self.descriptor_for(Path::new(arg), &ctx.domain)?;
            let new = ctx.publish(&descriptor)?;
            info!(
                agent_id = %ctx.agent_id,
                path = %arg,
                selector = descriptor.selector(),
                new,
                "Injected file"
            );
        }
        Ok(())
    }
}
