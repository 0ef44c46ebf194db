use parking_lot::Mutex;
use rebus::agent::{Agent, AgentContext};
use rebus::config::{RebusConfig, StorageConfig};
use rebus::storage::RamStorage;
use rebus::{Bus, Descriptor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Minimal ELF header followed by filler, enough for magic sniffing
pub const ELF_BYTES: &[u8] = b"\x7fELF\x02\x01\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00binary-body";

pub fn ram_bus() -> Arc<Bus> {
    Arc::new(Bus::new(Arc::new(RamStorage::new())))
}

pub fn disk_bus(path: &Path) -> Arc<Bus> {
    let config = RebusConfig {
        storage: StorageConfig {
            backend: "diskstorage".to_string(),
            path: Some(path.to_path_buf()),
        },
        ..RebusConfig::default()
    };
    Arc::new(Bus::from_config(&config).unwrap())
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

pub fn root(label: &str, selector: &str, value: &[u8]) -> Descriptor {
    Descriptor::builder(label, selector, value)
        .agent("inject")
        .build()
        .unwrap()
}

/// Accepts everything and records what it saw
#[derive(Default)]
pub struct Recorder {
    pub received_selectors: Mutex<Vec<String>>,
    pub processed: Mutex<Vec<(Descriptor, String)>>,
}

impl Agent for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn selector_filter(&self, selector: &str) -> bool {
        self.received_selectors.lock().push(selector.to_string());
        true
    }

    fn process(
        &self,
        _ctx: &AgentContext,
        descriptor: &Descriptor,
        publisher_id: &str,
    ) -> anyhow::Result<()> {
        self.processed
            .lock()
            .push((descriptor.clone(), publisher_id.to_string()));
        Ok(())
    }
}
