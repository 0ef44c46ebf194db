use rebus::config::ConfigLoader;
use rebus::storage::{DiskStorage, RamStorage, StorageBackend};
use rebus::types::DEFAULT_DOMAIN;
use rebus::Bus;
use std::sync::Arc;
use tempfile::TempDir;

use crate::support::{disk_bus, ram_bus, root};

#[test]
fn internal_state_is_persisted_only_by_disk_storage() {
    let ram = ram_bus();
    ram.store_internal_state("dismat-0", b"matrix-state").unwrap();
    assert!(ram.load_internal_state("dismat-0").unwrap().is_empty());

    let store_dir = TempDir::new().unwrap();
    let disk = disk_bus(&store_dir.path().join("store"));
    assert!(disk.load_internal_state("dismat-0").unwrap().is_empty());
    disk.store_internal_state("dismat-0", b"matrix-state").unwrap();
    assert_eq!(
        disk.load_internal_state("dismat-0").unwrap(),
        b"matrix-state".to_vec()
    );
}

#[test]
fn processed_stats_count_distinct_selectors_per_agent() {
    let bus = ram_bus();
    let a = root("a", "/binary/elf", b"\x7fELF-a");
    let b = root("b", "/binary/elf", b"\x7fELF-b");
    bus.publish("inject-0", &a).unwrap();
    bus.publish("inject-0", &b).unwrap();

    bus.mark_processed(DEFAULT_DOMAIN, a.selector(), "hasher-1", "{}")
        .unwrap();
    bus.mark_processed(DEFAULT_DOMAIN, a.selector(), "hasher-1", "{}")
        .unwrap();
    bus.mark_processed(DEFAULT_DOMAIN, b.selector(), "hasher-2", "{}")
        .unwrap();
    bus.mark_processed(DEFAULT_DOMAIN, a.selector(), "strings-3", "{\"min\": 4}")
        .unwrap();

    let stats = bus.processed_stats("t", DEFAULT_DOMAIN).unwrap();
    assert_eq!(stats.per_agent.get("hasher"), Some(&2));
    assert_eq!(stats.per_agent.get("strings"), Some(&1));
    assert_eq!(stats.total_descriptors, 2);
    assert!(stats.last_processed.is_some());

    let empty = bus.processed_stats("t", "other").unwrap();
    assert!(empty.per_agent.is_empty());
    assert_eq!(empty.total_descriptors, 0);
}

#[test]
fn disk_store_survives_bus_restart() {
    let store_dir = TempDir::new().unwrap();
    let path = store_dir.path().join("store");
    let d = root("ls", "/binary/elf", b"\x7fELF-persisted");
    let child = d.spawn("/strings", "main", "strings", Some(0.25), None).unwrap();

    let uuid = {
        let storage = Arc::new(DiskStorage::open(&path).unwrap());
        let bus = Bus::new(storage.clone());
        bus.publish("inject-0", &d).unwrap();
        bus.publish("strings-1", &child).unwrap();
        bus.store_internal_state("strings-1", b"seen:1").unwrap();
        storage.flush().unwrap();
        bus.get("t", DEFAULT_DOMAIN, d.selector())
            .unwrap()
            .uuid()
            .map(str::to_string)
    };

    let bus = disk_bus(&path);
    assert!(!bus.publish("inject-0", &d).unwrap());
    let restored = bus.get("t", DEFAULT_DOMAIN, "/binary/elf~-1").unwrap();
    assert_eq!(restored.uuid().map(str::to_string), uuid);
    assert_eq!(restored.value(), d.value());
    let children = bus
        .get_children("t", DEFAULT_DOMAIN, d.selector(), false)
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].processing_time(), 0.25);
    assert_eq!(bus.load_internal_state("strings-1").unwrap(), b"seen:1".to_vec());
}

#[test]
fn backends_agree_on_query_results() {
    let store_dir = TempDir::new().unwrap();
    let backends: Vec<Arc<dyn StorageBackend>> = vec![
        Arc::new(RamStorage::new()),
        Arc::new(DiskStorage::open(&store_dir.path().join("store")).unwrap()),
    ];
    let structured = rebus::Value::structured(&serde_json::json!({"arch": "x86_64", "bits": 64}))
        .unwrap();
    let d = root("ls", "/binary/elf", b"\x7fELF-agree");
    let meta = d.spawn("/meta", structured, "meta", None, None).unwrap();

    let mut results = Vec::new();
    for storage in backends {
        assert!(storage.add(&d).unwrap());
        assert!(storage.add(&meta).unwrap());
        assert!(!storage.add(&meta).unwrap());
        results.push((
            storage.find(DEFAULT_DOMAIN, "/", 0).unwrap(),
            storage.list_uuids(DEFAULT_DOMAIN).unwrap(),
            storage.get_descriptor(DEFAULT_DOMAIN, "/meta~-1").unwrap(),
        ));
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(
        results[0].2.value().as_structured(),
        Some(&serde_json::json!({"arch": "x86_64", "bits": 64}))
    );
}

#[test]
fn bus_built_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("rebus.toml");
    let store_path = temp_dir.path().join("store");
    std::fs::write(
        &config_path,
        format!(
            "default_domain = \"malware\"\n\n[storage]\nbackend = \"diskstorage\"\npath = {:?}\n",
            store_path.to_string_lossy()
        ),
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_path).unwrap();
    let bus = Bus::from_config(&config).unwrap();
    assert_eq!(bus.default_domain(), "malware");
    assert_eq!(bus.storage().name(), "diskstorage");
    assert!(store_path.exists());
}
