use rebus::types::DEFAULT_DOMAIN;
use rebus::{attach, AgentRegistry, Bus, DrainSummary};
use std::sync::Arc;
use tempfile::TempDir;

use crate::support::{disk_bus, ram_bus, write_file, Recorder, ELF_BYTES};

/// Inject a file, then check it through every query path and through the
/// subscriber that watched it arrive.
fn check_inject(bus: Arc<Bus>, input_dir: &TempDir) {
    let path = write_file(input_dir.path(), "ls", ELF_BYTES);
    let recorder = Arc::new(Recorder::default());
    let test_ctx = attach(&bus, recorder.clone(), DEFAULT_DOMAIN);
    let tester = test_ctx.agent_id.as_str();

    AgentRegistry::with_builtin()
        .launch(
            &bus,
            "inject",
            DEFAULT_DOMAIN,
            vec![path.to_string_lossy().into_owned()],
        )
        .unwrap();
    assert_eq!(
        bus.drain(),
        DrainSummary {
            completed: 1,
            failed: 0
        }
    );

    let selectors = bus.find(tester, DEFAULT_DOMAIN, "/binary/elf", 10).unwrap();
    assert_eq!(selectors.len(), 1);

    let descriptor = bus.get(tester, DEFAULT_DOMAIN, &selectors[0]).unwrap();
    assert_eq!(descriptor.value().as_bytes(), Some(ELF_BYTES));
    assert_eq!(descriptor.domain(), "default");
    assert_eq!(descriptor.agent(), Some("inject"));
    assert_eq!(descriptor.label(), "ls");
    assert!(descriptor.precursors().is_empty());
    assert!(descriptor.selector().starts_with("/binary/elf/%"));
    assert_eq!(descriptor.version(), 0);
    let uuid = descriptor.uuid().unwrap();
    assert!(uuid::Uuid::parse_str(uuid).is_ok());

    let base = selectors[0].split('%').next().unwrap();
    let latest = bus
        .get(tester, DEFAULT_DOMAIN, &format!("{}~-1", base))
        .unwrap();
    assert_eq!(latest, descriptor);

    let by_value = bus
        .find_by_value(tester, DEFAULT_DOMAIN, "/binary", "\x7fELF")
        .unwrap();
    assert_eq!(by_value[0].value(), descriptor.value());

    let uuids = bus.list_uuids("testid", DEFAULT_DOMAIN).unwrap();
    assert!(uuids.iter().any(|u| u == uuid));

    let by_uuid = bus.find_by_uuid(tester, DEFAULT_DOMAIN, uuid).unwrap();
    assert_eq!(by_uuid[0], descriptor);

    let by_selector = bus
        .find_by_selector(tester, DEFAULT_DOMAIN, "/binary")
        .unwrap();
    assert_eq!(by_selector.len(), 1);
    assert_eq!(by_selector[0].value(), descriptor.value());

    assert_eq!(*recorder.received_selectors.lock(), selectors);
    let processed = recorder.processed.lock();
    assert_eq!(processed.len(), 1);
    assert_eq!(processed[0].0, descriptor);
    assert_eq!(processed[0].1, "inject-1");

    let agents = bus.list_agents(tester);
    assert_eq!(agents.get("recorder"), Some(&1));
    assert_eq!(agents.get("inject"), Some(&1));
}

#[test]
fn inject_on_ram_storage() {
    let input_dir = TempDir::new().unwrap();
    check_inject(ram_bus(), &input_dir);
}

#[test]
fn inject_on_disk_storage() {
    let input_dir = TempDir::new().unwrap();
    let store_dir = TempDir::new().unwrap();
    check_inject(disk_bus(&store_dir.path().join("store")), &input_dir);
}

#[test]
fn inject_types_files_by_magic() {
    let input_dir = TempDir::new().unwrap();
    let pe = write_file(input_dir.path(), "setup.exe", b"MZ\x90\x00\x03");
    let script = write_file(input_dir.path(), "run.sh", b"#!/bin/sh\necho hi\n");
    let bus = ram_bus();

    AgentRegistry::with_builtin()
        .launch(
            &bus,
            "inject",
            DEFAULT_DOMAIN,
            vec![
                pe.to_string_lossy().into_owned(),
                script.to_string_lossy().into_owned(),
            ],
        )
        .unwrap();
    assert_eq!(bus.drain().completed, 1);

    assert_eq!(bus.find("t", DEFAULT_DOMAIN, "/binary/pe", 0).unwrap().len(), 1);
    let unknown = bus
        .find_by_selector("t", DEFAULT_DOMAIN, "/binary/unknown")
        .unwrap();
    assert_eq!(unknown.len(), 1);
    assert_eq!(unknown[0].label(), "run.sh");

    // Search by the injected file's leading bytes, 0x90 included
    let magic = rebus::storage::byte_pattern(b"MZ\x90\x00");
    let by_magic = bus
        .find_by_value("t", DEFAULT_DOMAIN, "/binary", &magic)
        .unwrap();
    assert_eq!(by_magic.len(), 1);
    assert_eq!(by_magic[0].label(), "setup.exe");
}

#[test]
fn inject_of_missing_file_counts_as_failed() {
    let input_dir = TempDir::new().unwrap();
    let bus = ram_bus();
    AgentRegistry::with_builtin()
        .launch(
            &bus,
            "inject",
            DEFAULT_DOMAIN,
            vec![input_dir.path().join("absent").to_string_lossy().into_owned()],
        )
        .unwrap();
    assert_eq!(
        bus.drain(),
        DrainSummary {
            completed: 0,
            failed: 1
        }
    );
}
