use rebus::types::DEFAULT_DOMAIN;
use rebus::Descriptor;
use std::collections::HashSet;

use crate::support::{ram_bus, root};

fn selectors(descriptors: &[Descriptor]) -> Vec<&str> {
    descriptors.iter().map(Descriptor::selector).collect()
}

#[test]
fn get_children_direct_and_transitive_without_duplicates() {
    let bus = ram_bus();
    let bin = root("ls", "/binary/elf", b"\x7fELF-lineage");
    let strings = bin.spawn("/strings", "main\nprintf", "strings", None, None).unwrap();
    let sections = bin.spawn("/sections", ".text .data", "sections", None, None).unwrap();
    let symbols = strings.spawn("/symbols", "main", "symbols", None, None).unwrap();
    // Reachable from the root through both intermediate nodes
    let report = Descriptor::builder("ls", "/report", "summary")
        .agent("report")
        .precursors(vec![
            strings.selector().to_string(),
            sections.selector().to_string(),
        ])
        .build()
        .unwrap();
    for d in [&bin, &strings, &sections, &symbols, &report] {
        assert!(bus.publish("test-0", d).unwrap());
    }

    let direct = bus
        .get_children("t", DEFAULT_DOMAIN, bin.selector(), false)
        .unwrap();
    assert_eq!(selectors(&direct), vec![strings.selector(), sections.selector()]);

    let all = bus
        .get_children("t", DEFAULT_DOMAIN, bin.selector(), true)
        .unwrap();
    assert_eq!(all.len(), 4);
    let unique: HashSet<&str> = selectors(&all).into_iter().collect();
    let expected: HashSet<&str> = [
        strings.selector(),
        sections.selector(),
        symbols.selector(),
        report.selector(),
    ]
    .into_iter()
    .collect();
    assert_eq!(unique, expected);

    let leaves = bus
        .get_children("t", DEFAULT_DOMAIN, symbols.selector(), true)
        .unwrap();
    assert!(leaves.is_empty());

    let err = bus
        .get_children("t", DEFAULT_DOMAIN, "/binary/elf/%deadbeef", false)
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn version_chain_shares_uuid_and_resolves_queries() {
    let bus = ram_bus();
    let first = root("a", "/binary/elf", b"\x7fELF-a");
    let second = root("b", "/binary/elf", b"\x7fELF-b");
    bus.publish("inject-0", &first).unwrap();
    bus.publish("inject-0", &second).unwrap();

    let v0 = Descriptor::builder("matrix", "/matrix", "a")
        .agent("dismat")
        .precursors(vec![first.selector().to_string()])
        .build()
        .unwrap();
    let v1 = v0.new_version("matrix", "a,b", second.selector(), None).unwrap();
    assert_eq!(v1.version(), 1);
    assert_eq!(
        v1.precursors(),
        &[second.selector().to_string(), first.selector().to_string()]
    );
    assert_eq!(v1.base_path(), v0.base_path());
    bus.publish("dismat-1", &v0).unwrap();
    bus.publish("dismat-1", &v1).unwrap();

    let latest = bus.get("t", DEFAULT_DOMAIN, "/matrix~-1").unwrap();
    assert_eq!(latest.selector(), v1.selector());
    let original = bus.get("t", DEFAULT_DOMAIN, "/matrix~0").unwrap();
    assert_eq!(original.selector(), v0.selector());
    assert!(bus.get("t", DEFAULT_DOMAIN, "/matrix~5").unwrap_err().is_not_found());

    assert_eq!(latest.uuid(), original.uuid());
    let chain = bus
        .find_by_uuid("t", DEFAULT_DOMAIN, latest.uuid().unwrap())
        .unwrap();
    assert_eq!(selectors(&chain), vec![v0.selector(), v1.selector()]);

    // Both binaries list the matrix among their children
    let children = bus
        .get_children("t", DEFAULT_DOMAIN, second.selector(), false)
        .unwrap();
    assert_eq!(selectors(&children), vec![v1.selector()]);
}

#[test]
fn find_limits_and_anchors_selectors() {
    let bus = ram_bus();
    for i in 0..5u8 {
        bus.publish("inject-0", &root("f", "/binary/elf", &[0x7f, b'E', b'L', b'F', i]))
            .unwrap();
    }
    bus.publish("inject-0", &root("f", "/text/elf", b"not a binary"))
        .unwrap();

    assert_eq!(bus.find("t", DEFAULT_DOMAIN, "/binary/elf", 3).unwrap().len(), 3);
    assert_eq!(bus.find("t", DEFAULT_DOMAIN, "/binary/elf", 0).unwrap().len(), 5);
    assert!(bus.find("t", DEFAULT_DOMAIN, "elf", 0).unwrap().is_empty());
    assert_eq!(bus.find("t", DEFAULT_DOMAIN, ".*/elf", 0).unwrap().len(), 6);
    assert!(bus.find("t", DEFAULT_DOMAIN, "[", 0).is_err());
}
