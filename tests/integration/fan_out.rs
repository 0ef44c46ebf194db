use parking_lot::Mutex;
use rebus::bus::Callback;
use rebus::types::DEFAULT_DOMAIN;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::support::{ram_bus, root};

fn callback<F>(f: F) -> Option<Callback>
where
    F: Fn(&str, &str, &str) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Some(Arc::new(f))
}

#[test]
fn subscribers_are_notified_once_per_new_descriptor() {
    let bus = ram_bus();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    bus.join(
        "counter",
        DEFAULT_DOMAIN,
        callback(move |_, _, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    let d = root("ls", "/binary/elf", b"\x7fELF-one");
    assert!(bus.publish("inject-0", &d).unwrap());
    assert!(!bus.publish("inject-0", &d).unwrap());
    assert!(!bus.publish("other-5", &d.clone()).unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn callbacks_run_in_join_order_with_publish_arguments() {
    let bus = ram_bus();
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let log = Arc::clone(&log);
        bus.join(
            name,
            DEFAULT_DOMAIN,
            callback(move |publisher, domain, selector| {
                log.lock()
                    .push(format!("{} {} {}:{}", name, publisher, domain, selector));
                Ok(())
            }),
        );
    }

    let d = root("ls", "/binary/elf", b"\x7fELF-order");
    bus.publish("inject-9", &d).unwrap();
    let expected: Vec<String> = ["first", "second", "third"]
        .iter()
        .map(|n| format!("{} inject-9 default:{}", n, d.selector()))
        .collect();
    assert_eq!(*log.lock(), expected);
}

#[test]
fn failing_subscriber_keeps_receiving_and_others_are_unaffected() {
    let bus = ram_bus();
    let failing_calls = Arc::new(AtomicUsize::new(0));
    let healthy_calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&failing_calls);
    bus.join(
        "failing",
        DEFAULT_DOMAIN,
        callback(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("cannot handle descriptor")
        }),
    );
    bus.join(
        "panicking",
        DEFAULT_DOMAIN,
        callback(|_, _, selector| panic!("exploded on {}", selector)),
    );
    let counter = Arc::clone(&healthy_calls);
    bus.join(
        "healthy",
        DEFAULT_DOMAIN,
        callback(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );

    for value in [&b"one"[..], b"two", b"three"] {
        assert!(bus
            .publish("inject-0", &root("f", "/binary/unknown", value))
            .unwrap());
    }
    assert_eq!(failing_calls.load(Ordering::SeqCst), 3);
    assert_eq!(healthy_calls.load(Ordering::SeqCst), 3);
}

#[test]
fn callbacks_may_publish_from_inside_fan_out() {
    let bus = ram_bus();
    let weak = Arc::downgrade(&bus);
    bus.join(
        "sizer",
        DEFAULT_DOMAIN,
        callback(move |_, domain, selector| {
            if !selector.starts_with("/binary/") {
                return Ok(());
            }
            let Some(bus) = weak.upgrade() else {
                return Ok(());
            };
            let parent = bus.get("sizer-0", domain, selector)?;
            let child = parent.spawn(
                "/size",
                parent.value().len().to_string(),
                "sizer",
                None,
                None,
            )?;
            bus.publish("sizer-0", &child)?;
            Ok(())
        }),
    );

    let parent = root("ls", "/binary/elf", b"\x7fELF");
    bus.publish("inject-1", &parent).unwrap();
    let sizes = bus.find_by_selector("t", DEFAULT_DOMAIN, "/size").unwrap();
    assert_eq!(sizes.len(), 1);
    assert_eq!(sizes[0].precursors(), &[parent.selector().to_string()]);
}
