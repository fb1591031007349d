#![forbid(unsafe_code)]

//! Integration tests: per-cycle change batching.
//!
//! Set `RUST_LOG=scopebind=trace` to see flush scheduling while debugging.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use scopebind::{BindingDeclarations, BindingMetadata, ChangeRecord, Scope, Value};
use scopebind_harness::{
    HarnessAttributes, HarnessHost, HarnessScope, Journal, Mounted, RecordingComponent,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mount a component named `name` with one one-way input `value` bound to
/// the root property `source`.
fn mount_follower(host: &HarnessHost, component: RecordingComponent, source: &str) -> Mounted {
    let meta = BindingMetadata::component(
        component.name().to_owned(),
        BindingDeclarations::new().input("value", "<"),
    );
    let attrs = HarnessAttributes::new().with_text("value", source);
    host.mount(component, &meta, attrs, true).unwrap()
}

/// Copy `from` into `to` on every change after the first digest.
fn relay(root: &HarnessScope, from: &'static str, to: &'static str) -> scopebind::host::Disposer {
    let target = root.clone();
    root.watch(
        Box::new(move |scope| Ok(scope.get(from))),
        Some(Box::new(move |new, old| {
            if !new.is_identical(old) {
                target.set(to, new.clone());
            }
            Ok(())
        })),
        false,
    )
}

#[test]
fn changes_of_one_cycle_arrive_in_one_call() {
    init_tracing();
    let host = HarnessHost::new();
    host.root.set("a", Value::from(1));
    host.root.set("b", Value::from(2));
    let meta = BindingMetadata::component(
        "pair",
        BindingDeclarations::new().input("left", "<a").input("right", "<b"),
    );
    let attrs = HarnessAttributes::new().with_text("a", "a").with_text("b", "b");
    let mounted = host
        .mount(RecordingComponent::new("pair"), &meta, attrs, true)
        .unwrap();
    host.digest();

    host.apply(|root| {
        root.set("a", Value::from(10));
        root.set("b", Value::from(20));
    });

    let component = mounted.component.borrow();
    assert_eq!(component.notifications().len(), 1);
    let changes = &component.notifications()[0];
    assert_eq!(changes.keys().collect::<Vec<_>>(), ["left", "right"]);
    assert_eq!(changes["left"], ChangeRecord::new(Value::from(1), Value::from(10)));
    assert_eq!(changes["right"], ChangeRecord::new(Value::from(2), Value::from(20)));
    assert_eq!(host.cycle.flush_count(), 1);
}

#[test]
fn repeated_changes_collapse_to_first_and_last() {
    let host = HarnessHost::new();
    host.root.set("n", Value::from(1));
    let mounted = mount_follower(&host, RecordingComponent::new("counter"), "n");
    host.digest();

    // n: 1 -> 2 -> 3 within a single digest.
    let target = host.root.clone();
    let _bump = host.root.watch(
        Box::new(|scope| Ok(scope.get("n"))),
        Some(Box::new(move |new, _| {
            if new.is_identical(&Value::from(2)) {
                target.set("n", Value::from(3));
            }
            Ok(())
        })),
        false,
    );
    host.apply(|root| root.set("n", Value::from(2)));

    let component = mounted.component.borrow();
    assert_eq!(component.field("value"), Value::from(3));
    assert_eq!(component.notifications().len(), 1);
    assert_eq!(
        component.notifications()[0]["value"],
        ChangeRecord::new(Value::from(1), Value::from(3))
    );
}

#[test]
fn components_are_notified_in_order_of_first_change() {
    let host = HarnessHost::new();
    host.root.set("a", Value::from(0));
    host.root.set("b", Value::from(0));
    let journal: Journal = Rc::default();
    let first = mount_follower(&host, RecordingComponent::new("first").with_journal(&journal), "a");
    let second = mount_follower(&host, RecordingComponent::new("second").with_journal(&journal), "b");
    let _relay = relay(&host.root, "b", "a");
    host.digest();

    // `second` changes in the first pass, `first` only after the relay.
    host.apply(|root| root.set("b", Value::from(1)));

    assert_eq!(*journal.borrow(), ["second", "first"]);
    assert_eq!(first.component.borrow().notifications().len(), 1);
    assert_eq!(second.component.borrow().notifications().len(), 1);
    assert_eq!(host.cycle.flush_count(), 1);
}

#[test]
fn every_cycle_gets_its_own_flush() {
    let host = HarnessHost::new();
    host.root.set("n", Value::from(0));
    let mounted = mount_follower(&host, RecordingComponent::new("counter"), "n");
    host.digest();

    host.apply(|root| root.set("n", Value::from(1)));
    assert!(!host.cycle.is_scheduled());
    host.apply(|root| root.set("n", Value::from(2)));

    let component = mounted.component.borrow();
    assert_eq!(component.notifications().len(), 2);
    assert_eq!(
        component.notifications()[1]["value"],
        ChangeRecord::new(Value::from(1), Value::from(2))
    );
    assert_eq!(host.cycle.flush_count(), 2);
}

#[test]
fn components_without_hook_cost_nothing() {
    let host = HarnessHost::new();
    host.root.set("n", Value::from(0));
    let mounted = mount_follower(&host, RecordingComponent::without_hook("silent"), "n");
    host.digest();

    host.apply(|root| root.set("n", Value::from(5)));

    assert_eq!(mounted.component.borrow().field("value"), Value::from(5));
    assert!(mounted.component.borrow().notifications().is_empty());
    assert_eq!(host.cycle.flush_count(), 0);
}

#[test]
fn identical_value_records_nothing() {
    let host = HarnessHost::new();
    host.root.set("n", Value::from(0));
    let mounted = mount_follower(&host, RecordingComponent::new("counter"), "n");
    host.digest();

    host.apply(|root| root.set("n", Value::from(1)));
    let flushes = host.cycle.flush_count();
    host.apply(|root| root.set("n", Value::from(1)));

    // Identical value: nothing recorded, nothing flushed.
    assert_eq!(host.cycle.flush_count(), flushes);
    assert_eq!(mounted.component.borrow().notifications().len(), 1);
}

proptest! {
    #[test]
    fn one_notification_per_cycle_with_a_distinct_value(values in prop::collection::vec(0i32..3, 1..12)) {
        let host = HarnessHost::new();
        host.root.set("n", Value::from(0));
        let mounted = mount_follower(&host, RecordingComponent::new("counter"), "n");
        host.digest();

        let mut expected = Vec::new();
        let mut previous = 0;
        for value in values {
            host.apply(|root| root.set("n", Value::from(value)));
            if value != previous {
                expected.push(ChangeRecord::new(Value::from(previous), Value::from(value)));
                previous = value;
            }
        }

        let component = mounted.component.borrow();
        let delivered: Vec<ChangeRecord> = component
            .notifications()
            .iter()
            .map(|changes| changes["value"].clone())
            .collect();
        prop_assert_eq!(delivered, expected);
    }
}

#[test]
fn shared_cycle_context_survives_component_churn() {
    let host = HarnessHost::new();
    host.root.set("n", Value::from(0));
    let log = Rc::new(RefCell::new(Vec::new()));
    for round in 0..3 {
        let mounted = mount_follower(&host, RecordingComponent::new("churn"), "n");
        host.digest();
        host.apply(|root| root.set("n", Value::from(round + 1)));
        log.borrow_mut()
            .push(mounted.component.borrow().notifications().len());
    }
    assert_eq!(*log.borrow(), [1, 1, 1]);
    assert_eq!(host.root.watcher_count(), 0);
}
