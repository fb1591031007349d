#![forbid(unsafe_code)]

//! Integration tests: one-way and two-way input bindings.

use scopebind::{
    AttrValue, Attributes, BindingDeclarations, BindingError, BindingMetadata, ChangeDetection,
    ChangeRecord, Scope, Value,
};
use scopebind_harness::{HarnessAttributes, HarnessHost, RecordingComponent};

fn metadata(declarations: BindingDeclarations) -> BindingMetadata {
    BindingMetadata::component("probe", declarations)
}

// ============================================================================
// One-way
// ============================================================================

#[test]
fn one_way_assigns_initial_value_and_reports_it() {
    let host = HarnessHost::new();
    host.root.set("pageTitle", Value::from("Hello"));
    let meta = metadata(BindingDeclarations::new().input("heading", "<title"));
    let attrs = HarnessAttributes::new().with_text("title", "pageTitle");

    let mounted = host
        .mount(RecordingComponent::new("probe"), &meta, attrs, true)
        .unwrap();

    assert_eq!(mounted.component.borrow().field("heading"), Value::from("Hello"));
    let initial = &mounted.bindings.initial_changes["heading"];
    assert_eq!(*initial, ChangeRecord::first(Value::from("Hello")));
    assert!(initial.is_first_change());
    assert_eq!(mounted.bindings.watcher_count(), 1);
}

#[test]
fn one_way_first_digest_is_quiet_then_changes_are_reported() {
    let host = HarnessHost::new();
    host.root.set("pageTitle", Value::from("Hello"));
    let meta = metadata(BindingDeclarations::new().input("heading", "<title"));
    let attrs = HarnessAttributes::new().with_text("title", "pageTitle");
    let mounted = host
        .mount(RecordingComponent::new("probe"), &meta, attrs, true)
        .unwrap();

    assert!(host.digest().is_clean());
    assert!(mounted.component.borrow().notifications().is_empty());

    assert!(host.apply(|root| root.set("pageTitle", Value::from("World"))).is_clean());
    let component = mounted.component.borrow();
    assert_eq!(component.field("heading"), Value::from("World"));
    assert_eq!(component.notifications().len(), 1);
    assert_eq!(
        component.notifications()[0]["heading"],
        ChangeRecord::new(Value::from("Hello"), Value::from("World"))
    );
}

#[test]
fn non_isolated_scope_falls_back_to_one_way() {
    let host = HarnessHost::new();
    host.root.set("model", Value::from(1));
    // No mode marker: the default mode is two-way, which needs an isolated scope.
    let meta = metadata(BindingDeclarations::new().input("value", ""));
    let attrs = HarnessAttributes::new().with_text("value", "model");

    let mounted = host
        .mount(RecordingComponent::new("probe"), &meta, attrs, false)
        .unwrap();

    assert_eq!(mounted.component.borrow().field("value"), Value::from(1));
    assert!(mounted.bindings.initial_changes.contains_key("value"));

    mounted.component.borrow_mut().set_field("value", 9);
    host.digest();
    assert_eq!(host.root.get("model"), Value::from(1));
}

#[test]
fn optional_input_without_attribute_is_skipped() {
    let host = HarnessHost::new();
    let meta = metadata(BindingDeclarations::new().input("limit", "<?"));

    let mounted = host
        .mount(RecordingComponent::new("probe"), &meta, HarnessAttributes::new(), true)
        .unwrap();

    assert!(!mounted.component.borrow().has_field("limit"));
    assert!(mounted.bindings.initial_changes.is_empty());
    assert!(mounted.bindings.teardown.is_empty());
    assert_eq!(host.root.watcher_count(), 0);
}

#[test]
fn optional_input_with_empty_attribute_is_skipped() {
    let host = HarnessHost::new();
    let meta = metadata(BindingDeclarations::new().input("limit", "<?"));
    let attrs = HarnessAttributes::new().with_text("limit", "");

    let mounted = host
        .mount(RecordingComponent::new("probe"), &meta, attrs, true)
        .unwrap();

    assert!(!mounted.component.borrow().has_field("limit"));
    assert!(mounted.bindings.teardown.is_empty());
}

#[test]
fn required_input_without_attribute_binds_undefined() {
    let host = HarnessHost::new();
    let meta = metadata(BindingDeclarations::new().input("limit", "<"));

    let mounted = host
        .mount(RecordingComponent::new("probe"), &meta, HarnessAttributes::new(), true)
        .unwrap();

    assert!(mounted.component.borrow().has_field("limit"));
    assert_eq!(mounted.component.borrow().field("limit"), Value::Undefined);
    assert_eq!(mounted.attributes.get("limit"), Some(AttrValue::Undefined));
    assert_eq!(
        mounted.bindings.initial_changes["limit"],
        ChangeRecord::first(Value::Undefined)
    );

    assert!(host.digest().is_clean());
    assert!(mounted.component.borrow().notifications().is_empty());
}

#[test]
fn on_push_components_receive_deep_copies() {
    let host = HarnessHost::new();
    host.root.set("items", Value::list([1, 2]));
    let declarations = BindingDeclarations::new().input("items", "<");
    let meta = metadata(declarations.clone()).with_change_detection(ChangeDetection::OnPush);
    let attrs = HarnessAttributes::new().with_text("items", "items");
    let mounted = host
        .mount(RecordingComponent::new("probe"), &meta, attrs, true)
        .unwrap();
    host.digest();

    host.apply(|root| root.set("items", Value::list([3])));
    let delivered = mounted.component.borrow().field("items");
    let source = host.root.get("items");
    assert!(delivered.deep_equals(&source));
    assert!(!delivered.is_identical(&source));

    // Directives never get immutable inputs.
    let directive = BindingMetadata::directive("probe", declarations)
        .with_change_detection(ChangeDetection::OnPush);
    let attrs = HarnessAttributes::new().with_text("items", "items");
    let plain = host
        .mount(RecordingComponent::new("plain"), &directive, attrs, true)
        .unwrap();
    host.digest();
    host.apply(|root| root.set("items", Value::list([4])));
    assert!(plain.component.borrow().field("items").is_identical(&host.root.get("items")));
}

#[test]
fn malformed_expression_fails_installation() {
    let host = HarnessHost::new();
    let meta = metadata(BindingDeclarations::new().input("value", "<"));
    let attrs = HarnessAttributes::new().with_text("value", "a +");

    let err = host
        .mount(RecordingComponent::new("probe"), &meta, attrs, true)
        .unwrap_err();
    assert!(matches!(err, BindingError::Evaluation { .. }));
}

// ============================================================================
// Two-way
// ============================================================================

fn two_way_host(expression: &str) -> (HarnessHost, scopebind_harness::Mounted) {
    let host = HarnessHost::new();
    host.root.set("model", Value::from(1));
    let meta = metadata(BindingDeclarations::new().input("value", "="));
    let attrs = HarnessAttributes::new().with_text("value", expression);
    let mounted = host
        .mount(RecordingComponent::new("probe"), &meta, attrs, true)
        .unwrap();
    (host, mounted)
}

#[test]
fn two_way_syncs_eagerly_without_initial_change() {
    let (host, mounted) = two_way_host("model");

    assert_eq!(mounted.component.borrow().field("value"), Value::from(1));
    assert!(mounted.bindings.initial_changes.is_empty());
    assert_eq!(mounted.bindings.watcher_count(), 1);
    assert!(host.digest().is_clean());
}

#[test]
fn two_way_writes_component_changes_back() {
    let (host, mounted) = two_way_host("model");
    host.digest();

    mounted.component.borrow_mut().set_field("value", 5);
    assert!(host.digest().is_clean());

    assert_eq!(host.root.get("model"), Value::from(5));
    assert!(mounted.component.borrow().notifications().is_empty());
}

#[test]
fn two_way_parent_wins_concurrent_changes() {
    let (host, mounted) = two_way_host("model");
    host.digest();

    mounted.component.borrow_mut().set_field("value", 5);
    host.apply(|root| root.set("model", Value::from(7)));

    assert_eq!(mounted.component.borrow().field("value"), Value::from(7));
    assert_eq!(host.root.get("model"), Value::from(7));
}

#[test]
fn two_way_parent_changes_flow_down() {
    let (host, mounted) = two_way_host("model");
    host.digest();

    host.apply(|root| root.set("model", Value::from(3)));
    assert_eq!(mounted.component.borrow().field("value"), Value::from(3));
}

#[test]
fn two_way_non_assignable_raises_once() {
    let (host, mounted) = two_way_host("'fixed'");
    assert!(host.digest().is_clean());

    mounted.component.borrow_mut().set_field("value", "edited");
    let report = host.digest();
    assert_eq!(report.errors.len(), 1);
    match &report.errors[0] {
        BindingError::NonAssignable {
            expression,
            attribute,
            component,
        } => {
            assert_eq!(expression, "'fixed'");
            assert_eq!(attribute, "value");
            assert_eq!(component, "probe");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(mounted.component.borrow().field("value"), Value::from("fixed"));

    assert!(host.digest().is_clean());
}

#[test]
fn two_way_literal_is_compared_structurally() {
    let (host, mounted) = two_way_host("[1, 2]");
    let initial = mounted.component.borrow().field("value");

    assert!(host.digest().is_clean());
    assert!(host.digest().is_clean());

    // A fresh array is evaluated every cycle but the component keeps its value.
    assert!(mounted.component.borrow().field("value").is_identical(&initial));
}

#[test]
fn two_way_writes_through_nested_paths() {
    let host = HarnessHost::new();
    host.root.set("form", Value::map([("name", "ada")]));
    let meta = metadata(BindingDeclarations::new().input("name", "=field"));
    let attrs = HarnessAttributes::new().with_text("field", "form.name");
    let mounted = host
        .mount(RecordingComponent::new("probe"), &meta, attrs, true)
        .unwrap();
    host.digest();

    mounted.component.borrow_mut().set_field("name", "bob");
    host.digest();
    assert_eq!(host.root.get("form").get("name"), Some(&Value::from("bob")));
}
