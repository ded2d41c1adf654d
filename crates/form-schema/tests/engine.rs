//! Integration test: live form trees reacting to value changes.
//!
//! Builds trees from the shared `person` fixture and from inline documents,
//! then drives them through value edits, role changes and tree mutations.
//! Set `RUST_LOG=form_schema=debug` to see the engine's trace.

use form_schema::spec::{FieldSpec, GroupSpec, Permissions, ValueRule};
use form_schema::{
    EngineConfig, FieldNode, FieldType, GroupNode, Node, SchemaBuilder, TreeError,
    ValidationError,
};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../form-schema-core/tests/fixtures")
        .join(name)
}

fn person() -> GroupNode {
    init_tracing();
    SchemaBuilder::new()
        .group_from_file(&fixture("person.json"))
        .expect("person fixture should build")
}

fn field(group: &GroupNode, path: &str) -> FieldNode {
    group
        .field(path)
        .unwrap_or_else(|| panic!("missing field `{path}`"))
}

// ── Dependencies ──

#[test]
fn guardian_follows_age() {
    let form = person();
    let age = field(&form, "age");
    let guardian = field(&form, "guardian");

    age.set_value(12);
    assert!(guardian.visible().get());
    assert!(guardian.required().get());
    assert_eq!(guardian.error(), Some(ValidationError::Required));

    age.set_value(30);
    assert!(!guardian.visible().get());
    assert!(!guardian.is_enabled());
    assert!(!guardian.required().get());
    assert!(guardian.is_valid());

    age.set_value(15);
    assert!(guardian.visible().get());
    assert!(guardian.is_enabled());
}

#[test]
fn country_is_derived_from_city() {
    let form = person();
    let city = field(&form, "address.city");
    let country = field(&form, "address.country");

    city.set_value("Rome");
    assert_eq!(country.value(), json!("IT"));

    city.set_value("Paris");
    assert_eq!(country.value(), json!("FR"));

    // No rule matches: the last derived value stays.
    city.set_value("Milan");
    assert_eq!(country.value(), json!("FR"));
}

#[test]
fn first_matching_rule_wins() {
    init_tracing();
    let form = SchemaBuilder::new()
        .group_from_json(
            r#"{ "fields": {
                "n": { "key": "n", "type": "number" },
                "size": {
                    "key": "size",
                    "dependencies": ["n"],
                    "conditions": { "useValuesIf": [
                        { "condition": "n > 10", "value": "'big'" },
                        { "condition": "n > 0", "value": "'small'" }
                    ] }
                }
            } }"#,
        )
        .unwrap();
    let n = field(&form, "n");
    let size = field(&form, "size");

    n.set_value(50);
    assert_eq!(size.value(), json!("big"));
    n.set_value(5);
    assert_eq!(size.value(), json!("small"));
}

#[test]
fn literal_rule_values_follow_the_matching_condition() {
    init_tracing();
    let form = GroupNode::new();
    form.add_control("a", FieldNode::new(FieldSpec::new("a"))).unwrap();
    form.add_control(
        "b",
        FieldNode::new(
            FieldSpec::new("b")
                .with_dependencies(["a"])
                .use_value_if(ValueRule::new("a == 'x'", 1))
                .use_value_if(ValueRule::new("a == 'y'", 2)),
        ),
    )
    .unwrap();

    field(&form, "a").set_value("y");
    assert_eq!(field(&form, "b").value(), json!(2));
}

#[test]
fn quotes_in_values_are_not_code() {
    init_tracing();
    let form = SchemaBuilder::new()
        .group_from_json(
            r#"{ "fields": {
                "name": { "key": "name" },
                "greeting": {
                    "key": "greeting",
                    "dependencies": ["name"],
                    "conditions": {
                        "showIf": "name == \"O'Brien\"",
                        "useValuesIf": [ { "condition": "name != null", "value": "'Hi ' + name" } ]
                    }
                }
            } }"#,
        )
        .unwrap();
    let greeting = field(&form, "greeting");

    field(&form, "name").set_value("O'Brien");
    assert!(greeting.visible().get());
    assert_eq!(greeting.value(), json!("Hi O'Brien"));

    field(&form, "name").set_value("Robert'); drop(");
    assert!(!greeting.visible().get());
    assert_eq!(greeting.value(), json!("Hi Robert'); drop("));
}

#[test]
fn expression_bounds_use_dependencies() {
    init_tracing();
    let form = GroupNode::new();
    form.add_control("limit", FieldNode::new(FieldSpec::new("limit").with_default(10)))
        .unwrap();
    form.add_control(
        "qty",
        FieldNode::new(
            FieldSpec::new("qty")
                .with_type(FieldType::Number)
                .with_dependencies(["limit"])
                .with_max("limit"),
        ),
    )
    .unwrap();
    let qty = field(&form, "qty");

    qty.set_value(12);
    assert_eq!(
        qty.error(),
        Some(ValidationError::Max {
            max: json!(10),
            actual: json!(12)
        })
    );

    field(&form, "limit").set_value(20);
    assert!(qty.is_valid());
}

#[test]
fn mutual_dependencies_terminate() {
    init_tracing();
    let config = EngineConfig::new().with_max_pass_depth(4);
    let form = SchemaBuilder::new()
        .with_config(config)
        .group_from_json(
            r#"{ "fields": {
                "a": { "key": "a", "dependencies": ["b"],
                       "conditions": { "useValuesIf": [ { "condition": "true", "value": "b + 1" } ] } },
                "b": { "key": "b", "dependencies": ["a"],
                       "conditions": { "useValuesIf": [ { "condition": "true", "value": "a + 1" } ] } }
            } }"#,
        )
        .unwrap();

    field(&form, "a").set_value(0);
    assert!(field(&form, "a").value().is_number());
    assert!(field(&form, "b").value().is_number());
}

// ── Roles and permissions ──

#[test]
fn roles_propagate_to_nested_fields() {
    init_tracing();
    let form = SchemaBuilder::new()
        .group_from_json(
            r#"{ "fields": {
                "billing": { "fields": {
                    "iban": { "key": "iban", "permissions": { "read": ["admin", "finance"], "write": ["admin"] } }
                } }
            } }"#,
        )
        .unwrap();
    let iban = field(&form, "billing.iban");
    assert!(!iban.visible().get());
    assert!(iban.readonly().get());

    form.set_user_roles(&["finance".to_string()]);
    assert!(iban.visible().get());
    assert!(iban.readonly().get());

    form.set_user_roles(&["admin".to_string()]);
    assert!(iban.visible().get());
    assert!(!iban.readonly().get());
    assert_eq!(iban.user_roles(), vec!["admin".to_string()]);
}

#[test]
fn outer_roles_reach_a_nested_field() {
    init_tracing();
    let spec = GroupSpec::new().entry(
        "inner",
        GroupSpec::new().field(FieldSpec::new("x").with_permissions(Permissions {
            read: Vec::new(),
            write: vec!["admin".to_string()],
        })),
    );
    let form = SchemaBuilder::new().group(&spec).unwrap();
    let x = field(&form, "inner.x");

    let seen = Rc::new(RefCell::new(Vec::new()));
    let _subscription = {
        let seen = Rc::clone(&seen);
        x.readonly().subscribe(move |readonly| seen.borrow_mut().push(*readonly))
    };

    form.set_user_roles(&["admin".to_string()]);
    form.set_user_roles(&["user".to_string()]);
    assert_eq!(*seen.borrow(), vec![true, false, true]);
}

#[test]
fn added_controls_inherit_roles() {
    init_tracing();
    let form = SchemaBuilder::new()
        .with_user_roles(["admin"])
        .group(&GroupSpec::new())
        .unwrap();
    let secret = FieldNode::new(FieldSpec::new("secret").with_permissions(
        Permissions {
            read: vec!["admin".to_string()],
            write: Vec::new(),
        },
    ));
    assert!(!secret.visible().get());

    form.add_control("secret", secret.clone()).unwrap();
    assert!(secret.visible().get());
}

// ── Values ──

#[test]
fn patch_value_publishes_once() {
    let form = person();
    let root_changes = Rc::new(Cell::new(0));
    let _subscription = {
        let count = Rc::clone(&root_changes);
        let root_id = form.id();
        form.value_changes().subscribe(move |change| {
            if change.origin == root_id {
                count.set(count.get() + 1);
            }
        })
    };

    form.patch_value(&json!({
        "name": "Ada",
        "age": 30,
        "contacts": ["123", "ada@example.com"],
        "address": { "city": "Rome" },
        "unknown": true
    }));

    assert_eq!(root_changes.get(), 1);
    insta::assert_snapshot!(
        form.raw_value().to_string(),
        @r#"{"name":"Ada","age":30,"guardian":null,"contacts":["123","ada@example.com"],"address":{"city":"Rome","country":"IT"}}"#
    );
}

#[test]
fn changes_carry_their_origin() {
    let form = person();
    let origins = Rc::new(RefCell::new(Vec::new()));
    let _subscription = {
        let origins = Rc::clone(&origins);
        form.value_changes()
            .subscribe(move |change| origins.borrow_mut().push(change.origin))
    };

    let name = field(&form, "name");
    name.set_value("Ada");
    assert_eq!(origins.borrow().as_slice(), &[name.id()]);
}

#[test]
fn range_errors_precede_required() {
    let form = person();
    let age = field(&form, "age");
    age.set_value(130);
    assert_eq!(
        age.error(),
        Some(ValidationError::Max {
            max: json!(120),
            actual: json!(130)
        })
    );
    age.set_value(-1);
    assert_eq!(age.error().map(|e| e.key()), Some("min"));
}

#[test]
fn explicit_data_source_overrides_the_tree() {
    let form = person();
    let age = field(&form, "age");
    let guardian = field(&form, "guardian");
    age.set_value(30);
    assert!(!guardian.visible().get());

    form.check_conditions_and_update_state(Some(&json!({ "age": 5 })));
    assert!(guardian.visible().get());

    // A scalar is not a data source; the tree is used instead.
    form.check_conditions_and_update_state(Some(&json!(5)));
    assert!(!guardian.visible().get());
}

#[test]
fn repeated_passes_change_nothing() {
    let form = person();
    field(&form, "age").set_value(12);

    let emissions = Rc::new(Cell::new(0));
    let subscriptions: Vec<_> = form
        .leaves()
        .iter()
        .flat_map(|leaf| {
            let visible = Rc::clone(&emissions);
            let errors = Rc::clone(&emissions);
            [
                leaf.visible().subscribe(move |_| visible.set(visible.get() + 1)),
                leaf.errors().subscribe(move |_| errors.set(errors.get() + 1)),
            ]
        })
        .collect();
    let baseline = emissions.get();

    form.check_conditions_and_update_state(None);
    form.check_conditions_and_update_state(None);
    assert_eq!(emissions.get(), baseline);
    drop(subscriptions);
}

// ── Tree mutation ──

#[test]
fn replaced_control_is_recomputed() {
    let form = person();
    field(&form, "age").set_value(12);

    // Detached, `age` resolves to undefined and the condition fails.
    let replacement = FieldNode::new(
        FieldSpec::new("guardian")
            .with_dependencies(["age"])
            .show_if("age < 18"),
    );
    assert!(!replacement.visible().get());
    assert!(!replacement.is_enabled());

    form.set_control("guardian", replacement.clone()).unwrap();
    assert!(replacement.visible().get());
    assert!(replacement.is_enabled());
    assert_eq!(form.field("guardian").unwrap().id(), replacement.id());
}

#[test]
fn detached_fields_stop_following_the_tree() {
    let form = person();
    let guardian = form.remove_control("guardian").unwrap();
    let guardian = guardian.as_field().unwrap().clone();

    field(&form, "age").set_value(30);
    assert!(guardian.visible().get());
    assert!(guardian.parent().is_none());
}

#[test]
fn tree_errors_are_reported() {
    let form = person();
    let name = form.child("name").unwrap();

    assert_eq!(
        form.add_control("name", FieldNode::new(FieldSpec::new("name"))),
        Err(TreeError::DuplicateKey("name".to_string()))
    );
    let other = GroupNode::new();
    assert_eq!(other.add_control("name", name), Err(TreeError::AlreadyAttached));

    let address = form.child("address").unwrap();
    let Node::Group(address) = address else {
        panic!("address should be a group");
    };
    assert_eq!(
        address.add_control("loop", Node::Group(form.clone())),
        Err(TreeError::Cycle)
    );

    let contacts = form.get("contacts").unwrap();
    let contacts = contacts.as_array().unwrap();
    insta::assert_snapshot!(
        contacts.remove_at(7).unwrap_err().to_string(),
        @"index 7 is out of bounds for length 2"
    );
}

// ── Enablement ──

#[test]
fn disabling_a_group_cascades() {
    let form = person();
    let Some(Node::Group(address)) = form.get("address") else {
        panic!("address should be a group");
    };
    let city = field(&form, "address.city");

    address.disable();
    assert!(!address.is_enabled());
    assert!(!city.is_enabled());
    assert!(city.disabled().get());

    address.enable();
    assert!(city.is_enabled());
}

#[test]
fn re_enabling_keeps_hidden_fields_disabled() {
    let form = person();
    let guardian = field(&form, "guardian");
    field(&form, "age").set_value(30);
    assert!(!guardian.is_enabled());

    form.disable();
    assert!(!field(&form, "name").is_enabled());

    form.enable();
    assert!(field(&form, "name").is_enabled());
    assert!(!guardian.is_enabled());
}

#[test]
fn hidden_field_in_disabled_group_is_left_alone() {
    let form = person();
    let guardian = field(&form, "guardian");
    field(&form, "age").set_value(30);
    form.disable();

    field(&form, "age").set_value(12);
    assert!(guardian.visible().get());
    assert!(!guardian.is_enabled());
}

// ── Formats ──

#[test]
fn toml_and_json_build_equivalent_trees() {
    init_tracing();
    let builder = SchemaBuilder::new();
    let from_json = builder.group_from_file(&fixture("person.json")).unwrap();
    let from_toml = builder.group_from_file(&fixture("person.toml")).unwrap();

    let keys = |group: &GroupNode| {
        let mut keys: Vec<String> = group.leaves().iter().map(|f| f.key().to_string()).collect();
        keys.sort();
        keys
    };
    assert_eq!(keys(&from_json), keys(&from_toml));
    assert_eq!(from_json.raw_value(), from_toml.raw_value());
}

#[test]
fn builds_from_temporary_toml_file() {
    use std::io::Write;

    init_tracing();
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(
        file,
        r#"
[fields.total]
key = "total"
type = "number"
defaultValue = 3

[fields.total.validators]
max = 2
"#
    )
    .expect("write");

    let form = SchemaBuilder::new().group_from_file(file.path()).unwrap();
    assert_eq!(field(&form, "total").error().map(|e| e.key()), Some("max"));
}
