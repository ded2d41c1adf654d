//! Integration test: schema documents end-to-end through the loader.
//!
//! Uses fixture files under `tests/fixtures/` to verify that JSON and TOML
//! documents describing the same form produce the same specification.

use form_schema_core::spec::{
    load_from_file, load_from_json_str, Bound, GroupSpec, LoadError, SchemaEntry,
};
use form_schema_core::{FieldSize, FieldType};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn entry<'a>(group: &'a GroupSpec, name: &str) -> &'a SchemaEntry {
    group
        .fields
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, e)| e)
        .unwrap_or_else(|| panic!("missing entry `{name}`"))
}

/// Sorts group children by name so documents can be compared regardless of
/// the key order their format preserves.
fn normalized(mut group: GroupSpec) -> GroupSpec {
    group.fields.sort_by(|(a, _), (b, _)| a.cmp(b));
    group.fields = group
        .fields
        .into_iter()
        .map(|(name, e)| match e {
            SchemaEntry::Group(g) => (name, SchemaEntry::Group(normalized(g))),
            other => (name, other),
        })
        .collect();
    group
}

// ── Happy path ──

#[test]
fn json_fixture_loads_every_kind_of_entry() {
    let group = load_from_file(&fixture("person.json")).expect("fixture should load");

    assert_eq!(group.key.as_deref(), Some("person"));
    let names: Vec<&str> = group.fields.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["name", "age", "guardian", "contacts", "address"]);

    let SchemaEntry::Field(age) = entry(&group, "age") else {
        panic!("age should be a field");
    };
    assert_eq!(age.field_type, FieldType::Number);
    assert_eq!(age.size, FieldSize::Md);
    assert_eq!(age.validators.min, Some(Bound::Literal(json!(0))));
    assert_eq!(age.validators.max, Some(Bound::Literal(json!(120))));

    let SchemaEntry::Array(contacts) = entry(&group, "contacts") else {
        panic!("contacts should be an array");
    };
    assert_eq!(contacts.key.as_deref(), Some("contacts"));
    assert_eq!(contacts.fields.len(), 2);

    let SchemaEntry::Group(address) = entry(&group, "address") else {
        panic!("address should be a group");
    };
    assert_eq!(address.key, None);
    let SchemaEntry::Field(country) = entry(address, "country") else {
        panic!("country should be a field");
    };
    assert_eq!(country.options.len(), 2);
    assert_eq!(country.conditions.use_values_if.len(), 2);
    assert_eq!(
        country.conditions.use_values_if[1].value,
        Some(json!("'FR'"))
    );
}

#[test]
fn toml_and_json_fixtures_describe_the_same_form() {
    let from_json = load_from_file(&fixture("person.json")).expect("JSON fixture should load");
    let from_toml = load_from_file(&fixture("person.toml")).expect("TOML fixture should load");
    assert_eq!(normalized(from_json), normalized(from_toml));
}

#[test]
fn loads_from_temporary_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("temp file");
    write!(
        file,
        r#"{{ "fields": [ {{ "key": "when", "type": "datetime", "hint": "UTC" }} ] }}"#
    )
    .expect("write");

    let group = load_from_file(file.path()).expect("temp schema should load");
    let SchemaEntry::Field(when) = entry(&group, "when") else {
        panic!("when should be a field");
    };
    assert_eq!(when.field_type, FieldType::Datetime);
    assert_eq!(when.hint.as_deref(), Some("UTC"));
}

// ── Errors ──

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.json");
    let err = load_from_file(&path).unwrap_err();
    assert!(matches!(err, LoadError::Io { path: ref p, .. } if *p == path));
}

#[test]
fn errors_carry_diagnostic_codes() {
    use miette::Diagnostic;

    let err = load_from_json_str(r#"{ "fields": { "x": { "key": "x", "type": "radio" } } }"#)
        .unwrap_err();
    let code = err.code().map(|c| c.to_string());
    assert_eq!(code.as_deref(), Some("form_schema::load::field_type"));
    assert!(err.help().is_some());
}

#[test]
fn malformed_use_values_if_degrades_to_no_rules() {
    let group = load_from_json_str(
        r#"{ "fields": { "x": { "key": "x", "conditions": { "useValuesIf": [1, 2] } } } }"#,
    )
    .expect("malformed useValuesIf is not an error");
    let SchemaEntry::Field(x) = entry(&group, "x") else {
        panic!("x should be a field");
    };
    assert!(x.conditions.use_values_if.is_empty());
}
