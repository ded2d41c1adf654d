//! Schema document → specification model conversion with validation.
//!
//! Entries are classified by shape:
//!
//! | Shape | Entry |
//! |-------|-------|
//! | `fields` is an object | group |
//! | `fields` is an array | array |
//! | `key` without `fields` | field |

use miette::Diagnostic;
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::dto::{ConditionsDto, FieldDto};
use super::model::{
    ArraySpec, Bound, Conditions, FieldSpec, GroupSpec, ModelError, Permissions, SchemaEntry,
    ValueRule, Validators,
};
use crate::types::FieldType;

/// Errors while loading a schema document.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum LoadError {
    /// The document is not valid JSON.
    #[error("JSON parse error: {0}")]
    #[diagnostic(code(form_schema::load::json))]
    Json(#[from] serde_json::Error),

    /// The document is not valid TOML.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(form_schema::load::toml))]
    Toml(#[from] toml::de::Error),

    /// The schema file could not be read.
    #[error("failed to read schema file {path}: {source}")]
    #[diagnostic(code(form_schema::load::io))]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The file extension is neither `.json` nor `.toml`.
    #[error("unsupported schema file {path}")]
    #[diagnostic(
        code(form_schema::load::format),
        help("use a `.json` or `.toml` extension")
    )]
    UnsupportedFormat {
        /// Path to the file.
        path: PathBuf,
    },

    /// A field template has the wrong shape (missing `key`, wrong types).
    #[error("{context}: {source}")]
    #[diagnostic(code(form_schema::load::field))]
    Field {
        /// Where the error occurred (e.g. "fields.address.fields.zip").
        context: String,
        /// The underlying deserialization error.
        source: serde_json::Error,
    },

    /// A field template violates a model invariant.
    #[error("{context}: {source}")]
    #[diagnostic(code(form_schema::load::validation))]
    Validation {
        /// Where the error occurred.
        context: String,
        /// The underlying model error.
        source: ModelError,
    },

    /// Unknown `type` string.
    #[error("{context}: unknown field type `{value}`")]
    #[diagnostic(
        code(form_schema::load::field_type),
        help("expected one of: text, select, number, textarea, checkbox, tel, email, date, time, datetime")
    )]
    UnknownFieldType {
        /// Where the error occurred.
        context: String,
        /// The invalid value.
        value: String,
    },

    /// The entry is neither a field, a group nor an array.
    #[error("{context}: cannot classify entry")]
    #[diagnostic(
        code(form_schema::load::unclassified),
        help("a field needs `key`; a group needs an object `fields`; an array needs a list `fields`")
    )]
    Unclassified {
        /// Where the error occurred.
        context: String,
    },
}

/// Converts a parsed document into a root group.
///
/// The root must have `fields`. As an object, its entries are keyed by name;
/// as a list, each entry is keyed by its own `key`.
///
/// # Errors
///
/// Returns the first error encountered during conversion.
pub fn load_group(document: &Value) -> Result<GroupSpec, LoadError> {
    let ctx = "root";
    let Some(object) = document.as_object() else {
        return Err(LoadError::Unclassified {
            context: ctx.to_string(),
        });
    };
    match object.get("fields") {
        Some(Value::Object(fields)) => convert_group(object, fields, ctx),
        Some(Value::Array(items)) => {
            let mut group = group_header(object, ctx)?;
            for (i, item) in items.iter().enumerate() {
                let item_ctx = format!("fields[{i}]");
                let name = item
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or_else(|| LoadError::Unclassified {
                        context: item_ctx.clone(),
                    })?
                    .to_string();
                group.fields.push((name, load_entry(item, &item_ctx)?));
            }
            Ok(group)
        }
        _ => Err(LoadError::Unclassified {
            context: ctx.to_string(),
        }),
    }
}

/// Converts one entry of any kind.
///
/// # Errors
///
/// Returns the first error encountered during conversion.
pub fn load_entry(value: &Value, ctx: &str) -> Result<SchemaEntry, LoadError> {
    let Some(object) = value.as_object() else {
        return Err(LoadError::Unclassified {
            context: ctx.to_string(),
        });
    };
    match object.get("fields") {
        Some(Value::Object(fields)) => convert_group(object, fields, ctx).map(SchemaEntry::Group),
        Some(Value::Array(items)) => convert_array(object, items, ctx).map(SchemaEntry::Array),
        Some(_) => Err(LoadError::Unclassified {
            context: ctx.to_string(),
        }),
        None if object.contains_key("key") => convert_field(value, ctx).map(SchemaEntry::Field),
        None => Err(LoadError::Unclassified {
            context: ctx.to_string(),
        }),
    }
}

fn group_header(object: &Map<String, Value>, ctx: &str) -> Result<GroupSpec, LoadError> {
    Ok(GroupSpec {
        key: composite_key(object),
        conditions: composite_conditions(object, ctx)?,
        fields: Vec::new(),
    })
}

fn convert_group(
    object: &Map<String, Value>,
    fields: &Map<String, Value>,
    ctx: &str,
) -> Result<GroupSpec, LoadError> {
    let mut group = group_header(object, ctx)?;
    for (name, entry) in fields {
        let entry_ctx = if ctx == "root" {
            format!("fields.{name}")
        } else {
            format!("{ctx}.fields.{name}")
        };
        group.fields.push((name.clone(), load_entry(entry, &entry_ctx)?));
    }
    Ok(group)
}

fn convert_array(
    object: &Map<String, Value>,
    items: &[Value],
    ctx: &str,
) -> Result<ArraySpec, LoadError> {
    let fields = items
        .iter()
        .enumerate()
        .map(|(i, item)| load_entry(item, &format!("{ctx}.fields[{i}]")))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ArraySpec {
        key: composite_key(object),
        conditions: composite_conditions(object, ctx)?,
        fields,
    })
}

fn composite_key(object: &Map<String, Value>) -> Option<String> {
    match object.get("key") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn composite_conditions(object: &Map<String, Value>, ctx: &str) -> Result<Conditions, LoadError> {
    match object.get("conditions") {
        None | Some(Value::Null) => Ok(Conditions::default()),
        Some(raw) => {
            let dto: ConditionsDto =
                serde_json::from_value(raw.clone()).map_err(|e| LoadError::Field {
                    context: format!("{ctx}.conditions"),
                    source: e,
                })?;
            Ok(convert_conditions(dto, ctx))
        }
    }
}

/// Converts a single field template.
///
/// # Errors
///
/// Returns an error if the template has the wrong shape, an unknown type, or
/// violates a model invariant.
pub fn convert_field(value: &Value, ctx: &str) -> Result<FieldSpec, LoadError> {
    let dto: FieldDto = serde_json::from_value(value.clone()).map_err(|e| LoadError::Field {
        context: ctx.to_string(),
        source: e,
    })?;

    let field_type: FieldType =
        dto.field_type
            .parse()
            .map_err(|_| LoadError::UnknownFieldType {
                context: format!("{ctx}.type"),
                value: dto.field_type.clone(),
            })?;

    let defaults = FieldSpec::default();
    let spec = FieldSpec {
        key: dto.key,
        label: dto.label,
        placeholder: dto.placeholder,
        hint: dto.hint,
        field_type,
        default_value: dto.default_value,
        readonly: dto.readonly.unwrap_or(defaults.readonly),
        visible: dto.visible.unwrap_or(defaults.visible),
        disabled: dto.disabled.unwrap_or(defaults.disabled),
        disable_when_not_visible: dto
            .disable_when_not_visible
            .unwrap_or(defaults.disable_when_not_visible),
        size: dto.size.unwrap_or(defaults.size),
        max_length: dto.max_length,
        order: dto.order.unwrap_or(defaults.order),
        group: dto.group,
        prefix: dto.prefix,
        suffix: dto.suffix,
        dependencies: dto.dependencies,
        validators: Validators {
            required: dto.validators.required.unwrap_or(false),
            min: dto.validators.min.and_then(convert_bound),
            max: dto.validators.max.and_then(convert_bound),
        },
        conditions: convert_conditions(dto.conditions, ctx),
        permissions: Permissions {
            read: dto.permissions.read,
            write: dto.permissions.write,
        },
        options: dto.options,
        user_roles: dto.user_roles,
    };

    spec.validate().map_err(|e| LoadError::Validation {
        context: ctx.to_string(),
        source: e,
    })?;
    Ok(spec)
}

fn convert_bound(raw: Value) -> Option<Bound> {
    match raw {
        Value::Null => None,
        Value::String(expression) => Some(Bound::Expression(expression)),
        literal => Some(Bound::Literal(literal)),
    }
}

fn convert_conditions(dto: ConditionsDto, ctx: &str) -> Conditions {
    Conditions {
        show_if: dto.show_if,
        required_if: dto.required_if,
        readonly_if: dto.readonly_if,
        use_values_if: dto
            .use_values_if
            .map(|raw| convert_value_rules(&raw, ctx))
            .unwrap_or_default(),
    }
}

/// Accepts one `{condition, value}` object or a list of them. Anything else,
/// including a list with a non-object item, yields no rules.
fn convert_value_rules(raw: &Value, ctx: &str) -> Vec<ValueRule> {
    match raw {
        Value::Null => Vec::new(),
        Value::Object(rule) => vec![convert_value_rule(rule)],
        Value::Array(items) => {
            let rules: Option<Vec<ValueRule>> = items
                .iter()
                .map(|item| item.as_object().map(convert_value_rule))
                .collect();
            rules.unwrap_or_else(|| {
                tracing::debug!(context = ctx, "dropping useValuesIf with non-object items");
                Vec::new()
            })
        }
        other => {
            tracing::debug!(context = ctx, value = %other, "dropping malformed useValuesIf");
            Vec::new()
        }
    }
}

fn convert_value_rule(rule: &Map<String, Value>) -> ValueRule {
    ValueRule {
        condition: rule
            .get("condition")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        value: rule.get("value").cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classification() {
        let group = load_group(&json!({
            "key": "root",
            "fields": {
                "name": { "key": "name", "label": "Name" },
                "address": { "fields": { "zip": { "key": "zip" } } },
                "phones": { "key": "phones", "fields": [ { "key": "phone", "type": "tel" } ] }
            }
        }))
        .unwrap();

        assert_eq!(group.key.as_deref(), Some("root"));
        let kinds: Vec<(&str, &str)> = group
            .fields
            .iter()
            .map(|(name, entry)| {
                let kind = match entry {
                    SchemaEntry::Field(_) => "field",
                    SchemaEntry::Group(_) => "group",
                    SchemaEntry::Array(_) => "array",
                };
                (name.as_str(), kind)
            })
            .collect();
        assert_eq!(
            kinds,
            vec![("name", "field"), ("address", "group"), ("phones", "array")]
        );
    }

    #[test]
    fn test_root_field_list_is_keyed_by_key() {
        let group = load_group(&json!({
            "fields": [ { "key": "a" }, { "key": "b", "type": "number" } ]
        }))
        .unwrap();
        let names: Vec<&str> = group.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_field_conversion() {
        let spec = convert_field(
            &json!({
                "key": "age",
                "type": "number",
                "defaultValue": 3,
                "dependencies": ["data.min"],
                "validators": { "required": true, "min": "data.min", "max": 99 },
                "conditions": { "showIf": "data.min > 0" },
                "permissions": { "write": ["admin"] },
                "size": "full"
            }),
            "fields.age",
        )
        .unwrap();

        assert_eq!(spec.field_type, FieldType::Number);
        assert_eq!(spec.default_value, json!(3));
        assert_eq!(spec.validators.min, Some(Bound::Expression("data.min".into())));
        assert_eq!(spec.validators.max, Some(Bound::Literal(json!(99))));
        assert_eq!(spec.conditions.show_if.as_deref(), Some("data.min > 0"));
        assert_eq!(spec.permissions.write, vec!["admin".to_string()]);
        assert!(spec.disable_when_not_visible);
        assert!(spec.visible);
    }

    #[test]
    fn test_use_values_if_shapes() {
        let single = convert_value_rules(&json!({ "condition": "a == 1", "value": 2 }), "f");
        assert_eq!(single, vec![ValueRule::new("a == 1", 2)]);

        let list = convert_value_rules(
            &json!([{ "condition": "a == 1", "value": 2 }, { "value": 3 }]),
            "f",
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].condition, None);

        assert!(convert_value_rules(&json!([{ "condition": "a" }, "oops"]), "f").is_empty());
        assert!(convert_value_rules(&json!("a == 1"), "f").is_empty());
    }

    #[test]
    fn test_unknown_type_error() {
        let err = convert_field(&json!({ "key": "x", "type": "radio" }), "fields.x").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"fields.x.type: unknown field type `radio`");
    }

    #[test]
    fn test_unclassified_error_context() {
        let err = load_group(&json!({
            "fields": { "outer": { "fields": { "bad": { "label": "no key" } } } }
        }))
        .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"fields.outer.fields.bad: cannot classify entry");
    }

    #[test]
    fn test_field_shape_error() {
        let err = load_entry(&json!({ "key": 5 }), "fields.x").unwrap_err();
        assert!(matches!(err, LoadError::Field { ref context, .. } if context == "fields.x"));
    }

    #[test]
    fn test_validation_error() {
        let err = convert_field(
            &json!({ "key": "n", "validators": { "min": 9, "max": 1 } }),
            "fields.n",
        )
        .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"fields.n: min 9 is greater than max 1");
    }

    #[test]
    fn test_root_without_fields() {
        assert!(matches!(
            load_group(&json!({ "key": "x" })),
            Err(LoadError::Unclassified { .. })
        ));
    }
}
