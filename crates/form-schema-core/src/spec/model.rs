//! Declarative form specification model.
//!
//! This module contains no serde and no I/O. Specs are immutable templates:
//! the live tree reads them but never changes them.

use crate::types::{FieldOption, FieldSize, FieldType};
use serde_json::Value;
use std::fmt;

// ────────────────────────────────────────────
// Rules
// ────────────────────────────────────────────

/// A range bound: a literal value, or an expression evaluated against the
/// field's dependencies.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    /// Fixed bound (number or date string).
    Literal(Value),
    /// Expression such as `"data.minAge"`.
    Expression(String),
}

impl From<i32> for Bound {
    fn from(value: i32) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<i64> for Bound {
    fn from(value: i64) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<f64> for Bound {
    fn from(value: f64) -> Self {
        Self::Literal(Value::from(value))
    }
}

/// Strings are expressions, as in schema documents.
impl From<&str> for Bound {
    fn from(expression: &str) -> Self {
        Self::Expression(expression.to_string())
    }
}

/// Static validation rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validators {
    /// The field must not be empty (unless overridden by `required_if`).
    pub required: bool,
    /// Lower bound, checked for number and date fields.
    pub min: Option<Bound>,
    /// Upper bound, checked for number and date fields.
    pub max: Option<Bound>,
}

/// One candidate of a `use_values_if` list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRule {
    /// Condition that selects this rule. Absent or blank never matches.
    pub condition: Option<String>,
    /// Value to assign. Strings are evaluated as expressions against the
    /// field's dependencies; use `"'text'"` for a literal string.
    pub value: Option<Value>,
}

impl ValueRule {
    /// Creates a rule assigning `value` when `condition` holds.
    #[must_use]
    pub fn new(condition: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            condition: Some(condition.into()),
            value: Some(value.into()),
        }
    }
}

/// Conditional behaviour of a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    /// Visibility condition.
    pub show_if: Option<String>,
    /// Required-ness condition.
    pub required_if: Option<String>,
    /// Read-only condition.
    pub readonly_if: Option<String>,
    /// Conditional value assignment. The first matching rule wins.
    pub use_values_if: Vec<ValueRule>,
}

/// Roles allowed to read or write a field. An empty list allows everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    /// Roles that may see the field.
    pub read: Vec<String>,
    /// Roles that may edit the field.
    pub write: Vec<String>,
}

impl Permissions {
    /// Returns true if `roles` grants read access.
    #[must_use]
    pub fn can_read(&self, roles: &[String]) -> bool {
        allows(&self.read, roles)
    }

    /// Returns true if `roles` grants write access.
    #[must_use]
    pub fn can_write(&self, roles: &[String]) -> bool {
        allows(&self.write, roles)
    }
}

fn allows(required: &[String], roles: &[String]) -> bool {
    required.is_empty() || roles.iter().any(|r| required.contains(r))
}

// ────────────────────────────────────────────
// Field
// ────────────────────────────────────────────

/// Template of a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Unique key within the parent group.
    pub key: String,
    /// Label shown to the user.
    pub label: String,
    /// Placeholder text.
    pub placeholder: Option<String>,
    /// Help text.
    pub hint: Option<String>,
    /// Input type.
    pub field_type: FieldType,
    /// Initial value.
    pub default_value: Value,
    /// Static read-only flag.
    pub readonly: bool,
    /// Static visibility flag.
    pub visible: bool,
    /// Start disabled.
    pub disabled: bool,
    /// Disable the field while it is hidden.
    pub disable_when_not_visible: bool,
    /// Display width.
    pub size: FieldSize,
    /// Maximum text length.
    pub max_length: Option<usize>,
    /// Display order within the group.
    pub order: i64,
    /// Visual group name.
    pub group: Option<String>,
    /// Text shown before the input.
    pub prefix: Option<String>,
    /// Text shown after the input.
    pub suffix: Option<String>,
    /// Paths of the values this field's conditions read.
    pub dependencies: Vec<String>,
    /// Validation rules.
    pub validators: Validators,
    /// Conditional behaviour.
    pub conditions: Conditions,
    /// Read/write permissions.
    pub permissions: Permissions,
    /// Static select options.
    pub options: Vec<FieldOption>,
    /// Initial roles of the acting user.
    pub user_roles: Vec<String>,
}

impl Default for FieldSpec {
    fn default() -> Self {
        Self {
            key: String::new(),
            label: String::new(),
            placeholder: None,
            hint: None,
            field_type: FieldType::Text,
            default_value: Value::Null,
            readonly: false,
            visible: true,
            disabled: false,
            disable_when_not_visible: true,
            size: FieldSize::Sm,
            max_length: None,
            order: 0,
            group: None,
            prefix: None,
            suffix: None,
            dependencies: Vec::new(),
            validators: Validators::default(),
            conditions: Conditions::default(),
            permissions: Permissions::default(),
            options: Vec::new(),
            user_roles: Vec::new(),
        }
    }
}

impl FieldSpec {
    /// Creates a text field template with the given key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the input type.
    #[must_use]
    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Sets the initial value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Sets the dependency paths.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.validators.required = true;
        self
    }

    /// Sets the static read-only flag.
    #[must_use]
    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    /// Sets the static visibility flag.
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Sets the initial disabled flag.
    #[must_use]
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Sets the lower bound.
    #[must_use]
    pub fn with_min(mut self, bound: impl Into<Bound>) -> Self {
        self.validators.min = Some(bound.into());
        self
    }

    /// Sets the upper bound.
    #[must_use]
    pub fn with_max(mut self, bound: impl Into<Bound>) -> Self {
        self.validators.max = Some(bound.into());
        self
    }

    /// Sets the visibility condition.
    #[must_use]
    pub fn show_if(mut self, expression: impl Into<String>) -> Self {
        self.conditions.show_if = Some(expression.into());
        self
    }

    /// Sets the required-ness condition.
    #[must_use]
    pub fn required_if(mut self, expression: impl Into<String>) -> Self {
        self.conditions.required_if = Some(expression.into());
        self
    }

    /// Sets the read-only condition.
    #[must_use]
    pub fn readonly_if(mut self, expression: impl Into<String>) -> Self {
        self.conditions.readonly_if = Some(expression.into());
        self
    }

    /// Appends a conditional value rule.
    #[must_use]
    pub fn use_value_if(mut self, rule: ValueRule) -> Self {
        self.conditions.use_values_if.push(rule);
        self
    }

    /// Sets the read/write permissions.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Sets the static select options.
    #[must_use]
    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    /// Sets the initial acting roles.
    #[must_use]
    pub fn with_user_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Checks structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.key.trim().is_empty() {
            return Err(ModelError::EmptyKey);
        }
        if let (Some(Bound::Literal(min)), Some(Bound::Literal(max))) =
            (&self.validators.min, &self.validators.max)
        {
            if let (Some(lo), Some(hi)) = (min.as_f64(), max.as_f64()) {
                if lo > hi {
                    return Err(ModelError::InvertedRange {
                        min: min.clone(),
                        max: max.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────
// Composites
// ────────────────────────────────────────────

/// Template of a group of named children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSpec {
    /// Key of this group within its parent, if any.
    pub key: Option<String>,
    /// Conditions of the group itself (kept for hosts, not evaluated).
    pub conditions: Conditions,
    /// Children in insertion order.
    pub fields: Vec<(String, SchemaEntry)>,
}

impl GroupSpec {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the group's key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Appends a field, named by its key.
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        let name = spec.key.clone();
        self.fields.push((name, SchemaEntry::Field(spec)));
        self
    }

    /// Appends any entry under `name`.
    #[must_use]
    pub fn entry(mut self, name: impl Into<String>, entry: impl Into<SchemaEntry>) -> Self {
        self.fields.push((name.into(), entry.into()));
        self
    }
}

/// Template of an indexed list of children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArraySpec {
    /// Key of this array within its parent, if any.
    pub key: Option<String>,
    /// Conditions of the array itself (kept for hosts, not evaluated).
    pub conditions: Conditions,
    /// Children in order.
    pub fields: Vec<SchemaEntry>,
}

impl ArraySpec {
    /// Creates an empty array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the array's key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Appends an entry.
    #[must_use]
    pub fn item(mut self, entry: impl Into<SchemaEntry>) -> Self {
        self.fields.push(entry.into());
        self
    }
}

/// Any node template.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaEntry {
    /// A leaf field.
    Field(FieldSpec),
    /// A named group.
    Group(GroupSpec),
    /// An indexed array.
    Array(ArraySpec),
}

impl From<FieldSpec> for SchemaEntry {
    fn from(spec: FieldSpec) -> Self {
        Self::Field(spec)
    }
}

impl From<GroupSpec> for SchemaEntry {
    fn from(spec: GroupSpec) -> Self {
        Self::Group(spec)
    }
}

impl From<ArraySpec> for SchemaEntry {
    fn from(spec: ArraySpec) -> Self {
        Self::Array(spec)
    }
}

// ────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────

/// Structural errors in a specification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// A field has no key.
    #[error("field key must not be empty")]
    EmptyKey,

    /// Literal bounds where `min > max`.
    #[error("min {min} is greater than max {max}")]
    InvertedRange {
        /// Lower bound.
        min: Value,
        /// Upper bound.
        max: Value,
    },
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Expression(e) => write!(f, "`{e}`"),
        }
    }
}
