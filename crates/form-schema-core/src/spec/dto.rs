//! Serde representation of schema documents (DTO layer).
//!
//! These types exist solely for deserialization. Keys are camelCase, as in
//! the JSON documents form authors write. They are converted to
//! [`super::model`] types by the loader.

use crate::types::{FieldOption, FieldSize};
use serde::Deserialize;
use serde_json::Value;

/// Raw field template.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDto {
    /// Field key.
    pub key: String,
    /// Label.
    #[serde(default)]
    pub label: String,
    /// Placeholder text.
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Help text.
    #[serde(default)]
    pub hint: Option<String>,
    /// Type name (default: "text").
    #[serde(rename = "type", default = "default_type")]
    pub field_type: String,
    /// Initial value.
    #[serde(default)]
    pub default_value: Value,
    /// Static read-only flag.
    #[serde(default)]
    pub readonly: Option<bool>,
    /// Static visibility flag.
    #[serde(default)]
    pub visible: Option<bool>,
    /// Initial disabled flag.
    #[serde(default)]
    pub disabled: Option<bool>,
    /// Disable while hidden (default: true).
    #[serde(default)]
    pub disable_when_not_visible: Option<bool>,
    /// Display width.
    #[serde(default)]
    pub size: Option<FieldSize>,
    /// Maximum text length.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Display order.
    #[serde(default)]
    pub order: Option<i64>,
    /// Visual group name.
    #[serde(default)]
    pub group: Option<String>,
    /// Prefix text.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Suffix text.
    #[serde(default)]
    pub suffix: Option<String>,
    /// Dependency paths.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Validation rules.
    #[serde(default)]
    pub validators: ValidatorsDto,
    /// Conditional behaviour.
    #[serde(default)]
    pub conditions: ConditionsDto,
    /// Permissions.
    #[serde(default)]
    pub permissions: PermissionsDto,
    /// Static select options.
    #[serde(default)]
    pub options: Vec<FieldOption>,
    /// Initial acting roles.
    #[serde(default)]
    pub user_roles: Vec<String>,
}

fn default_type() -> String {
    "text".to_string()
}

/// Raw validators. `min`/`max` are numbers (literal) or strings (expression).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidatorsDto {
    /// Required flag.
    #[serde(default)]
    pub required: Option<bool>,
    /// Lower bound.
    #[serde(default)]
    pub min: Option<Value>,
    /// Upper bound.
    #[serde(default)]
    pub max: Option<Value>,
}

/// Raw conditions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionsDto {
    /// Visibility condition.
    #[serde(default)]
    pub show_if: Option<String>,
    /// Required-ness condition.
    #[serde(default)]
    pub required_if: Option<String>,
    /// Read-only condition.
    #[serde(default)]
    pub readonly_if: Option<String>,
    /// A single `{condition, value}` object or a list of them. Kept untyped so
    /// malformed input can be dropped instead of rejected.
    #[serde(default)]
    pub use_values_if: Option<Value>,
}

/// Raw permissions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionsDto {
    /// Roles with read access.
    #[serde(default)]
    pub read: Vec<String>,
    /// Roles with write access.
    #[serde(default)]
    pub write: Vec<String>,
}
