//! Shared value types for field templates and validation results.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Input type of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Single-line text.
    #[default]
    Text,
    /// Choice among [`FieldOption`]s.
    Select,
    /// Numeric input; enables range validation.
    Number,
    /// Multi-line text.
    Textarea,
    /// Boolean checkbox.
    Checkbox,
    /// Telephone number.
    Tel,
    /// Email address.
    Email,
    /// Calendar date; enables range validation.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    Datetime,
}

impl FieldType {
    /// All variants, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Text,
        Self::Select,
        Self::Number,
        Self::Textarea,
        Self::Checkbox,
        Self::Tel,
        Self::Email,
        Self::Date,
        Self::Time,
        Self::Datetime,
    ];

    /// The lowercase name used in schema documents.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Select => "select",
            Self::Number => "number",
            Self::Textarea => "textarea",
            Self::Checkbox => "checkbox",
            Self::Tel => "tel",
            Self::Email => "email",
            Self::Date => "date",
            Self::Time => "time",
            Self::Datetime => "datetime",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`FieldType`] name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field type `{0}`")]
pub struct UnknownFieldType(pub String);

impl FromStr for FieldType {
    type Err = UnknownFieldType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownFieldType(s.to_string()))
    }
}

/// Display width hint for a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSize {
    /// Small (default).
    #[default]
    Sm,
    /// Medium.
    Md,
    /// Large.
    Lg,
    /// Full row.
    Full,
}

/// One entry of a select field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    /// Text shown to the user.
    pub label: String,
    /// Value stored when selected.
    pub value: Value,
}

impl FieldOption {
    /// Creates an option.
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// The active validity error of a field. At most one is reported at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field is empty.
    Required,
    /// The value is below the lower bound.
    Min {
        /// The bound that was violated.
        min: Value,
        /// The field's value.
        actual: Value,
    },
    /// The value is above the upper bound.
    Max {
        /// The bound that was violated.
        max: Value,
        /// The field's value.
        actual: Value,
    },
}

impl ValidationError {
    /// The error key (`required`, `min` or `max`).
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Min { .. } => "min",
            Self::Max { .. } => "max",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "value is required"),
            Self::Min { min, actual } => write!(f, "{actual} is less than minimum {min}"),
            Self::Max { max, actual } => write!(f, "{actual} is greater than maximum {max}"),
        }
    }
}

impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct MinBody<'a> {
            min: &'a Value,
            actual: &'a Value,
        }
        #[derive(Serialize)]
        struct MaxBody<'a> {
            max: &'a Value,
            actual: &'a Value,
        }

        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Required => map.serialize_entry("required", &true)?,
            Self::Min { min, actual } => map.serialize_entry("min", &MinBody { min, actual })?,
            Self::Max { max, actual } => map.serialize_entry("max", &MaxBody { max, actual })?,
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_type_round_trips_names() {
        for field_type in FieldType::ALL {
            assert_eq!(field_type.as_str().parse::<FieldType>(), Ok(field_type));
        }
        assert_eq!(
            "radio".parse::<FieldType>(),
            Err(UnknownFieldType("radio".to_string()))
        );
    }

    #[test]
    fn test_field_type_serde_matches_names() {
        assert_eq!(serde_json::to_value(FieldType::Datetime).unwrap(), json!("datetime"));
        assert_eq!(serde_json::to_value(FieldSize::Full).unwrap(), json!("full"));
    }

    #[test]
    fn test_validation_error_serialization() {
        let errors = vec![
            ValidationError::Required,
            ValidationError::Min {
                min: json!(3),
                actual: json!(1),
            },
            ValidationError::Max {
                max: json!(10),
                actual: json!(12),
            },
        ];
        insta::assert_snapshot!(
            serde_json::to_string(&errors).unwrap(),
            @r#"[{"required":true},{"min":{"min":3,"actual":1}},{"max":{"max":10,"actual":12}}]"#
        );
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::Max {
            max: json!(10),
            actual: json!(12),
        };
        assert_eq!(err.key(), "max");
        insta::assert_snapshot!(err.to_string(), @"12 is greater than maximum 10");
    }
}
