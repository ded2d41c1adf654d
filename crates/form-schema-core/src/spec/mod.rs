//! Declarative form specifications.
//!
//! # Architecture
//!
//! ```text
//! JSON / TOML text
//!   ↓ parse into serde_json::Value
//! shape classification (loader)
//!   ↓ serde (DTO layer) + validate
//! GroupSpec / ArraySpec / FieldSpec (pure model)
//! ```
//!
//! Specs can also be written directly in Rust with the `with_*` builders on
//! [`FieldSpec`], [`GroupSpec`] and [`ArraySpec`].

use std::path::Path;

pub mod dto;
pub mod loader;
pub mod model;

pub use loader::LoadError;
pub use model::{
    ArraySpec, Bound, Conditions, FieldSpec, GroupSpec, ModelError, Permissions, SchemaEntry,
    ValueRule, Validators,
};

/// Parses a JSON schema document into a root group.
///
/// # Errors
///
/// Returns an error if the JSON is invalid or the document does not describe
/// a group.
pub fn load_from_json_str(content: &str) -> Result<GroupSpec, LoadError> {
    let document: serde_json::Value = serde_json::from_str(content)?;
    loader::load_group(&document)
}

/// Parses a TOML schema document into a root group.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or the document does not describe
/// a group.
pub fn load_from_toml_str(content: &str) -> Result<GroupSpec, LoadError> {
    let document: serde_json::Value = toml::from_str(content)?;
    loader::load_group(&document)
}

/// Loads a schema file, choosing the format by extension (`.json` or `.toml`).
///
/// # Errors
///
/// Returns an error if the file cannot be read, has another extension, or
/// fails to load.
pub fn load_from_file(path: &Path) -> Result<GroupSpec, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let loader: fn(&str) -> Result<GroupSpec, LoadError> = match extension.as_deref() {
        Some("json") => load_from_json_str,
        Some("toml") => load_from_toml_str,
        _ => {
            return Err(LoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    loader(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_json_str() {
        let group = load_from_json_str(r#"{ "fields": { "name": { "key": "name" } } }"#).unwrap();
        assert_eq!(group.fields.len(), 1);
    }

    #[test]
    fn test_load_from_toml_str() {
        let group = load_from_toml_str(
            r#"
key = "person"

[fields.age]
key = "age"
type = "number"
dependencies = ["this"]

[fields.age.validators]
max = 120
"#,
        )
        .unwrap();
        assert_eq!(group.key.as_deref(), Some("person"));
        let SchemaEntry::Field(age) = &group.fields[0].1 else {
            panic!("expected a field");
        };
        assert_eq!(age.validators.max, Some(Bound::Literal(serde_json::json!(120))));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(load_from_json_str("{"), Err(LoadError::Json(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_from_file(Path::new("schema.yaml")).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"unsupported schema file schema.yaml");
    }
}
