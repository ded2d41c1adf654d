//! # form-schema-core
//!
//! Building blocks for declarative, reactive data-entry forms.
//!
//! This crate has no notion of a live form tree. It provides:
//!
//! - [`path`] for dotted lookups in JSON snapshots
//! - [`expr`], the sandboxed condition/value expression language
//! - [`observable`], single-threaded change-notification cells
//! - [`spec`], the declarative specification model and its JSON/TOML loader
//! - [`EngineConfig`], settings shared by every node of a tree
//!
//! ## Example
//!
//! ```
//! use form_schema_core::spec::load_from_json_str;
//!
//! let schema = load_from_json_str(r#"{
//!     "fields": {
//!         "age": { "key": "age", "type": "number", "validators": { "max": 120 } }
//!     }
//! }"#)?;
//! assert_eq!(schema.fields.len(), 1);
//! # Ok::<(), form_schema_core::spec::LoadError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod types;

pub mod expr;
pub mod observable;
pub mod path;
pub mod spec;

pub use config::{ConfigError, EngineConfig, DEFAULT_MAX_PASS_DEPTH, DEFAULT_SELF_REFERENCE};
pub use expr::{Bindings, ExprError, ExprValue, Expression, ExpressionEvaluator};
pub use observable::{Emitter, EventStream, Observable, State, Subscription};
pub use types::{FieldOption, FieldSize, FieldType, UnknownFieldType, ValidationError};
