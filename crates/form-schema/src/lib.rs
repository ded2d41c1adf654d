//! Reactive, schema-driven form state.
//!
//! A form is a tree of [`FieldNode`]s, [`GroupNode`]s and [`ArrayNode`]s built
//! from a declarative specification. Every field follows the value changes of
//! its tree and recomputes its own state from the fields it depends on:
//!
//! - visibility, which also disables hidden fields
//! - read-only and required flags
//! - derived values
//! - the active validation error
//!
//! Permissions gate read and write access by the acting user's roles.
//!
//! # Example
//!
//! ```
//! use form_schema::SchemaBuilder;
//!
//! let form = SchemaBuilder::new()
//!     .group_from_json(
//!         r#"{
//!             "fields": {
//!                 "age": { "key": "age", "type": "number" },
//!                 "guardian": {
//!                     "key": "guardian",
//!                     "dependencies": ["age"],
//!                     "conditions": { "showIf": "age < 18" }
//!                 }
//!             }
//!         }"#,
//!     )
//!     .unwrap();
//!
//! let guardian = form.field("guardian").unwrap();
//! form.field("age").unwrap().set_value(12);
//! assert!(guardian.visible().get());
//!
//! form.field("age").unwrap().set_value(30);
//! assert!(!guardian.visible().get());
//! assert!(!guardian.is_enabled());
//! ```
//!
//! The tree is single-threaded: nodes are reference-counted handles and must
//! stay on the thread that built them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod array;
mod builder;
mod composite;
mod error;
mod field;
mod group;
mod node;

pub use form_schema_core::*;

pub use array::ArrayNode;
pub use builder::{BuildEntry, SchemaBuilder};
pub use error::{BuildError, TreeError};
pub use field::{FieldNode, OptionsSource};
pub use group::GroupNode;
pub use node::{Node, NodeId, ValueChange};
