//! Tree mutation and build errors.

use form_schema_core::spec::LoadError;

/// Errors from attaching, replacing or addressing children of a composite.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// A group already has a child with this name.
    #[error("a control named `{0}` already exists")]
    DuplicateKey(String),

    /// The node already has a parent.
    #[error("node is already attached to a parent")]
    AlreadyAttached,

    /// The node is the composite itself or one of its ancestors.
    #[error("cannot attach a node beneath itself")]
    Cycle,

    /// An array index past the end.
    #[error("index {index} is out of bounds for length {len}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// Current number of children.
        len: usize,
    },
}

/// Errors from building a tree out of a schema document.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The document could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The specification could not be assembled into a tree.
    #[error(transparent)]
    Tree(#[from] TreeError),
}
