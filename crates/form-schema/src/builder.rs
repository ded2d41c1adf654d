//! Builds live trees from specifications.

use std::path::Path;
use std::sync::Arc;

use form_schema_core::spec::{self, ArraySpec, FieldSpec, GroupSpec, SchemaEntry};
use form_schema_core::EngineConfig;

use crate::array::ArrayNode;
use crate::error::{BuildError, TreeError};
use crate::field::FieldNode;
use crate::group::GroupNode;
use crate::node::Node;

/// Input accepted by [`SchemaBuilder::build`]: a specification to build, or an
/// existing node to pass through unchanged.
#[derive(Debug)]
pub enum BuildEntry {
    /// Build a new node.
    Spec(SchemaEntry),
    /// Use this node as-is.
    Node(Node),
}

impl From<SchemaEntry> for BuildEntry {
    fn from(entry: SchemaEntry) -> Self {
        Self::Spec(entry)
    }
}

impl From<FieldSpec> for BuildEntry {
    fn from(spec: FieldSpec) -> Self {
        Self::Spec(SchemaEntry::Field(spec))
    }
}

impl From<GroupSpec> for BuildEntry {
    fn from(spec: GroupSpec) -> Self {
        Self::Spec(SchemaEntry::Group(spec))
    }
}

impl From<ArraySpec> for BuildEntry {
    fn from(spec: ArraySpec) -> Self {
        Self::Spec(SchemaEntry::Array(spec))
    }
}

impl From<Node> for BuildEntry {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

/// Creates fields, groups and arrays that share one engine configuration and
/// start out with the same user roles.
///
/// # Example
///
/// ```
/// use form_schema::{SchemaBuilder, spec::{FieldSpec, GroupSpec}};
///
/// let form = SchemaBuilder::new()
///     .with_user_roles(["editor"])
///     .group(&GroupSpec::new().field(FieldSpec::new("title").required()))
///     .unwrap();
/// assert_eq!(form.user_roles(), vec!["editor".to_string()]);
/// assert!(!form.field("title").unwrap().is_valid());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    config: Arc<EngineConfig>,
    user_roles: Vec<String>,
}

impl SchemaBuilder {
    /// Creates a builder with the default configuration and no roles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `config` for every field built from now on.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Gives every built group and array these roles.
    #[must_use]
    pub fn with_user_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// The configuration handed to built fields.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builds a node of the matching kind. Existing nodes pass through.
    ///
    /// # Errors
    ///
    /// Returns an error if children cannot be attached.
    pub fn build(&self, entry: impl Into<BuildEntry>) -> Result<Node, TreeError> {
        match entry.into() {
            BuildEntry::Node(node) => Ok(node),
            BuildEntry::Spec(SchemaEntry::Field(spec)) => Ok(Node::Field(self.control(spec))),
            BuildEntry::Spec(SchemaEntry::Group(spec)) => self.group(&spec).map(Node::Group),
            BuildEntry::Spec(SchemaEntry::Array(spec)) => self.array(&spec).map(Node::Array),
        }
    }

    /// Builds a group and its whole subtree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DuplicateKey`] if two children share a name.
    pub fn group(&self, spec: &GroupSpec) -> Result<GroupNode, TreeError> {
        let group = GroupNode::with_conditions(spec.key.clone(), spec.conditions.clone());
        if !self.user_roles.is_empty() {
            group.set_user_roles(&self.user_roles);
        }
        for (name, entry) in &spec.fields {
            group.add_control(name.clone(), self.entry(entry)?)?;
        }
        tracing::debug!(key = ?spec.key, controls = group.len(), "group built");
        Ok(group)
    }

    /// Builds an array and its whole subtree.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested group has duplicate names.
    pub fn array(&self, spec: &ArraySpec) -> Result<ArrayNode, TreeError> {
        let array = ArrayNode::with_conditions(spec.key.clone(), spec.conditions.clone());
        if !self.user_roles.is_empty() {
            array.set_user_roles(&self.user_roles);
        }
        for entry in &spec.fields {
            array.push(self.entry(entry)?)?;
        }
        Ok(array)
    }

    /// Builds a detached field carrying the builder's roles, if any.
    #[must_use]
    pub fn control(&self, spec: FieldSpec) -> FieldNode {
        let field = FieldNode::with_config(spec, Arc::clone(&self.config));
        if !self.user_roles.is_empty() {
            field.set_user_roles(&self.user_roles);
        }
        field
    }

    fn entry(&self, entry: &SchemaEntry) -> Result<Node, TreeError> {
        match entry {
            SchemaEntry::Field(spec) => Ok(Node::Field(self.control(spec.clone()))),
            SchemaEntry::Group(spec) => self.group(spec).map(Node::Group),
            SchemaEntry::Array(spec) => self.array(spec).map(Node::Array),
        }
    }

    // ──── documents ────

    /// Loads a JSON schema document and builds its root group.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Load`] if the document is invalid.
    pub fn group_from_json(&self, content: &str) -> Result<GroupNode, BuildError> {
        let spec = spec::load_from_json_str(content)?;
        Ok(self.group(&spec)?)
    }

    /// Loads a TOML schema document and builds its root group.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Load`] if the document is invalid.
    pub fn group_from_toml(&self, content: &str) -> Result<GroupNode, BuildError> {
        let spec = spec::load_from_toml_str(content)?;
        Ok(self.group(&spec)?)
    }

    /// Loads a `.json` or `.toml` schema file and builds its root group.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Load`] if the file cannot be read or parsed.
    pub fn group_from_file(&self, path: &Path) -> Result<GroupNode, BuildError> {
        let spec = spec::load_from_file(path)?;
        Ok(self.group(&spec)?)
    }
}
