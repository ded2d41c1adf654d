//! The closed node variant and the plumbing shared by every node kind.

use serde_json::Value;
use std::fmt;
use std::rc::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use form_schema_core::EventStream;

use crate::array::{ArrayInner, ArrayNode};
use crate::field::FieldNode;
use crate::group::{GroupInner, GroupNode};

/// Process-unique identity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Published by a node (and re-published by each ancestor) when a value in
/// its subtree changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    /// The node whose change started the publication.
    pub origin: NodeId,
    /// Raw value of the publishing node at the time of publication.
    pub value: Value,
}

/// Weak link from a child to its composite parent.
#[derive(Clone)]
pub(crate) enum ParentRef {
    Group(Weak<GroupInner>),
    Array(Weak<ArrayInner>),
}

impl ParentRef {
    pub(crate) fn upgrade(&self) -> Option<Node> {
        match self {
            Self::Group(weak) => weak.upgrade().map(|inner| Node::Group(GroupNode::from_inner(inner))),
            Self::Array(weak) => weak.upgrade().map(|inner| Node::Array(ArrayNode::from_inner(inner))),
        }
    }
}

/// Any node of a live form tree.
///
/// Cloning a node clones a handle; both handles refer to the same node.
#[derive(Clone)]
pub enum Node {
    /// A leaf field.
    Field(FieldNode),
    /// Named children.
    Group(GroupNode),
    /// Indexed children.
    Array(ArrayNode),
}

impl Node {
    /// Identity of this node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::Field(n) => n.id(),
            Self::Group(n) => n.id(),
            Self::Array(n) => n.id(),
        }
    }

    /// Current raw value, including disabled fields.
    #[must_use]
    pub fn raw_value(&self) -> Value {
        match self {
            Self::Field(n) => n.value(),
            Self::Group(n) => n.raw_value(),
            Self::Array(n) => n.raw_value(),
        }
    }

    /// The composite this node is attached to.
    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        self.parent_ref().and_then(|p| p.upgrade())
    }

    /// The top-most ancestor, or this node if it is detached.
    #[must_use]
    pub fn root(&self) -> Node {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Value changes published by this node.
    #[must_use]
    pub fn value_changes(&self) -> EventStream<ValueChange> {
        match self {
            Self::Field(n) => n.value_changes(),
            Self::Group(n) => n.value_changes(),
            Self::Array(n) => n.value_changes(),
        }
    }

    /// Stores the acting user's roles on this node and all its descendants.
    pub fn set_user_roles(&self, roles: &[String]) {
        match self {
            Self::Field(n) => n.set_user_roles(roles),
            Self::Group(n) => n.set_user_roles(roles),
            Self::Array(n) => n.set_user_roles(roles),
        }
    }

    /// Re-runs the recomputation pass of every field in this subtree.
    pub fn check_conditions_and_update_state(&self, data_src: Option<&Value>) {
        match self {
            Self::Field(n) => n.check_conditions_and_update_state(data_src),
            Self::Group(n) => n.check_conditions_and_update_state(data_src),
            Self::Array(n) => n.check_conditions_and_update_state(data_src),
        }
    }

    /// Bulk-loads values, then publishes one change.
    pub fn patch_value(&self, value: &Value) {
        match self {
            Self::Field(n) => n.set_value(value.clone()),
            Self::Group(n) => n.patch_value(value),
            Self::Array(n) => n.patch_value(value),
        }
    }

    /// Returns true unless this node or an ancestor composite is disabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Field(n) => n.is_enabled(),
            Self::Group(n) => n.is_enabled(),
            Self::Array(n) => n.is_enabled(),
        }
    }

    /// Enables this node (and, for composites, its descendants).
    pub fn enable(&self) {
        match self {
            Self::Field(n) => n.enable(),
            Self::Group(n) => n.enable(),
            Self::Array(n) => n.enable(),
        }
    }

    /// Disables this node (and, for composites, its descendants).
    pub fn disable(&self) {
        match self {
            Self::Field(n) => n.disable(),
            Self::Group(n) => n.disable(),
            Self::Array(n) => n.disable(),
        }
    }

    /// All fields in this subtree, depth-first in child order.
    #[must_use]
    pub fn leaves(&self) -> Vec<FieldNode> {
        let mut out = Vec::new();
        self.for_each_leaf(&mut |field| out.push(field.clone()));
        out
    }

    /// Calls `f` for every field in this subtree, depth-first in child order.
    pub fn for_each_leaf(&self, f: &mut dyn FnMut(&FieldNode)) {
        match self {
            Self::Field(n) => f(n),
            Self::Group(n) => n.for_each_leaf(f),
            Self::Array(n) => n.for_each_leaf(f),
        }
    }

    /// Returns the field, if this is one.
    #[must_use]
    pub fn as_field(&self) -> Option<&FieldNode> {
        match self {
            Self::Field(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the group, if this is one.
    #[must_use]
    pub fn as_group(&self) -> Option<&GroupNode> {
        match self {
            Self::Group(n) => Some(n),
            _ => None,
        }
    }

    /// Returns the array, if this is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayNode> {
        match self {
            Self::Array(n) => Some(n),
            _ => None,
        }
    }

    // ──── crate-internal plumbing ────

    pub(crate) fn parent_ref(&self) -> Option<ParentRef> {
        match self {
            Self::Field(n) => n.parent_ref(),
            Self::Group(n) => n.core().parent_ref(),
            Self::Array(n) => n.core().parent_ref(),
        }
    }

    /// Links (or unlinks) this node and makes every field below it follow its
    /// new root.
    pub(crate) fn set_parent(&self, parent: Option<ParentRef>) {
        match self {
            Self::Field(n) => n.set_parent(parent),
            Self::Group(n) => {
                n.core().set_parent_ref(parent);
                n.for_each_leaf(&mut |field| field.follow_root());
            }
            Self::Array(n) => {
                n.core().set_parent_ref(parent);
                n.for_each_leaf(&mut |field| field.follow_root());
            }
        }
    }

    /// Publishes `origin`'s change from this node, then from each ancestor.
    pub(crate) fn bubble(&self, origin: NodeId) {
        match self {
            Self::Field(n) => n.bubble(origin),
            Self::Group(n) => n.bubble(origin),
            Self::Array(n) => n.bubble(origin),
        }
    }

    /// Stores a value without publishing anything.
    pub(crate) fn patch_silently(&self, value: &Value) {
        match self {
            Self::Field(n) => n.store_value(value.clone()),
            Self::Group(n) => n.patch_silently(value),
            Self::Array(n) => n.patch_silently(value),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(n) => fmt::Debug::fmt(n, f),
            Self::Group(n) => fmt::Debug::fmt(n, f),
            Self::Array(n) => fmt::Debug::fmt(n, f),
        }
    }
}

impl From<FieldNode> for Node {
    fn from(node: FieldNode) -> Self {
        Self::Field(node)
    }
}

impl From<GroupNode> for Node {
    fn from(node: GroupNode) -> Self {
        Self::Group(node)
    }
}

impl From<ArrayNode> for Node {
    fn from(node: ArrayNode) -> Self {
        Self::Array(node)
    }
}
