//! Arrays: composites with indexed children.

use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use form_schema_core::spec::Conditions;
use form_schema_core::EventStream;

use crate::composite::{cascade_enabled, check_attach, lookup, CompositeCore};
use crate::error::TreeError;
use crate::field::{is_container, FieldNode};
use crate::node::{Node, NodeId, ParentRef, ValueChange};

pub(crate) struct ArrayInner {
    core: CompositeCore,
    children: RefCell<Vec<Node>>,
}

/// A composite whose children are addressed by position.
#[derive(Clone)]
pub struct ArrayNode {
    inner: Rc<ArrayInner>,
}

impl ArrayNode {
    /// Creates an empty, detached array.
    #[must_use]
    pub fn new() -> Self {
        Self::with_conditions(None, Conditions::default())
    }

    /// Creates an empty array with an optional key and its declared conditions.
    #[must_use]
    pub fn with_conditions(key: Option<String>, conditions: Conditions) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                core: CompositeCore::new(key, conditions),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ArrayInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn core(&self) -> &CompositeCore {
        &self.inner.core
    }

    /// Identity of this array.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.core.id
    }

    /// The array's key, if it declared one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.inner.core.key.as_deref()
    }

    /// Conditions declared on the array. They are carried, not evaluated.
    #[must_use]
    pub fn conditions(&self) -> &Conditions {
        &self.inner.core.conditions
    }

    // ──── children ────

    /// Snapshot of the children.
    #[must_use]
    pub fn controls(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Returns true if the array has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.children.borrow().is_empty()
    }

    /// The child at `index`.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<Node> {
        self.inner.children.borrow().get(index).cloned()
    }

    /// Looks up a descendant by dotted path, e.g. `0.phone`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Node> {
        lookup(Node::Array(self.clone()), path)
    }

    /// Appends `child`.
    ///
    /// # Errors
    ///
    /// Returns an error if `child` is already attached or is this array or
    /// one of its ancestors.
    pub fn push(&self, child: impl Into<Node>) -> Result<(), TreeError> {
        let len = self.len();
        self.insert(len, child)
    }

    /// Inserts `child` at `index`, shifting later children.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IndexOutOfBounds`] if `index` is past the end,
    /// or the attachment errors of [`Self::push`].
    pub fn insert(&self, index: usize, child: impl Into<Node>) -> Result<(), TreeError> {
        let child = child.into();
        let len = self.len();
        if index > len {
            return Err(TreeError::IndexOutOfBounds { index, len });
        }
        check_attach(&Node::Array(self.clone()), &child)?;

        child.set_user_roles(&self.inner.core.roles());
        child.set_parent(Some(self.parent_ref()));
        tracing::debug!(array = %self.id(), index, "control inserted");
        self.inner.children.borrow_mut().insert(index, child);
        self.publish();
        Ok(())
    }

    /// Replaces the child at `index`, re-runs its pass and publishes a change.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IndexOutOfBounds`] if there is no child at
    /// `index`, or the attachment errors of [`Self::push`].
    pub fn set_control(&self, index: usize, child: impl Into<Node>) -> Result<(), TreeError> {
        let child = child.into();
        let Some(previous) = self.at(index) else {
            return Err(TreeError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        };
        if previous.id() != child.id() {
            check_attach(&Node::Array(self.clone()), &child)?;
            previous.set_parent(None);
            child.set_user_roles(&self.inner.core.roles());
            child.set_parent(Some(self.parent_ref()));
            if let Some(slot) = self.inner.children.borrow_mut().get_mut(index) {
                *slot = child.clone();
            }
            tracing::debug!(array = %self.id(), index, "control replaced");
        }
        child.check_conditions_and_update_state(None);
        self.publish();
        Ok(())
    }

    /// Detaches and returns the child at `index`, publishing a change.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::IndexOutOfBounds`] if there is no child at `index`.
    pub fn remove_at(&self, index: usize) -> Result<Node, TreeError> {
        let removed = {
            let mut children = self.inner.children.borrow_mut();
            let len = children.len();
            if index >= len {
                return Err(TreeError::IndexOutOfBounds { index, len });
            }
            children.remove(index)
        };
        removed.set_parent(None);
        tracing::debug!(array = %self.id(), index, "control removed");
        self.publish();
        Ok(removed)
    }

    // ──── values ────

    /// Array of every child's raw value, disabled children included.
    #[must_use]
    pub fn raw_value(&self) -> Value {
        Value::Array(self.controls().iter().map(Node::raw_value).collect())
    }

    /// Loads `value` element-wise into the children, then publishes one
    /// change. Extra elements are ignored.
    pub fn patch_value(&self, value: &Value) {
        self.patch_silently(value);
        self.publish();
    }

    pub(crate) fn patch_silently(&self, value: &Value) {
        let Value::Array(items) = value else {
            return;
        };
        for (child, item) in self.controls().iter().zip(items) {
            child.patch_silently(item);
        }
    }

    /// Changes published by this array, including those bubbling up from
    /// descendants.
    #[must_use]
    pub fn value_changes(&self) -> EventStream<ValueChange> {
        self.inner.core.value_changes()
    }

    // ──── state ────

    /// Stores the acting user's roles and pushes them to every descendant.
    pub fn set_user_roles(&self, roles: &[String]) {
        self.inner.core.store_roles(roles);
        tracing::debug!(array = %self.id(), ?roles, "user roles updated");
        for child in self.controls() {
            child.set_user_roles(roles);
        }
    }

    /// The acting user's roles.
    #[must_use]
    pub fn user_roles(&self) -> Vec<String> {
        self.inner.core.roles()
    }

    /// Re-runs every descendant field's pass against one snapshot.
    pub fn check_conditions_and_update_state(&self, data_src: Option<&Value>) {
        let snapshot = match data_src.filter(|v| is_container(v)) {
            Some(src) => src.clone(),
            None => Node::Array(self.clone()).root().raw_value(),
        };
        for child in self.controls() {
            child.check_conditions_and_update_state(Some(&snapshot));
        }
    }

    /// Returns true unless this array or an ancestor is disabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.core.is_enabled()
    }

    /// Re-enables the array. Fields hidden by their own visibility stay
    /// disabled.
    pub fn enable(&self) {
        self.inner.core.set_disabled(false);
        cascade_enabled(&Node::Array(self.clone()), true);
        self.publish();
    }

    /// Disables the array and every descendant field.
    pub fn disable(&self) {
        self.inner.core.set_disabled(true);
        cascade_enabled(&Node::Array(self.clone()), false);
        self.publish();
    }

    /// All fields below this array, depth-first in child order.
    #[must_use]
    pub fn leaves(&self) -> Vec<FieldNode> {
        Node::Array(self.clone()).leaves()
    }

    pub(crate) fn for_each_leaf(&self, f: &mut dyn FnMut(&FieldNode)) {
        for child in self.controls() {
            child.for_each_leaf(f);
        }
    }

    // ──── plumbing ────

    fn parent_ref(&self) -> ParentRef {
        ParentRef::Array(Rc::downgrade(&self.inner))
    }

    fn publish(&self) {
        self.bubble(self.id());
    }

    pub(crate) fn bubble(&self, origin: NodeId) {
        self.inner.core.bubble(origin, || self.raw_value());
    }
}

impl Default for ArrayNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArrayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayNode")
            .field("id", &self.id())
            .field("key", &self.key())
            .field("len", &self.len())
            .finish()
    }
}
