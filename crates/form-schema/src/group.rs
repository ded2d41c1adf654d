//! Groups: composites with named children.

use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use form_schema_core::spec::Conditions;
use form_schema_core::EventStream;

use crate::composite::{cascade_enabled, check_attach, lookup, CompositeCore};
use crate::error::TreeError;
use crate::field::{is_container, FieldNode};
use crate::node::{Node, NodeId, ParentRef, ValueChange};

pub(crate) struct GroupInner {
    core: CompositeCore,
    children: RefCell<Vec<(String, Node)>>,
}

/// A composite whose children are addressed by name.
///
/// Its raw value is an object of every child's raw value, in insertion order.
#[derive(Clone)]
pub struct GroupNode {
    inner: Rc<GroupInner>,
}

impl GroupNode {
    /// Creates an empty, detached group.
    #[must_use]
    pub fn new() -> Self {
        Self::with_conditions(None, Conditions::default())
    }

    /// Creates an empty group with an optional key and its declared conditions.
    #[must_use]
    pub fn with_conditions(key: Option<String>, conditions: Conditions) -> Self {
        Self {
            inner: Rc::new(GroupInner {
                core: CompositeCore::new(key, conditions),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<GroupInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn core(&self) -> &CompositeCore {
        &self.inner.core
    }

    /// Identity of this group.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.core.id
    }

    /// The group's key, if it declared one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.inner.core.key.as_deref()
    }

    /// Conditions declared on the group. They are carried, not evaluated.
    #[must_use]
    pub fn conditions(&self) -> &Conditions {
        &self.inner.core.conditions
    }

    // ──── children ────

    /// Snapshot of the children, in insertion order.
    #[must_use]
    pub fn controls(&self) -> Vec<(String, Node)> {
        self.inner.children.borrow().clone()
    }

    fn child_nodes(&self) -> Vec<Node> {
        self.inner
            .children
            .borrow()
            .iter()
            .map(|(_, node)| node.clone())
            .collect()
    }

    /// Number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Returns true if the group has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.children.borrow().is_empty()
    }

    /// Returns true if a child is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.children.borrow().iter().any(|(n, _)| n == name)
    }

    /// The direct child registered under `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<Node> {
        self.inner
            .children
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node.clone())
    }

    /// Looks up a descendant by dotted path, e.g. `address.city` or
    /// `contacts.0.phone`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Node> {
        lookup(Node::Group(self.clone()), path)
    }

    /// Looks up a descendant field by dotted path.
    #[must_use]
    pub fn field(&self, path: &str) -> Option<FieldNode> {
        self.get(path).and_then(|node| node.as_field().cloned())
    }

    /// Attaches `child` under `name`, gives it this group's roles and
    /// publishes a change.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DuplicateKey`] if `name` is taken, or an error if
    /// `child` is already attached or is this group or one of its ancestors.
    pub fn add_control(&self, name: impl Into<String>, child: impl Into<Node>) -> Result<(), TreeError> {
        let name = name.into();
        let child = child.into();
        if self.contains(&name) {
            return Err(TreeError::DuplicateKey(name));
        }
        check_attach(&Node::Group(self.clone()), &child)?;

        child.set_user_roles(&self.inner.core.roles());
        child.set_parent(Some(self.parent_ref()));
        tracing::debug!(group = %self.id(), control = %name, "control added");
        self.inner.children.borrow_mut().push((name, child));
        self.publish();
        Ok(())
    }

    /// Replaces the child under `name` (or adds it if absent), re-runs its
    /// pass and publishes a change.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_control`], except that a name clash is a
    /// replacement.
    pub fn set_control(&self, name: impl Into<String>, child: impl Into<Node>) -> Result<(), TreeError> {
        let name = name.into();
        let child = child.into();
        let Some(previous) = self.child(&name) else {
            return self.add_control(name, child);
        };
        if previous.id() != child.id() {
            check_attach(&Node::Group(self.clone()), &child)?;
            previous.set_parent(None);
            child.set_user_roles(&self.inner.core.roles());
            child.set_parent(Some(self.parent_ref()));
            if let Some(slot) = self
                .inner
                .children
                .borrow_mut()
                .iter_mut()
                .find(|(n, _)| *n == name)
            {
                slot.1 = child.clone();
            }
            tracing::debug!(group = %self.id(), control = %name, "control replaced");
        }
        child.check_conditions_and_update_state(None);
        self.publish();
        Ok(())
    }

    /// Detaches and returns the child under `name`, publishing a change.
    pub fn remove_control(&self, name: &str) -> Option<Node> {
        let removed = {
            let mut children = self.inner.children.borrow_mut();
            let index = children.iter().position(|(n, _)| n == name)?;
            children.remove(index).1
        };
        removed.set_parent(None);
        tracing::debug!(group = %self.id(), control = %name, "control removed");
        self.publish();
        Some(removed)
    }

    // ──── values ────

    /// Object of every child's raw value, disabled children included.
    #[must_use]
    pub fn raw_value(&self) -> Value {
        let map: Map<String, Value> = self
            .controls()
            .into_iter()
            .map(|(name, node)| (name, node.raw_value()))
            .collect();
        Value::Object(map)
    }

    /// Loads the matching members of `value` into the children, then
    /// publishes one change. Members without a child are ignored.
    pub fn patch_value(&self, value: &Value) {
        self.patch_silently(value);
        self.publish();
    }

    pub(crate) fn patch_silently(&self, value: &Value) {
        let Value::Object(members) = value else {
            return;
        };
        for (name, child) in self.controls() {
            if let Some(member) = members.get(&name) {
                child.patch_silently(member);
            }
        }
    }

    /// Changes published by this group, including those bubbling up from
    /// descendants.
    #[must_use]
    pub fn value_changes(&self) -> EventStream<ValueChange> {
        self.inner.core.value_changes()
    }

    // ──── state ────

    /// Stores the acting user's roles and pushes them to every descendant.
    pub fn set_user_roles(&self, roles: &[String]) {
        self.inner.core.store_roles(roles);
        tracing::debug!(group = %self.id(), ?roles, "user roles updated");
        for child in self.child_nodes() {
            child.set_user_roles(roles);
        }
    }

    /// The acting user's roles.
    #[must_use]
    pub fn user_roles(&self) -> Vec<String> {
        self.inner.core.roles()
    }

    /// Re-runs every descendant field's pass against one snapshot: `data_src`
    /// when it is an object or array, the root's raw value otherwise.
    pub fn check_conditions_and_update_state(&self, data_src: Option<&Value>) {
        let snapshot = match data_src.filter(|v| is_container(v)) {
            Some(src) => src.clone(),
            None => Node::Group(self.clone()).root().raw_value(),
        };
        for child in self.child_nodes() {
            child.check_conditions_and_update_state(Some(&snapshot));
        }
    }

    /// Returns true unless this group or an ancestor is disabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.core.is_enabled()
    }

    /// Re-enables the group. Fields hidden by their own visibility stay
    /// disabled.
    pub fn enable(&self) {
        self.inner.core.set_disabled(false);
        cascade_enabled(&Node::Group(self.clone()), true);
        self.publish();
    }

    /// Disables the group and every descendant field.
    pub fn disable(&self) {
        self.inner.core.set_disabled(true);
        cascade_enabled(&Node::Group(self.clone()), false);
        self.publish();
    }

    /// All fields below this group, depth-first in child order.
    #[must_use]
    pub fn leaves(&self) -> Vec<FieldNode> {
        Node::Group(self.clone()).leaves()
    }

    pub(crate) fn for_each_leaf(&self, f: &mut dyn FnMut(&FieldNode)) {
        for child in self.child_nodes() {
            child.for_each_leaf(f);
        }
    }

    // ──── plumbing ────

    fn parent_ref(&self) -> ParentRef {
        ParentRef::Group(Rc::downgrade(&self.inner))
    }

    fn publish(&self) {
        self.bubble(self.id());
    }

    pub(crate) fn bubble(&self, origin: NodeId) {
        self.inner.core.bubble(origin, || self.raw_value());
    }
}

impl Default for GroupNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GroupNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .inner
            .children
            .borrow()
            .iter()
            .map(|(n, _)| n.clone())
            .collect();
        f.debug_struct("GroupNode")
            .field("id", &self.id())
            .field("key", &self.key())
            .field("controls", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use form_schema_core::spec::FieldSpec;
    use serde_json::json;

    fn group_of(names: &[&str]) -> GroupNode {
        let group = GroupNode::new();
        for name in names {
            group
                .add_control(*name, FieldNode::new(FieldSpec::new(*name)))
                .unwrap();
        }
        group
    }

    #[test]
    fn test_raw_value_keeps_insertion_order() {
        let group = group_of(&["b", "a"]);
        group.patch_value(&json!({ "a": 1, "b": 2, "ignored": 3 }));
        insta::assert_snapshot!(group.raw_value().to_string(), @r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let group = group_of(&["a"]);
        let err = group
            .add_control("a", FieldNode::new(FieldSpec::new("a")))
            .unwrap_err();
        assert_eq!(err, TreeError::DuplicateKey("a".to_string()));
    }

    #[test]
    fn test_attached_node_cannot_be_added_twice() {
        let group = group_of(&["a"]);
        let other = GroupNode::new();
        let a = group.child("a").unwrap();
        assert_eq!(other.add_control("a", a), Err(TreeError::AlreadyAttached));
    }

    #[test]
    fn test_group_cannot_contain_its_ancestor() {
        let outer = GroupNode::new();
        let inner = GroupNode::new();
        outer.add_control("inner", inner.clone()).unwrap();
        assert_eq!(inner.add_control("outer", outer.clone()), Err(TreeError::Cycle));

        let lone = GroupNode::new();
        assert_eq!(lone.add_control("self", lone.clone()), Err(TreeError::Cycle));
    }

    #[test]
    fn test_remove_control_detaches() {
        let group = group_of(&["a", "b"]);
        let removed = group.remove_control("a").unwrap();
        assert!(removed.parent().is_none());
        assert_eq!(group.len(), 1);
        assert!(group.remove_control("a").is_none());
    }

    #[test]
    fn test_set_control_replaces_in_place() {
        let group = group_of(&["a", "b"]);
        let old = group.child("a").unwrap();
        group
            .set_control("a", FieldNode::new(FieldSpec::new("a").with_default("new")))
            .unwrap();

        assert!(old.parent().is_none());
        insta::assert_snapshot!(group.raw_value().to_string(), @r#"{"a":"new","b":null}"#);
    }

    #[test]
    fn test_get_walks_dotted_paths() {
        let outer = GroupNode::new();
        let inner = group_of(&["city"]);
        outer.add_control("address", inner).unwrap();

        let city = outer.field("address.city").unwrap();
        assert_eq!(city.key(), "city");
        assert!(outer.get("address.zip").is_none());
        assert!(outer.get("address.city.deeper").is_none());
    }
}
