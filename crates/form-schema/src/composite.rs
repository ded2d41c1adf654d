//! State shared by groups and arrays.

use serde_json::Value;
use std::cell::{Cell, RefCell};

use form_schema_core::spec::Conditions;
use form_schema_core::{Emitter, EventStream};

use crate::error::TreeError;
use crate::node::{Node, NodeId, ParentRef, ValueChange};

pub(crate) struct CompositeCore {
    pub(crate) id: NodeId,
    pub(crate) key: Option<String>,
    pub(crate) conditions: Conditions,
    parent: RefCell<Option<ParentRef>>,
    emitter: Emitter<ValueChange>,
    user_roles: RefCell<Vec<String>>,
    disabled: Cell<bool>,
}

impl CompositeCore {
    pub(crate) fn new(key: Option<String>, conditions: Conditions) -> Self {
        Self {
            id: NodeId::next(),
            key,
            conditions,
            parent: RefCell::new(None),
            emitter: Emitter::new(),
            user_roles: RefCell::new(Vec::new()),
            disabled: Cell::new(false),
        }
    }

    pub(crate) fn parent_ref(&self) -> Option<ParentRef> {
        self.parent.borrow().clone()
    }

    pub(crate) fn set_parent_ref(&self, parent: Option<ParentRef>) {
        *self.parent.borrow_mut() = parent;
    }

    pub(crate) fn parent(&self) -> Option<Node> {
        self.parent_ref().and_then(|p| p.upgrade())
    }

    pub(crate) fn roles(&self) -> Vec<String> {
        self.user_roles.borrow().clone()
    }

    pub(crate) fn store_roles(&self, roles: &[String]) {
        *self.user_roles.borrow_mut() = roles.to_vec();
    }

    pub(crate) fn is_enabled(&self) -> bool {
        !self.disabled.get() && self.parent().map_or(true, |p| p.is_enabled())
    }

    pub(crate) fn set_disabled(&self, disabled: bool) {
        self.disabled.set(disabled);
    }

    pub(crate) fn value_changes(&self) -> EventStream<ValueChange> {
        self.emitter.stream()
    }

    /// Emits from this composite (computing the snapshot only when someone
    /// listens), then hands the change to the parent.
    pub(crate) fn bubble(&self, origin: NodeId, raw_value: impl FnOnce() -> Value) {
        if self.emitter.has_subscribers() {
            self.emitter.emit(&ValueChange {
                origin,
                value: raw_value(),
            });
        }
        if let Some(parent) = self.parent() {
            parent.bubble(origin);
        }
    }
}

/// Checks that `child` may be attached beneath the composite `parent`.
pub(crate) fn check_attach(parent: &Node, child: &Node) -> Result<(), TreeError> {
    if child.parent_ref().is_some() {
        return Err(TreeError::AlreadyAttached);
    }
    if matches!(child, Node::Field(_)) {
        return Ok(());
    }
    let mut current = Some(parent.clone());
    while let Some(node) = current {
        if node.id() == child.id() {
            return Err(TreeError::Cycle);
        }
        current = node.parent();
    }
    Ok(())
}

/// Sets every leaf below a composite that was just disabled or re-enabled.
pub(crate) fn cascade_enabled(node: &Node, enabled: bool) {
    node.for_each_leaf(&mut |field| {
        if enabled {
            field.sync_enabled_with_parent();
        } else {
            field.set_enabled_silently(false);
        }
    });
}

/// Walks a dotted path below `start`. Array children are addressed by index.
pub(crate) fn lookup(start: Node, path: &str) -> Option<Node> {
    path.split('.').try_fold(start, |node, segment| match &node {
        Node::Group(group) => group.child(segment),
        Node::Array(array) => segment.parse::<usize>().ok().and_then(|i| array.at(i)),
        Node::Field(_) => None,
    })
}
