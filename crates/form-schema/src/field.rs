//! Leaf fields and their recomputation pass.
//!
//! Every field follows the value changes of the root of the tree it lives in.
//! Each change re-runs one pass over the field:
//!
//! ```text
//! root value snapshot
//!   ↓ resolve declared dependencies
//! readonly → visibility (→ enable/disable) → required → derived value → validity
//! ```

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use form_schema_core::path;
use form_schema_core::spec::{Bound, FieldSpec};
use form_schema_core::{
    Bindings, Emitter, EngineConfig, EventStream, ExprValue, ExpressionEvaluator, FieldOption,
    FieldType, Observable, State, Subscription, ValidationError,
};

use crate::node::{Node, NodeId, ParentRef, ValueChange};

/// Where a field's options come from.
pub enum OptionsSource {
    /// A fixed list.
    Static(Vec<FieldOption>),
    /// A list that changes over time. The field mirrors every emission.
    Live(Observable<Vec<FieldOption>>),
}

impl From<Vec<FieldOption>> for OptionsSource {
    fn from(options: Vec<FieldOption>) -> Self {
        Self::Static(options)
    }
}

impl From<Observable<Vec<FieldOption>>> for OptionsSource {
    fn from(options: Observable<Vec<FieldOption>>) -> Self {
        Self::Live(options)
    }
}

pub(crate) struct FieldInner {
    id: NodeId,
    spec: FieldSpec,
    config: Arc<EngineConfig>,
    evaluator: ExpressionEvaluator,
    field_type: Cell<FieldType>,
    value: RefCell<Value>,
    enabled: Cell<bool>,

    readonly: State<bool>,
    visible: State<bool>,
    required: State<bool>,
    disabled: State<bool>,
    options: State<Vec<FieldOption>>,
    errors: State<Option<ValidationError>>,

    user_roles: RefCell<Vec<String>>,
    parent: RefCell<Option<ParentRef>>,
    emitter: Emitter<ValueChange>,
    root_subscription: RefCell<Option<Subscription>>,
    options_subscription: RefCell<Option<Subscription>>,

    pass_depth: Cell<u32>,
    writing_value: Cell<bool>,
}

/// A leaf of the form tree holding one value.
///
/// Cloning clones the handle; clones share the same field.
#[derive(Clone)]
pub struct FieldNode {
    inner: Rc<FieldInner>,
}

impl FieldNode {
    /// Creates a detached field with the default engine configuration.
    #[must_use]
    pub fn new(spec: FieldSpec) -> Self {
        Self::with_config(spec, Arc::new(EngineConfig::default()))
    }

    /// Creates a detached field and runs its first pass.
    #[must_use]
    pub fn with_config(spec: FieldSpec, config: Arc<EngineConfig>) -> Self {
        let enabled = !spec.disabled;
        let inner = FieldInner {
            id: NodeId::next(),
            config,
            evaluator: ExpressionEvaluator::new(),
            field_type: Cell::new(spec.field_type),
            value: RefCell::new(spec.default_value.clone()),
            enabled: Cell::new(enabled),
            readonly: State::new(spec.readonly),
            visible: State::new(spec.visible),
            required: State::new(spec.validators.required),
            disabled: State::new(!enabled),
            options: State::new(spec.options.clone()),
            errors: State::new(None),
            user_roles: RefCell::new(spec.user_roles.clone()),
            parent: RefCell::new(None),
            emitter: Emitter::new(),
            root_subscription: RefCell::new(None),
            options_subscription: RefCell::new(None),
            pass_depth: Cell::new(0),
            writing_value: Cell::new(false),
            spec,
        };
        let node = Self {
            inner: Rc::new(inner),
        };
        node.follow_root();
        node.check_conditions_and_update_state(None);
        node
    }

    // ──── identity and specification ────

    /// Identity of this field.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// The field's key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.spec.key
    }

    /// The specification this field was built from.
    #[must_use]
    pub fn spec(&self) -> &FieldSpec {
        &self.inner.spec
    }

    /// The current input kind.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.inner.field_type.get()
    }

    /// Changes the input kind and re-runs the pass, since range checks only
    /// apply to numbers and dates.
    pub fn set_field_type(&self, field_type: FieldType) {
        self.inner.field_type.set(field_type);
        self.check_conditions_and_update_state(None);
    }

    /// The composite this field is attached to.
    #[must_use]
    pub fn parent(&self) -> Option<Node> {
        self.parent_ref().and_then(|p| p.upgrade())
    }

    /// The top-most ancestor, or this field if it is detached.
    #[must_use]
    pub fn root(&self) -> Node {
        Node::Field(self.clone()).root()
    }

    // ──── value ────

    /// The current value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Stores `value` and publishes a change, even if the value is unchanged.
    pub fn set_value(&self, value: impl Into<Value>) {
        self.store_value(value.into());
        self.publish();
    }

    /// Changes published by this field.
    #[must_use]
    pub fn value_changes(&self) -> EventStream<ValueChange> {
        self.inner.emitter.stream()
    }

    // ──── observable state ────

    /// Whether the field is read-only.
    #[must_use]
    pub fn readonly(&self) -> Observable<bool> {
        self.inner.readonly.observable()
    }

    /// Whether the field is shown.
    #[must_use]
    pub fn visible(&self) -> Observable<bool> {
        self.inner.visible.observable()
    }

    /// Whether a value is required.
    #[must_use]
    pub fn required(&self) -> Observable<bool> {
        self.inner.required.observable()
    }

    /// Whether the field is disabled. Always the negation of [`Self::is_enabled`].
    #[must_use]
    pub fn disabled(&self) -> Observable<bool> {
        self.inner.disabled.observable()
    }

    /// The selectable options.
    #[must_use]
    pub fn options(&self) -> Observable<Vec<FieldOption>> {
        self.inner.options.observable()
    }

    /// The active validity error.
    #[must_use]
    pub fn errors(&self) -> Observable<Option<ValidationError>> {
        self.inner.errors.observable()
    }

    /// The active validity error, if any.
    #[must_use]
    pub fn error(&self) -> Option<ValidationError> {
        self.inner.errors.get()
    }

    /// Returns true when no validity error is active.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error().is_none()
    }

    /// Replaces the options. A live source is mirrored until the next call.
    pub fn set_options(&self, source: impl Into<OptionsSource>) {
        match source.into() {
            OptionsSource::Static(options) => {
                self.inner.options_subscription.replace(None);
                self.inner.options.set(options);
            }
            OptionsSource::Live(observable) => {
                let target = self.inner.options.clone();
                let subscription = observable.subscribe(move |options| {
                    target.set(options.clone());
                });
                self.inner.options_subscription.replace(Some(subscription));
            }
        }
    }

    // ──── roles and enablement ────

    /// The acting user's roles.
    #[must_use]
    pub fn user_roles(&self) -> Vec<String> {
        self.inner.user_roles.borrow().clone()
    }

    /// Stores the acting user's roles and re-runs the pass.
    pub fn set_user_roles(&self, roles: &[String]) {
        *self.inner.user_roles.borrow_mut() = roles.to_vec();
        self.check_conditions_and_update_state(None);
    }

    /// Returns true if the field takes part in validation.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    /// Enables the field and publishes a change.
    pub fn enable(&self) {
        self.set_enabled_silently(true);
        self.publish();
    }

    /// Disables the field, clears its error and publishes a change.
    pub fn disable(&self) {
        self.set_enabled_silently(false);
        self.publish();
    }

    // ──── recomputation ────

    /// Runs one recomputation pass.
    ///
    /// `data_src` replaces the root snapshot when it is an object or array.
    /// Passes nested deeper than the configured limit are skipped.
    pub fn check_conditions_and_update_state(&self, data_src: Option<&Value>) {
        let inner = &self.inner;
        let depth = inner.pass_depth.get();
        if depth >= inner.config.max_pass_depth {
            tracing::warn!(
                field = %inner.spec.key,
                depth,
                "skipping recomputation pass nested too deeply"
            );
            return;
        }
        inner.pass_depth.set(depth + 1);
        self.run_pass(data_src);
        inner.pass_depth.set(depth);
    }

    fn run_pass(&self, data_src: Option<&Value>) {
        let snapshot = match data_src.filter(|v| is_container(v)) {
            Some(src) => Some(src.clone()),
            None => {
                let raw = self.root().raw_value();
                is_container(&raw).then_some(raw)
            }
        };
        let deps = snapshot.as_ref().map(|src| self.dependency_bindings(src));
        let deps = deps.as_ref();

        self.refresh_readonly(deps);
        self.refresh_visibility(deps);
        self.refresh_required(deps);
        self.refresh_value(deps);
        self.refresh_validity(deps);
    }

    fn has_deps(&self) -> bool {
        !self.inner.spec.dependencies.is_empty()
    }

    /// Each declared dependency (except the self token) resolved against the
    /// snapshot. Missing paths are `undefined`.
    fn dependency_bindings(&self, snapshot: &Value) -> Bindings {
        let token = self.inner.config.self_reference.as_str();
        self.inner
            .spec
            .dependencies
            .iter()
            .filter(|dep| !dep.is_empty() && dep.as_str() != token)
            .map(|dep| {
                let value = path::resolve(snapshot, dep).map_or(ExprValue::Undefined, ExprValue::from);
                (dep.clone(), value)
            })
            .collect()
    }

    /// Dependency bindings plus the field's own value under the self token,
    /// when the field declares it.
    fn condition_bindings(&self, deps: Option<&Bindings>) -> Bindings {
        let mut bindings = deps.cloned().unwrap_or_default();
        let token = &self.inner.config.self_reference;
        if self.inner.spec.dependencies.iter().any(|dep| dep == token) {
            let own = ExprValue::from(&*self.inner.value.borrow());
            bindings.insert(token.clone(), own);
        }
        bindings
    }

    fn condition(&self, expression: Option<&str>, deps: Option<&Bindings>, fallback: bool) -> bool {
        self.inner
            .evaluator
            .evaluate_boolean(expression, &self.condition_bindings(deps), fallback)
    }

    fn refresh_readonly(&self, deps: Option<&Bindings>) {
        let spec = &self.inner.spec;
        let can_write = spec.permissions.can_write(&self.inner.user_roles.borrow());
        let readonly = if !can_write {
            true
        } else if self.has_deps() && spec.conditions.readonly_if.is_some() {
            self.condition(spec.conditions.readonly_if.as_deref(), deps, spec.readonly)
        } else {
            spec.readonly
        };
        self.inner.readonly.set(readonly);
    }

    fn refresh_visibility(&self, deps: Option<&Bindings>) {
        let spec = &self.inner.spec;
        let can_read = spec.permissions.can_read(&self.inner.user_roles.borrow());
        let visible = if !can_read {
            false
        } else if self.has_deps() && spec.conditions.show_if.is_some() {
            self.condition(spec.conditions.show_if.as_deref(), deps, spec.visible)
        } else {
            spec.visible
        };
        if self.inner.visible.set(visible) {
            self.on_visibility_changed(visible);
        }
    }

    fn on_visibility_changed(&self, visible: bool) {
        if !self.inner.spec.disable_when_not_visible {
            return;
        }
        if !self.parent().map_or(true, |p| p.is_enabled()) {
            return;
        }
        if visible == self.is_enabled() {
            return;
        }
        tracing::debug!(field = %self.key(), visible, "visibility toggles enablement");
        self.set_enabled_silently(visible);
    }

    fn refresh_required(&self, deps: Option<&Bindings>) {
        let spec = &self.inner.spec;
        let required = if !self.has_deps() || !self.is_enabled() {
            spec.validators.required
        } else {
            self.condition(
                spec.conditions.required_if.as_deref(),
                deps,
                spec.validators.required,
            )
        };
        self.inner.required.set(required);
    }

    fn refresh_value(&self, deps: Option<&Bindings>) {
        let rules = &self.inner.spec.conditions.use_values_if;
        if !self.has_deps() || rules.is_empty() {
            return;
        }
        let bindings = self.condition_bindings(deps);
        let evaluator = &self.inner.evaluator;
        let Some(rule) = rules
            .iter()
            .find(|rule| evaluator.evaluate_boolean(rule.condition.as_deref(), &bindings, false))
        else {
            return;
        };
        let Some(candidate) = rule.value.as_ref() else {
            return;
        };
        let next = match (candidate, deps) {
            (Value::String(expression), Some(deps)) => {
                let Some(json) = evaluator
                    .evaluate_value(expression, deps)
                    .ok()
                    .and_then(|result| result.to_json())
                else {
                    return;
                };
                json
            }
            _ => candidate.clone(),
        };
        let unchanged = ExprValue::from(&next).loose_eq(&ExprValue::from(&*self.inner.value.borrow()));
        if unchanged {
            return;
        }
        self.write_derived_value(next);
    }

    /// Writes a derived value and publishes it. The field ignores the change
    /// it publishes itself while the write is in progress.
    fn write_derived_value(&self, value: Value) {
        let was_writing = self.inner.writing_value.replace(true);
        self.store_value(value);
        self.publish();
        self.inner.writing_value.set(was_writing);
    }

    fn refresh_validity(&self, deps: Option<&Bindings>) {
        if !self.is_enabled() {
            return;
        }
        let error = match self.field_type() {
            FieldType::Number | FieldType::Date => self.range_error(deps),
            _ => None,
        }
        .or_else(|| self.required_error());
        self.inner.errors.set(error);
    }

    fn range_error(&self, deps: Option<&Bindings>) -> Option<ValidationError> {
        let value = self.value();
        let actual = ExprValue::from(&value);
        let as_dates = self.field_type() == FieldType::Date;
        let validators = &self.inner.spec.validators;

        if let Some(min) = self.bound(validators.min.as_ref(), deps) {
            if !within(&actual, &min, as_dates, Ordering::is_ge) {
                return Some(ValidationError::Min {
                    min: min.to_json().unwrap_or(Value::Null),
                    actual: value,
                });
            }
        }
        if let Some(max) = self.bound(validators.max.as_ref(), deps) {
            if !within(&actual, &max, as_dates, Ordering::is_le) {
                return Some(ValidationError::Max {
                    max: max.to_json().unwrap_or(Value::Null),
                    actual: value,
                });
            }
        }
        None
    }

    /// Resolves a bound. Expression bounds need dependencies and a snapshot;
    /// an expression that fails or yields `undefined` imposes no bound.
    fn bound(&self, bound: Option<&Bound>, deps: Option<&Bindings>) -> Option<ExprValue> {
        match bound? {
            Bound::Literal(value) => Some(ExprValue::from(value)),
            Bound::Expression(source) => {
                if !self.has_deps() {
                    return None;
                }
                self.inner
                    .evaluator
                    .evaluate_value(source, deps?)
                    .ok()
                    .filter(|v| !v.is_undefined())
            }
        }
    }

    fn required_error(&self) -> Option<ValidationError> {
        let needed = !self.inner.readonly.get() && self.inner.required.get();
        (needed && is_empty(&self.inner.value.borrow())).then_some(ValidationError::Required)
    }

    fn publish(&self) {
        self.bubble(self.inner.id);
    }

    // ──── crate-internal plumbing ────

    pub(crate) fn parent_ref(&self) -> Option<ParentRef> {
        self.inner.parent.borrow().clone()
    }

    pub(crate) fn set_parent(&self, parent: Option<ParentRef>) {
        *self.inner.parent.borrow_mut() = parent;
        self.follow_root();
    }

    /// Subscribes to the value changes of the current root, dropping any
    /// previous subscription.
    pub(crate) fn follow_root(&self) {
        let weak = Rc::downgrade(&self.inner);
        let subscription = self.root().value_changes().subscribe(move |change| {
            if let Some(inner) = weak.upgrade() {
                FieldNode { inner }.on_value_change(change);
            }
        });
        self.inner.root_subscription.replace(Some(subscription));
    }

    fn on_value_change(&self, change: &ValueChange) {
        if self.inner.writing_value.get() && change.origin == self.inner.id {
            return;
        }
        self.check_conditions_and_update_state(None);
    }

    pub(crate) fn bubble(&self, origin: NodeId) {
        if self.inner.emitter.has_subscribers() {
            self.inner.emitter.emit(&ValueChange {
                origin,
                value: self.value(),
            });
        }
        if let Some(parent) = self.parent() {
            parent.bubble(origin);
        }
    }

    pub(crate) fn store_value(&self, value: Value) {
        *self.inner.value.borrow_mut() = value;
    }

    /// Enables or disables without publishing. Disabling clears the error.
    pub(crate) fn set_enabled_silently(&self, enabled: bool) {
        self.inner.enabled.set(enabled);
        self.inner.disabled.set(!enabled);
        if !enabled {
            self.inner.errors.set(None);
        }
    }

    /// After an ancestor is re-enabled. A field stays disabled while another
    /// ancestor is disabled or while it hides itself.
    pub(crate) fn sync_enabled_with_parent(&self) {
        let parent_enabled = self.parent().map_or(true, |p| p.is_enabled());
        let hidden = self.inner.spec.disable_when_not_visible && !self.inner.visible.get();
        self.set_enabled_silently(parent_enabled && !hidden);
    }
}

impl fmt::Debug for FieldNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldNode")
            .field("id", &self.inner.id)
            .field("key", &self.inner.spec.key)
            .field("type", &self.field_type())
            .field("value", &*self.inner.value.borrow())
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

pub(crate) fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// `null`, `false` and `""` count as empty. `0` does not.
fn is_empty(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Bool(false))
        || matches!(value, Value::String(s) if s.is_empty())
}

fn within(actual: &ExprValue, bound: &ExprValue, as_dates: bool, accept: fn(Ordering) -> bool) -> bool {
    let ordering = if as_dates {
        actual.compare_as_dates(bound)
    } else {
        actual.compare(bound)
    };
    ordering.is_some_and(accept)
}
