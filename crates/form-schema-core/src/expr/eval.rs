//! Tree-walking evaluation of compiled expressions.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::parser::{Ast, BinaryOp, LogicalOp, UnaryOp};
use super::value::ExprValue;
use super::ExprError;

/// Variables visible to an expression.
///
/// Keys may be dotted paths (`"data.age"`): a name chain in the expression is
/// resolved against the longest bound prefix, and the remaining segments are
/// read as properties of that value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    vars: HashMap<String, ExprValue>,
}

impl Bindings {
    /// Creates an empty set of bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ExprValue>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`Bindings::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ExprValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Looks up an exact binding.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ExprValue> {
        self.vars.get(name)
    }

    /// Number of bound names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<ExprValue>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bindings = Self::new();
        for (k, v) in iter {
            bindings.insert(k, v);
        }
        bindings
    }
}

/// A parsed expression, reusable across evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Ast,
}

impl Expression {
    pub(crate) fn new(source: &str, ast: Ast) -> Self {
        Self {
            source: source.to_string(),
            ast,
        }
    }

    /// The source text this expression was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression against `bindings`.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Type`] when a property is read from `undefined` or
    /// `null`.
    pub fn evaluate(&self, bindings: &Bindings) -> Result<ExprValue, ExprError> {
        eval(&self.ast, bindings)
    }
}

fn eval(ast: &Ast, bindings: &Bindings) -> Result<ExprValue, ExprError> {
    match ast {
        Ast::Literal(value) => Ok(value.clone()),
        Ast::Path(segments) => resolve_path(segments, bindings),
        Ast::Member(object, name) => {
            let object = eval(object, bindings)?;
            member(&object, name)
        }
        Ast::Index(object, index) => {
            let object = eval(object, bindings)?;
            let key = eval(index, bindings)?;
            member(&object, &key.to_js_string())
        }
        Ast::Array(items) => items
            .iter()
            .map(|item| eval(item, bindings))
            .collect::<Result<Vec<_>, _>>()
            .map(ExprValue::Array),
        Ast::Unary(op, operand) => {
            let value = eval(operand, bindings)?;
            Ok(match op {
                UnaryOp::Not => ExprValue::Bool(!value.is_truthy()),
                UnaryOp::Neg => ExprValue::Number(-value.to_number()),
                UnaryOp::Plus => ExprValue::Number(value.to_number()),
            })
        }
        Ast::Binary(op, lhs, rhs) => {
            let lhs = eval(lhs, bindings)?;
            let rhs = eval(rhs, bindings)?;
            Ok(binary(*op, &lhs, &rhs))
        }
        Ast::Logical(op, lhs, rhs) => {
            let lhs = eval(lhs, bindings)?;
            let short_circuit = match op {
                LogicalOp::And => !lhs.is_truthy(),
                LogicalOp::Or => lhs.is_truthy(),
                LogicalOp::Nullish => !lhs.is_nullish(),
            };
            if short_circuit {
                Ok(lhs)
            } else {
                eval(rhs, bindings)
            }
        }
        Ast::Conditional(test, consequent, alternate) => {
            if eval(test, bindings)?.is_truthy() {
                eval(consequent, bindings)
            } else {
                eval(alternate, bindings)
            }
        }
    }
}

fn resolve_path(segments: &[String], bindings: &Bindings) -> Result<ExprValue, ExprError> {
    for split in (1..=segments.len()).rev() {
        let name = segments[..split].join(".");
        if let Some(bound) = bindings.get(&name) {
            let mut value = bound.clone();
            for segment in &segments[split..] {
                value = member(&value, segment)?;
            }
            return Ok(value);
        }
    }

    let mut value = ExprValue::Undefined;
    for segment in &segments[1..] {
        value = member(&value, segment)?;
    }
    Ok(value)
}

fn member(object: &ExprValue, name: &str) -> Result<ExprValue, ExprError> {
    if object.is_nullish() {
        return Err(ExprError::Type {
            message: format!("cannot read property `{name}` of {object}"),
        });
    }
    Ok(object.property(name))
}

fn binary(op: BinaryOp, lhs: &ExprValue, rhs: &ExprValue) -> ExprValue {
    let arithmetic = |f: fn(f64, f64) -> f64| ExprValue::Number(f(lhs.to_number(), rhs.to_number()));
    let relational = |accept: fn(Ordering) -> bool| {
        ExprValue::Bool(lhs.compare(rhs).is_some_and(accept))
    };

    match op {
        BinaryOp::Add => lhs.add(rhs),
        BinaryOp::Sub => arithmetic(|a, b| a - b),
        BinaryOp::Mul => arithmetic(|a, b| a * b),
        BinaryOp::Div => arithmetic(|a, b| a / b),
        BinaryOp::Rem => arithmetic(|a, b| a % b),
        BinaryOp::Lt => relational(Ordering::is_lt),
        BinaryOp::Le => relational(Ordering::is_le),
        BinaryOp::Gt => relational(Ordering::is_gt),
        BinaryOp::Ge => relational(Ordering::is_ge),
        BinaryOp::Eq => ExprValue::Bool(lhs.loose_eq(rhs)),
        BinaryOp::NotEq => ExprValue::Bool(!lhs.loose_eq(rhs)),
        BinaryOp::StrictEq => ExprValue::Bool(lhs.strict_eq(rhs)),
        BinaryOp::StrictNotEq => ExprValue::Bool(!lhs.strict_eq(rhs)),
    }
}
