//! Sandboxed expression language for field conditions and computed values.
//!
//! Expressions are a small subset of JavaScript expression syntax. There are
//! no globals, no function calls and no assignment: the only names an
//! expression can see are the ones passed in [`Bindings`].
//!
//! # Architecture
//!
//! ```text
//! source text
//!   ↓ parser (nom combinators, nesting capped)
//! AST  ──  Expression
//!   ↓ eval (against Bindings)
//! ExprValue
//! ```
//!
//! # Example
//!
//! ```
//! use form_schema_core::expr::{Bindings, ExpressionEvaluator};
//!
//! let evaluator = ExpressionEvaluator::new();
//! let bindings = Bindings::new().with("data.age", 21.0);
//! assert!(evaluator.evaluate_boolean(Some("data.age >= 18"), &bindings, false));
//! assert!(evaluator.evaluate_boolean(Some("data.age >="), &bindings, true));
//! ```

mod eval;
mod parser;
mod value;

pub use eval::{Bindings, Expression};
pub use value::ExprValue;

/// Errors from compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// The source text is not a valid expression.
    #[error("parse error at offset {offset}: {message}")]
    Parse {
        /// Byte offset of the offending token.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// Evaluation failed, e.g. reading a property of `undefined`.
    #[error("type error: {message}")]
    Type {
        /// What went wrong.
        message: String,
    },
}

/// Stateless evaluator for condition and value expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    /// Creates an evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parses `source` into a reusable [`Expression`].
    ///
    /// # Errors
    ///
    /// Returns [`ExprError::Parse`] if the text is not a valid expression.
    pub fn compile(&self, source: &str) -> Result<Expression, ExprError> {
        parser::parse(source).map(|ast| Expression::new(source, ast))
    }

    /// Evaluates a condition.
    ///
    /// An absent or blank expression yields `fallback` without parsing. Any
    /// parse or evaluation error also yields `fallback`. Non-boolean results
    /// are converted by truthiness.
    #[must_use]
    pub fn evaluate_boolean(
        &self,
        expression: Option<&str>,
        bindings: &Bindings,
        fallback: bool,
    ) -> bool {
        let Some(source) = expression.filter(|s| !s.trim().is_empty()) else {
            return fallback;
        };
        self.evaluate_value(source, bindings)
            .map_or(fallback, |value| value.is_truthy())
    }

    /// Evaluates an expression to a value.
    ///
    /// # Errors
    ///
    /// Returns the parse or evaluation error. Callers in the engine treat an
    /// error as "no value".
    pub fn evaluate_value(&self, source: &str, bindings: &Bindings) -> Result<ExprValue, ExprError> {
        self.compile(source)?.evaluate(bindings)
    }
}
