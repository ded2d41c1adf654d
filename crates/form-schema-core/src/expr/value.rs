//! Runtime values of the expression language.
//!
//! Semantics follow JavaScript expressions closely enough that conditions such
//! as `age >= '18'` or `flag == 1` behave the way form authors expect.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A value produced or consumed by an expression.
///
/// Unlike [`serde_json::Value`], this distinguishes `undefined` (a name or
/// property that does not exist) from `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExprValue {
    /// Absent value.
    #[default]
    Undefined,
    /// Explicit `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// IEEE-754 number.
    Number(f64),
    /// String.
    String(String),
    /// Array of values.
    Array(Vec<ExprValue>),
    /// Object with string keys.
    Object(BTreeMap<String, ExprValue>),
}

impl ExprValue {
    /// Returns true for `undefined` and `null`.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Returns true for `undefined`.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// JavaScript truthiness.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) => true,
        }
    }

    /// Numeric conversion (`Number(value)` in JavaScript).
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined | Self::Object(_) => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Array(_) => string_to_number(&self.to_js_string()),
        }
    }

    /// String conversion (`String(value)` in JavaScript).
    #[must_use]
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Strict equality (`===`).
    ///
    /// Values are snapshots without identity, so arrays and objects compare
    /// by structure: `[1] === [1]` is true here, unlike in JavaScript.
    #[must_use]
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Array(_) | Self::Object(_), Self::Array(_) | Self::Object(_)) => self == other,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other) && self == other,
        }
    }

    /// Loose equality (`==`).
    #[must_use]
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Self::Number(_), Self::String(_)) | (Self::String(_), Self::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Self::Bool(_), _) => Self::Number(self.to_number()).loose_eq(other),
            (_, Self::Bool(_)) => self.loose_eq(&Self::Number(other.to_number())),
            (Self::Array(_) | Self::Object(_), Self::Number(_) | Self::String(_)) => {
                Self::String(self.to_js_string()).loose_eq(other)
            }
            (Self::Number(_) | Self::String(_), Self::Array(_) | Self::Object(_)) => {
                self.loose_eq(&Self::String(other.to_js_string()))
            }
            _ => self.strict_eq(other),
        }
    }

    /// Relational comparison used by `<`, `<=`, `>` and `>=`.
    ///
    /// Returns `None` when the operands are not comparable (a `NaN` is
    /// involved), in which case every relational operator yields `false`.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        let lhs = self.to_primitive();
        let rhs = other.to_primitive();
        match (&lhs, &rhs) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            _ => lhs.to_number().partial_cmp(&rhs.to_number()),
        }
    }

    /// Like [`ExprValue::compare`], but when both sides are strings that parse
    /// as dates (`2024-05-01` or RFC 3339), compares them chronologically.
    #[must_use]
    pub fn compare_as_dates(&self, other: &Self) -> Option<Ordering> {
        if let (Self::String(a), Self::String(b)) = (self, other) {
            if let (Some(a), Some(b)) = (parse_date(a), parse_date(b)) {
                return Some(a.cmp(&b));
            }
        }
        self.compare(other)
    }

    /// Converts composite values to their primitive (string) form.
    fn to_primitive(&self) -> Self {
        match self {
            Self::Array(_) | Self::Object(_) => Self::String(self.to_js_string()),
            other => other.clone(),
        }
    }

    /// Addition (`+`), concatenating when either operand is a string.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let lhs = self.to_primitive();
        let rhs = other.to_primitive();
        if matches!(lhs, Self::String(_)) || matches!(rhs, Self::String(_)) {
            Self::String(format!("{}{}", lhs.to_js_string(), rhs.to_js_string()))
        } else {
            Self::Number(lhs.to_number() + rhs.to_number())
        }
    }

    /// Property access on a non-nullish value. Missing properties are `undefined`.
    #[must_use]
    pub fn property(&self, name: &str) -> Self {
        match self {
            Self::Object(map) => map.get(name).cloned().unwrap_or_default(),
            Self::Array(items) => {
                if name == "length" {
                    Self::Number(items.len() as f64)
                } else {
                    name.parse::<usize>()
                        .ok()
                        .and_then(|i| items.get(i).cloned())
                        .unwrap_or_default()
                }
            }
            Self::String(s) => {
                if name == "length" {
                    Self::Number(s.chars().count() as f64)
                } else {
                    name.parse::<usize>()
                        .ok()
                        .and_then(|i| s.chars().nth(i))
                        .map_or(Self::Undefined, |c| Self::String(c.to_string()))
                }
            }
            _ => Self::Undefined,
        }
    }

    /// Converts into JSON. `undefined` has no JSON form and yields `None`;
    /// non-finite numbers become `null`.
    #[must_use]
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Undefined => None,
            Self::Null => Some(Value::Null),
            Self::Bool(b) => Some(Value::Bool(*b)),
            Self::Number(n) => Some(number_to_json(*n)),
            Self::String(s) => Some(Value::String(s.clone())),
            Self::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json().unwrap_or(Value::Null))
                    .collect(),
            )),
            Self::Object(map) => Some(Value::Object(
                map.iter()
                    .filter_map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Map<_, _>>(),
            )),
        }
    }
}

impl From<&Value> for ExprValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for ExprValue {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

impl From<bool> for ExprValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ExprValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ExprValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf"/"nan" spellings that JavaScript rejects.
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_json(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::from(n as i64);
    }
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}
