//! Dotted-path lookups over JSON value snapshots.

use serde_json::Value;

/// Resolves a dotted path against a nested snapshot.
///
/// Only plain objects are traversed: arrays, `null` and scalars stop the walk.
/// An empty path (or an empty trailing segment) never resolves.
///
/// # Example
///
/// ```
/// use form_schema_core::path::resolve;
/// use serde_json::json;
///
/// let data = json!({ "person": { "age": 42 } });
/// assert_eq!(resolve(&data, "person.age"), Some(&json!(42)));
/// assert_eq!(resolve(&data, "person.name"), None);
/// ```
#[must_use]
pub fn resolve<'a>(snapshot: &'a Value, path: &str) -> Option<&'a Value> {
    let Value::Object(map) = snapshot else {
        return None;
    };

    match path.split_once('.') {
        None => {
            if path.is_empty() {
                None
            } else {
                map.get(path)
            }
        }
        Some((head, rest)) => map.get(head).and_then(|next| resolve(next, rest)),
    }
}

/// Resolves a dotted path, returning `fallback` when it does not resolve.
///
/// A key that exists is returned as-is, even when it holds `null`.
#[must_use]
pub fn resolve_or<'a>(snapshot: &'a Value, path: &str, fallback: &'a Value) -> &'a Value {
    resolve(snapshot, path).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_top_level() {
        let data = json!({ "name": "foo", "age": 18 });
        assert_eq!(resolve(&data, "name"), Some(&json!("foo")));
        assert_eq!(resolve(&data, "age"), Some(&json!(18)));
    }

    #[test]
    fn test_resolve_nested() {
        let data = json!({ "data": { "age1": 17, "inner": { "deep": true } } });
        assert_eq!(resolve(&data, "data.age1"), Some(&json!(17)));
        assert_eq!(resolve(&data, "data.inner.deep"), Some(&json!(true)));
    }

    #[test]
    fn test_resolve_existing_null_is_returned() {
        let data = json!({ "maybe": null });
        assert_eq!(resolve(&data, "maybe"), Some(&Value::Null));
        assert_eq!(resolve_or(&data, "maybe", &json!("fb")), &Value::Null);
    }

    #[test]
    fn test_resolve_missing_segments() {
        let data = json!({ "a": { "b": 1 } });
        assert_eq!(resolve(&data, "a.c"), None);
        assert_eq!(resolve(&data, "x.b"), None);
        assert_eq!(resolve(&data, "a.b.c"), None);
    }

    #[test]
    fn test_resolve_empty_paths() {
        let data = json!({ "a": { "b": 1 } });
        assert_eq!(resolve(&data, ""), None);
        assert_eq!(resolve(&data, "a."), None);
    }

    #[test]
    fn test_resolve_does_not_walk_arrays() {
        let data = json!({ "list": [{ "item": 1 }] });
        assert_eq!(resolve(&data, "list.0.item"), None);
        assert_eq!(resolve(&json!([1, 2]), "0"), None);
    }

    #[test]
    fn test_resolve_non_object_root() {
        assert_eq!(resolve(&Value::Null, "a"), None);
        assert_eq!(resolve(&json!("text"), "a"), None);
        assert_eq!(resolve_or(&json!(3), "a", &json!("fb")), &json!("fb"));
    }
}
