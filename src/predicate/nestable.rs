//! Implicit nesting for predicates on fields inside nested objects.
//!
//! The backend only evaluates a predicate on a nested field when the
//! predicate sits inside a `nested` clause naming the exact nested path, one
//! clause per nesting level. Callers are not required to write those clauses:
//! a [`NestablePredicate`] knows the chain of nested objects enclosing its
//! fields and, when built, adds whatever `nested` clauses are missing between
//! the ambient context and its own innermost nested path.
//!
//! ```text
//! hierarchy: [a, a.b, a.b.c]        ambient context: a
//!
//! {"nested": {"path": "a.b",
//!     "query": {"nested": {"path": "a.b.c",
//!         "query": <body built in context a.b.c>}}}}
//! ```

use log::debug;
use serde_json::{Value, json};

use crate::error::{NestorError, Result};
use crate::predicate::PredicateContext;

/// A predicate whose body must be evaluated inside its fields' nested context.
pub trait NestablePredicate {
    /// Nested paths enclosing the targeted fields, outermost first.
    fn nested_path_hierarchy(&self) -> &[String];

    /// Field paths reported when the predicate is misplaced.
    fn field_paths_for_error_message(&self) -> Vec<String>;

    /// Build the predicate body, assuming `context` is its innermost nested path.
    fn build_body(&self, context: &PredicateContext) -> Result<Value>;
}

/// Check that `predicate` may be used within `expected_parent_nested_path`.
///
/// The root (`None`) accepts every predicate. A nested path is only accepted
/// when it is one of the predicate's enclosing nested objects.
pub fn check_nestable_within<P>(predicate: &P, expected_parent_nested_path: Option<&str>) -> Result<()>
where
    P: NestablePredicate + ?Sized,
{
    if let Some(expected) = expected_parent_nested_path {
        let hierarchy = predicate.nested_path_hierarchy();
        if !hierarchy.iter().any(|path| path == expected) {
            return Err(NestorError::InvalidNestedPath {
                expected: expected.to_string(),
                field_paths: predicate.field_paths_for_error_message(),
            });
        }
    }
    Ok(())
}

/// Build `predicate` in `context`, adding the nested clauses it is missing.
pub fn build_nestable<P>(predicate: &P, context: &PredicateContext) -> Result<Value>
where
    P: NestablePredicate + ?Sized,
{
    let ambient = context.nested_path();
    check_nestable_within(predicate, ambient)?;

    let hierarchy = predicate.nested_path_hierarchy();
    let expected = hierarchy.last().map(String::as_str);

    if ambient == expected {
        return predicate.build_body(context);
    }

    let body = predicate.build_body(&context.with_nested_path(expected))?;
    let wrapped = wrap_in_nested(hierarchy, ambient, body);
    debug!(
        "Implicitly nested predicate on {:?} from {:?} down to {:?}",
        predicate.field_paths_for_error_message(),
        ambient,
        expected
    );
    Ok(wrapped)
}

/// Wrap `body` in one `nested` clause per level of `hierarchy` below `ambient`.
///
/// Levels are wrapped from the innermost outwards, stopping at the level the
/// ambient context already provides.
pub fn wrap_in_nested(hierarchy: &[String], ambient: Option<&str>, body: Value) -> Value {
    let mut result = body;
    for path in hierarchy.iter().rev() {
        if Some(path.as_str()) == ambient {
            break;
        }
        result = json!({
            "nested": {
                "path": path,
                "query": result,
            }
        });
    }
    result
}
