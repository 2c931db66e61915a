//! Explicit nested clauses.
//!
//! A [`NestedPredicate`] evaluates an inner predicate against the nested
//! documents of one nested object field. Nested objects enclosing that field
//! are still wrapped implicitly, like for any other nestable predicate.

use serde_json::{Value, json};

use crate::error::{NestorError, Result};
use crate::predicate::nestable::{self, NestablePredicate};
use crate::predicate::{PredicateContext, SearchPredicate};

/// A predicate evaluated within the documents of a nested object field.
#[derive(Debug, Clone)]
pub struct NestedPredicate {
    object_path: String,
    parent_hierarchy: Vec<String>,
    inner: Box<dyn SearchPredicate>,
}

impl NestedPredicate {
    /// Create a nested clause on `object_path`.
    ///
    /// `object_hierarchy` is the object's own nesting path hierarchy and must
    /// end with `object_path`. The inner predicate must only target fields
    /// enclosed in the object.
    pub fn new(
        object_path: impl Into<String>,
        object_hierarchy: &[String],
        inner: Box<dyn SearchPredicate>,
    ) -> Result<Self> {
        let object_path = object_path.into();
        let Some((last, parent_hierarchy)) = object_hierarchy.split_last() else {
            return Err(NestorError::invalid_argument(format!(
                "Object field '{object_path}' is not nested"
            )));
        };
        if *last != object_path {
            return Err(NestorError::invalid_argument(format!(
                "Object field '{object_path}' is not nested"
            )));
        }
        crate::util::path::validate_hierarchy(object_hierarchy)?;
        inner.check_nestable_within(Some(&object_path))?;

        Ok(NestedPredicate {
            object_path,
            parent_hierarchy: parent_hierarchy.to_vec(),
            inner,
        })
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }
}

impl NestablePredicate for NestedPredicate {
    fn nested_path_hierarchy(&self) -> &[String] {
        &self.parent_hierarchy
    }

    fn field_paths_for_error_message(&self) -> Vec<String> {
        vec![self.object_path.clone()]
    }

    fn build_body(&self, context: &PredicateContext) -> Result<Value> {
        let inner_context = context.with_nested_path(Some(&self.object_path));
        let query = self.inner.build(&inner_context)?;
        Ok(json!({
            "nested": {
                "path": self.object_path,
                "query": query,
            }
        }))
    }
}

impl SearchPredicate for NestedPredicate {
    fn check_nestable_within(&self, expected_parent_nested_path: Option<&str>) -> Result<()> {
        nestable::check_nestable_within(self, expected_parent_nested_path)
    }

    fn build(&self, context: &PredicateContext) -> Result<Value> {
        nestable::build_nestable(self, context)
    }

    fn clone_box(&self) -> Box<dyn SearchPredicate> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::boolean::BoolPredicate;
    use crate::predicate::field::{FieldPredicate, FieldPredicateKind};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn exists(path: &str, hierarchy: &[&str]) -> Box<dyn SearchPredicate> {
        Box::new(
            FieldPredicate::new(vec![path.to_string()], strings(hierarchy), FieldPredicateKind::Exists)
                .unwrap(),
        )
    }

    #[test]
    fn test_explicit_nested_at_root() {
        let predicate = NestedPredicate::new("a", &strings(&["a"]), exists("a.x", &["a"])).unwrap();
        assert_eq!(
            predicate.build(&PredicateContext::root()).unwrap(),
            json!({ "nested": { "path": "a", "query": { "exists": { "field": "a.x" } } } })
        );
    }

    #[test]
    fn test_inner_deeper_field_is_wrapped_once_more() {
        let predicate =
            NestedPredicate::new("a", &strings(&["a"]), exists("a.b.x", &["a", "a.b"])).unwrap();
        assert_eq!(
            predicate.build(&PredicateContext::root()).unwrap(),
            json!({
                "nested": {
                    "path": "a",
                    "query": {
                        "nested": {
                            "path": "a.b",
                            "query": { "exists": { "field": "a.b.x" } }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_nested_on_inner_object_wraps_ancestors() {
        let predicate = NestedPredicate::new(
            "a.b",
            &strings(&["a", "a.b"]),
            exists("a.b.x", &["a", "a.b"]),
        )
        .unwrap();
        assert_eq!(
            predicate.build(&PredicateContext::root()).unwrap(),
            json!({
                "nested": {
                    "path": "a",
                    "query": {
                        "nested": {
                            "path": "a.b",
                            "query": { "exists": { "field": "a.b.x" } }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_inner_predicate_outside_object_is_rejected() {
        let err = NestedPredicate::new("a", &strings(&["a"]), exists("b.x", &["b"])).unwrap_err();
        assert!(matches!(err, NestorError::InvalidNestedPath { .. }));

        let root_field = NestedPredicate::new("a", &strings(&["a"]), exists("title", &[]));
        assert!(root_field.is_err());
    }

    #[test]
    fn test_bool_inside_nested_checks_every_clause() {
        let mut inner = BoolPredicate::new();
        inner.add_clause(exists("a.x", &["a"]), crate::predicate::Occur::Must);
        inner.add_clause(exists("b.y", &["b"]), crate::predicate::Occur::Must);
        assert!(NestedPredicate::new("a", &strings(&["a"]), Box::new(inner)).is_err());
    }

    #[test]
    fn test_flattened_object_is_rejected() {
        assert!(NestedPredicate::new("a", &[], exists("a.x", &[])).is_err());
        assert!(NestedPredicate::new("a.c", &strings(&["a"]), exists("a.x", &["a"])).is_err());
    }
}
