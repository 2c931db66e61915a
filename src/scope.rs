//! Search scope over one or more indexes.
//!
//! A scope resolves field paths against every targeted index at once. A
//! field may be missing from some indexes, but wherever it is declared it
//! must have a compatible type and be enclosed in the same nested objects,
//! otherwise a single query could not address it.

use std::sync::Arc;

use crate::error::{NestorError, Result};
use crate::predicate::PredicateFactory;
use crate::projection::ProjectionFactory;
use crate::query::SearchQueryBuilder;
use crate::schema::{FieldDescriptor, FieldType, IndexSchema, ObjectStructure};
use crate::sort::SortFactory;

/// A value field as seen by the whole scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValueField {
    pub path: String,
    pub field_type: FieldType,
    pub nested_path_hierarchy: Vec<String>,
    pub multi_valued: bool,
}

/// An object field as seen by the whole scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedObjectField {
    pub path: String,
    pub structure: ObjectStructure,
    pub nested_path_hierarchy: Vec<String>,
}

/// The set of indexes a query targets.
#[derive(Debug, Clone)]
pub struct SearchScope {
    indexes: Vec<Arc<IndexSchema>>,
}

impl SearchScope {
    pub fn new(indexes: Vec<Arc<IndexSchema>>) -> Result<Self> {
        if indexes.is_empty() {
            return Err(NestorError::invalid_argument(
                "A search scope must target at least one index",
            ));
        }
        Ok(SearchScope { indexes })
    }

    /// A scope over a single index.
    pub fn single(index: Arc<IndexSchema>) -> Self {
        SearchScope {
            indexes: vec![index],
        }
    }

    pub fn indexes(&self) -> &[Arc<IndexSchema>] {
        &self.indexes
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indexes.iter().map(|i| i.name().to_string()).collect()
    }

    pub fn resolve_value_field(&self, path: &str) -> Result<ResolvedValueField> {
        let mut resolved: Option<ResolvedValueField> = None;

        for index in &self.indexes {
            let descriptor = match index.field(path) {
                Some(FieldDescriptor::Value(descriptor)) => descriptor,
                Some(FieldDescriptor::Object(_)) => {
                    return Err(NestorError::invalid_argument(format!(
                        "Field '{path}' is an object field in index '{}', not a value field",
                        index.name()
                    )));
                }
                None => continue,
            };

            match &resolved {
                None => {
                    resolved = Some(ResolvedValueField {
                        path: path.to_string(),
                        field_type: descriptor.field_type().clone(),
                        nested_path_hierarchy: descriptor.nested_path_hierarchy().to_vec(),
                        multi_valued: descriptor.is_multi_valued(),
                    });
                }
                Some(existing) => {
                    if !existing.field_type.is_dsl_compatible_with(descriptor.field_type()) {
                        return Err(NestorError::IncompatibleField {
                            field: path.to_string(),
                            reason: format!(
                                "type in index '{}' differs from the other indexes",
                                index.name()
                            ),
                        });
                    }
                    if existing.nested_path_hierarchy != descriptor.nested_path_hierarchy() {
                        return Err(NestorError::IncompatibleField {
                            field: path.to_string(),
                            reason: format!(
                                "nested structure in index '{}' differs from the other indexes",
                                index.name()
                            ),
                        });
                    }
                }
            }
        }

        resolved.ok_or_else(|| NestorError::unknown_field(path))
    }

    pub fn resolve_object_field(&self, path: &str) -> Result<ResolvedObjectField> {
        let mut resolved: Option<ResolvedObjectField> = None;

        for index in &self.indexes {
            let descriptor = match index.field(path) {
                Some(FieldDescriptor::Object(descriptor)) => descriptor,
                Some(FieldDescriptor::Value(_)) => {
                    return Err(NestorError::invalid_argument(format!(
                        "Field '{path}' is a value field in index '{}', not an object field",
                        index.name()
                    )));
                }
                None => continue,
            };

            let candidate = ResolvedObjectField {
                path: path.to_string(),
                structure: descriptor.structure(),
                nested_path_hierarchy: descriptor.nested_path_hierarchy().to_vec(),
            };
            match &resolved {
                None => resolved = Some(candidate),
                Some(existing) if *existing != candidate => {
                    return Err(NestorError::IncompatibleField {
                        field: path.to_string(),
                        reason: format!(
                            "object structure in index '{}' differs from the other indexes",
                            index.name()
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        resolved.ok_or_else(|| NestorError::unknown_field(path))
    }

    pub fn predicate(&self) -> PredicateFactory<'_> {
        PredicateFactory::new(self)
    }

    pub fn sort(&self) -> SortFactory<'_> {
        SortFactory::new(self)
    }

    pub fn projection(&self) -> ProjectionFactory<'_> {
        ProjectionFactory::new(self)
    }

    pub fn query(&self) -> SearchQueryBuilder {
        SearchQueryBuilder::new(self.index_names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    fn index(name: &str, nested: bool, field_type: FieldType) -> Arc<IndexSchema> {
        let structure = if nested {
            ObjectStructure::Nested
        } else {
            ObjectStructure::Flattened
        };
        Arc::new(
            IndexSchema::builder(name)
                .object("obj", structure, |o| o.field("value", field_type))
                .field(format!("only_in_{name}"), FieldType::keyword())
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_resolve_across_compatible_indexes() {
        let scope = SearchScope::new(vec![
            index("a", true, FieldType::keyword()),
            index("b", true, FieldType::keyword().projectable(false)),
        ])
        .unwrap();

        let field = scope.resolve_value_field("obj.value").unwrap();
        assert_eq!(field.nested_path_hierarchy, vec!["obj".to_string()]);

        // Declared in one index only.
        assert!(scope.resolve_value_field("only_in_b").is_ok());
        assert!(matches!(
            scope.resolve_value_field("nowhere"),
            Err(NestorError::UnknownField(_))
        ));
    }

    #[test]
    fn test_incompatible_types() {
        let scope = SearchScope::new(vec![
            index("a", true, FieldType::keyword()),
            index("b", true, FieldType::integer()),
        ])
        .unwrap();
        assert!(matches!(
            scope.resolve_value_field("obj.value"),
            Err(NestorError::IncompatibleField { .. })
        ));
    }

    #[test]
    fn test_incompatible_nesting() {
        let scope = SearchScope::new(vec![
            index("a", true, FieldType::keyword()),
            index("b", false, FieldType::keyword()),
        ])
        .unwrap();
        assert!(scope.resolve_value_field("obj.value").is_err());
        assert!(scope.resolve_object_field("obj").is_err());
    }

    #[test]
    fn test_kind_mismatch() {
        let scope = SearchScope::single(index("a", true, FieldType::keyword()));
        assert!(scope.resolve_value_field("obj").is_err());
        assert!(scope.resolve_object_field("obj.value").is_err());
        assert_eq!(
            scope.resolve_object_field("obj").unwrap().structure,
            ObjectStructure::Nested
        );
    }

    #[test]
    fn test_empty_scope() {
        assert!(SearchScope::new(vec![]).is_err());
    }
}
