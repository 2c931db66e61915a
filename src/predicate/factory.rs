//! Scope-bound predicate factory.
//!
//! Resolves field paths against a [`SearchScope`], checks that each field
//! supports the requested predicate, encodes values for the field type and
//! attaches the field's nesting path hierarchy to the predicate.

use crate::error::{NestorError, Result};
use crate::predicate::boolean::BoolPredicateBuilder;
use crate::predicate::field::{FieldPredicate, FieldPredicateKind, RangeBound};
use crate::predicate::nested::NestedPredicate;
use crate::predicate::simple::{IdPredicate, MatchAllPredicate};
use crate::predicate::SearchPredicate;
use crate::schema::{FieldKind, FieldValue, ObjectStructure};
use crate::scope::{ResolvedValueField, SearchScope};

const TEXT_PREDICATES: &str = "Text predicates";

/// Maximum edit distance accepted by fuzzy matches.
pub const MAX_FUZZINESS: u8 = 2;

/// Creates predicates for the fields of a scope.
///
/// ```
/// use std::sync::Arc;
/// use nestor::schema::{FieldType, IndexSchema, ObjectStructure};
/// use nestor::scope::SearchScope;
///
/// let schema = IndexSchema::builder("books")
///     .object("authors", ObjectStructure::Nested, |o| o.field("name", FieldType::keyword()))
///     .build()
///     .unwrap();
/// let scope = SearchScope::single(Arc::new(schema));
///
/// let f = scope.predicate();
/// let predicate = f.match_field("authors.name", "Tolkien").unwrap();
/// assert_eq!(predicate.field_paths(), ["authors.name"]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PredicateFactory<'a> {
    scope: &'a SearchScope,
}

impl<'a> PredicateFactory<'a> {
    pub fn new(scope: &'a SearchScope) -> Self {
        PredicateFactory { scope }
    }

    pub fn match_all(&self) -> MatchAllPredicate {
        MatchAllPredicate::new()
    }

    pub fn ids<I, S>(&self, ids: I) -> Result<IdPredicate>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IdPredicate::new(ids)
    }

    /// Match `value` on a single field.
    pub fn match_field(&self, path: &str, value: impl Into<FieldValue>) -> Result<FieldPredicate> {
        self.match_fields(&[path], value)
    }

    /// Match `value` on any of several fields.
    ///
    /// The fields must have the same kind and be enclosed in the same nested
    /// objects.
    pub fn match_fields(&self, paths: &[&str], value: impl Into<FieldValue>) -> Result<FieldPredicate> {
        let fields = self.resolve_all(paths)?;
        let first = &fields[0];
        for field in &fields {
            check_searchable(field)?;
            if field.field_type.kind() == FieldKind::GeoPoint {
                return Err(NestorError::unsupported_operation("Match predicates", &field.path));
            }
            if field.field_type.kind() != first.field_type.kind() {
                return Err(NestorError::invalid_argument(format!(
                    "Cannot match fields '{}' and '{}' at once: their types differ",
                    first.path, field.path
                )));
            }
        }

        let value = first.field_type.kind().encode(&first.path, &value.into())?;
        self.field_predicate(
            &fields,
            FieldPredicateKind::Match {
                value,
                fuzziness: None,
            },
        )
    }

    /// Match `text` on a text field, tolerating up to `fuzziness` edits.
    pub fn fuzzy_match(&self, path: &str, text: &str, fuzziness: u8) -> Result<FieldPredicate> {
        let field = self.resolve_text_field(path)?;
        if fuzziness > MAX_FUZZINESS {
            return Err(NestorError::invalid_argument(format!(
                "Invalid fuzziness {fuzziness}: must be at most {MAX_FUZZINESS}"
            )));
        }
        self.field_predicate(
            &[field],
            FieldPredicateKind::Match {
                value: text.into(),
                fuzziness: Some(fuzziness),
            },
        )
    }

    pub fn phrase(&self, path: &str, phrase: impl Into<String>) -> Result<FieldPredicate> {
        let field = self.resolve_text_field(path)?;
        self.field_predicate(
            &[field],
            FieldPredicateKind::Phrase {
                phrase: phrase.into(),
                slop: 0,
            },
        )
    }

    pub fn wildcard(&self, path: &str, pattern: impl Into<String>) -> Result<FieldPredicate> {
        let field = self.resolve_text_field(path)?;
        self.field_predicate(
            &[field],
            FieldPredicateKind::Wildcard {
                pattern: pattern.into(),
            },
        )
    }

    pub fn exists(&self, path: &str) -> Result<FieldPredicate> {
        let field = self.scope.resolve_value_field(path)?;
        check_searchable(&field)?;
        self.field_predicate(&[field], FieldPredicateKind::Exists)
    }

    /// Start a range predicate on `path`.
    pub fn range(&self, path: &str) -> Result<RangePredicateStep> {
        let field = self.scope.resolve_value_field(path)?;
        check_searchable(&field)?;
        if !field.field_type.kind().supports_range() {
            return Err(NestorError::unsupported_operation("Range predicates", &field.path));
        }
        Ok(RangePredicateStep { field })
    }

    pub fn bool(&self) -> BoolPredicateBuilder {
        BoolPredicateBuilder::new()
    }

    /// Evaluate `inner` within the documents of the nested object `object_path`.
    pub fn nested(
        &self,
        object_path: &str,
        inner: impl SearchPredicate + 'static,
    ) -> Result<NestedPredicate> {
        let object = self.scope.resolve_object_field(object_path)?;
        if object.structure != ObjectStructure::Nested {
            return Err(NestorError::invalid_argument(format!(
                "Object field '{object_path}' is flattened: nested predicates require a nested object"
            )));
        }
        NestedPredicate::new(object.path, &object.nested_path_hierarchy, Box::new(inner))
    }

    fn resolve_all(&self, paths: &[&str]) -> Result<Vec<ResolvedValueField>> {
        if paths.is_empty() {
            return Err(NestorError::invalid_argument(
                "A predicate must target at least one field",
            ));
        }
        paths
            .iter()
            .map(|path| self.scope.resolve_value_field(path))
            .collect()
    }

    fn resolve_text_field(&self, path: &str) -> Result<ResolvedValueField> {
        let field = self.scope.resolve_value_field(path)?;
        check_searchable(&field)?;
        if !field.field_type.kind().supports_text_predicates() {
            return Err(NestorError::unsupported_operation(TEXT_PREDICATES, &field.path));
        }
        Ok(field)
    }

    fn field_predicate(
        &self,
        fields: &[ResolvedValueField],
        kind: FieldPredicateKind,
    ) -> Result<FieldPredicate> {
        let hierarchy = fields[0].nested_path_hierarchy.clone();
        if let Some(conflicting) = fields.iter().find(|f| f.nested_path_hierarchy != hierarchy) {
            return Err(NestorError::invalid_argument(format!(
                "Fields '{}' and '{}' are enclosed in different nested objects",
                fields[0].path, conflicting.path
            )));
        }
        let paths = fields.iter().map(|f| f.path.clone()).collect();
        FieldPredicate::new(paths, hierarchy, kind)
    }
}

fn check_searchable(field: &ResolvedValueField) -> Result<()> {
    if field.field_type.is_searchable() {
        Ok(())
    } else {
        Err(NestorError::invalid_argument(format!(
            "Field '{}' is not searchable",
            field.path
        )))
    }
}

/// A range predicate waiting for its bounds.
#[derive(Debug, Clone)]
pub struct RangePredicateStep {
    field: ResolvedValueField,
}

impl RangePredicateStep {
    /// `value <= field`
    pub fn at_least(self, value: impl Into<FieldValue>) -> Result<FieldPredicate> {
        let lower = RangeBound::Included(self.encode(value)?);
        self.finish(lower, RangeBound::Unbounded)
    }

    /// `value < field`
    pub fn greater_than(self, value: impl Into<FieldValue>) -> Result<FieldPredicate> {
        let lower = RangeBound::Excluded(self.encode(value)?);
        self.finish(lower, RangeBound::Unbounded)
    }

    /// `field <= value`
    pub fn at_most(self, value: impl Into<FieldValue>) -> Result<FieldPredicate> {
        let upper = RangeBound::Included(self.encode(value)?);
        self.finish(RangeBound::Unbounded, upper)
    }

    /// `field < value`
    pub fn less_than(self, value: impl Into<FieldValue>) -> Result<FieldPredicate> {
        let upper = RangeBound::Excluded(self.encode(value)?);
        self.finish(RangeBound::Unbounded, upper)
    }

    /// `lower <= field <= upper`
    pub fn between(
        self,
        lower: impl Into<FieldValue>,
        upper: impl Into<FieldValue>,
    ) -> Result<FieldPredicate> {
        let lower = RangeBound::Included(self.encode(lower)?);
        let upper = RangeBound::Included(self.encode(upper)?);
        self.finish(lower, upper)
    }

    fn encode(&self, value: impl Into<FieldValue>) -> Result<serde_json::Value> {
        self.field
            .field_type
            .kind()
            .encode(&self.field.path, &value.into())
    }

    fn finish(self, lower: RangeBound, upper: RangeBound) -> Result<FieldPredicate> {
        FieldPredicate::new(
            vec![self.field.path],
            self.field.nested_path_hierarchy,
            FieldPredicateKind::Range { lower, upper },
        )
    }
}
