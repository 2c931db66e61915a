//! Predicates on value fields.
//!
//! A [`FieldPredicate`] targets one or more value fields sharing the same
//! nesting path hierarchy, and is implicitly wrapped in the `nested` clauses
//! its fields require when built.

use serde_json::{Map, Value, json};

use crate::error::{NestorError, Result};
use crate::predicate::nestable::{self, NestablePredicate};
use crate::predicate::{PredicateContext, SearchPredicate, apply_boost};

/// One end of a range.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeBound {
    Unbounded,
    /// Encoded value, included in the range.
    Included(Value),
    /// Encoded value, excluded from the range.
    Excluded(Value),
}

/// What a [`FieldPredicate`] tests.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPredicateKind {
    /// Full-text or exact match, depending on the field type.
    Match {
        value: Value,
        fuzziness: Option<u8>,
    },
    /// Terms in order, at most `slop` positions apart.
    Phrase { phrase: String, slop: u32 },
    Range { lower: RangeBound, upper: RangeBound },
    /// `*` and `?` wildcards.
    Wildcard { pattern: String },
    /// The field has at least one value.
    Exists,
}

/// A predicate on value fields.
#[derive(Debug, Clone)]
pub struct FieldPredicate {
    field_paths: Vec<String>,
    nested_path_hierarchy: Vec<String>,
    kind: FieldPredicateKind,
    boost: Option<f32>,
}

impl FieldPredicate {
    /// Create a predicate on fields that all share `nested_path_hierarchy`.
    pub fn new(
        field_paths: Vec<String>,
        nested_path_hierarchy: Vec<String>,
        kind: FieldPredicateKind,
    ) -> Result<Self> {
        if field_paths.is_empty() {
            return Err(NestorError::invalid_argument(
                "A field predicate must target at least one field",
            ));
        }
        if field_paths.len() > 1 && !matches!(kind, FieldPredicateKind::Match { .. }) {
            return Err(NestorError::invalid_argument(
                "Only match predicates can target several fields",
            ));
        }
        crate::util::path::validate_hierarchy(&nested_path_hierarchy)?;

        Ok(FieldPredicate {
            field_paths,
            nested_path_hierarchy,
            kind,
            boost: None,
        })
    }

    /// Set the boost factor.
    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Set the slop of a phrase predicate; ignored for other kinds.
    pub fn slop(mut self, slop: u32) -> Self {
        if let FieldPredicateKind::Phrase { slop: current, .. } = &mut self.kind {
            *current = slop;
        }
        self
    }

    pub fn field_paths(&self) -> &[String] {
        &self.field_paths
    }

    pub fn kind(&self) -> &FieldPredicateKind {
        &self.kind
    }

    fn build_single(&self, path: &str) -> Value {
        match &self.kind {
            FieldPredicateKind::Match { value, fuzziness } => {
                let mut inner = Map::new();
                inner.insert("query".to_string(), value.clone());
                if let Some(fuzziness) = fuzziness {
                    inner.insert("fuzziness".to_string(), json!(fuzziness));
                }
                if let Some(boost) = self.boost {
                    inner.insert("boost".to_string(), Value::from(boost));
                }
                json!({ "match": { path: inner } })
            }
            FieldPredicateKind::Phrase { phrase, slop } => {
                let mut inner = Map::new();
                inner.insert("query".to_string(), json!(phrase));
                if *slop > 0 {
                    inner.insert("slop".to_string(), json!(slop));
                }
                if let Some(boost) = self.boost {
                    inner.insert("boost".to_string(), Value::from(boost));
                }
                json!({ "match_phrase": { path: inner } })
            }
            FieldPredicateKind::Range { lower, upper } => {
                let mut inner = Map::new();
                match lower {
                    RangeBound::Unbounded => {}
                    RangeBound::Included(v) => {
                        inner.insert("gte".to_string(), v.clone());
                    }
                    RangeBound::Excluded(v) => {
                        inner.insert("gt".to_string(), v.clone());
                    }
                }
                match upper {
                    RangeBound::Unbounded => {}
                    RangeBound::Included(v) => {
                        inner.insert("lte".to_string(), v.clone());
                    }
                    RangeBound::Excluded(v) => {
                        inner.insert("lt".to_string(), v.clone());
                    }
                }
                if let Some(boost) = self.boost {
                    inner.insert("boost".to_string(), Value::from(boost));
                }
                json!({ "range": { path: inner } })
            }
            FieldPredicateKind::Wildcard { pattern } => {
                let mut inner = Map::new();
                inner.insert("value".to_string(), json!(pattern));
                if let Some(boost) = self.boost {
                    inner.insert("boost".to_string(), Value::from(boost));
                }
                json!({ "wildcard": { path: inner } })
            }
            FieldPredicateKind::Exists => {
                apply_boost(json!({ "exists": { "field": path } }), self.boost)
            }
        }
    }
}

impl NestablePredicate for FieldPredicate {
    fn nested_path_hierarchy(&self) -> &[String] {
        &self.nested_path_hierarchy
    }

    fn field_paths_for_error_message(&self) -> Vec<String> {
        self.field_paths.clone()
    }

    fn build_body(&self, _context: &PredicateContext) -> Result<Value> {
        if let [path] = self.field_paths.as_slice() {
            return Ok(self.build_single(path));
        }

        // Several fields: any of them may match.
        let clauses: Vec<Value> = self
            .field_paths
            .iter()
            .map(|path| self.build_single(path))
            .collect();
        Ok(json!({ "bool": { "should": clauses, "minimum_should_match": 1 } }))
    }
}

impl SearchPredicate for FieldPredicate {
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
