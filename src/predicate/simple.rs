//! Predicates that do not target any field.
//!
//! These are valid in any context, including inside nested clauses, where
//! they apply to the nested documents.

use serde_json::{Value, json};

use crate::error::{NestorError, Result};
use crate::predicate::{PredicateContext, SearchPredicate, apply_boost};

/// Matches every document.
#[derive(Debug, Clone, Default)]
pub struct MatchAllPredicate {
    boost: Option<f32>,
}

impl MatchAllPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl SearchPredicate for MatchAllPredicate {
    fn check_nestable_within(&self, _expected_parent_nested_path: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn build(&self, _context: &PredicateContext) -> Result<Value> {
        Ok(apply_boost(json!({ "match_all": {} }), self.boost))
    }

    fn clone_box(&self) -> Box<dyn SearchPredicate> {
        Box::new(self.clone())
    }
}

/// Matches documents by identifier.
#[derive(Debug, Clone)]
pub struct IdPredicate {
    ids: Vec<String>,
}

impl IdPredicate {
    pub fn new<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(NestorError::invalid_argument(
                "An id predicate must match at least one identifier",
            ));
        }
        Ok(IdPredicate { ids })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

impl SearchPredicate for IdPredicate {
    fn check_nestable_within(&self, _expected_parent_nested_path: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn build(&self, _context: &PredicateContext) -> Result<Value> {
        Ok(json!({ "ids": { "values": self.ids } }))
    }

    fn clone_box(&self) -> Box<dyn SearchPredicate> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_all() {
        let context = PredicateContext::root().with_nested_path(Some("a"));
        assert!(MatchAllPredicate::new().check_nestable_within(Some("a")).is_ok());
        assert_eq!(
            MatchAllPredicate::new().boost(2.0).build(&context).unwrap(),
            json!({ "match_all": { "boost": 2.0 } })
        );
    }

    #[test]
    fn test_ids() {
        let predicate = IdPredicate::new(["1", "2"]).unwrap();
        assert_eq!(
            predicate.build(&PredicateContext::root()).unwrap(),
            json!({ "ids": { "values": ["1", "2"] } })
        );
        assert!(IdPredicate::new(Vec::<String>::new()).is_err());
    }
}
