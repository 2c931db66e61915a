//! Boolean predicate implementation for combining multiple predicates.

use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::predicate::{PredicateContext, SearchPredicate};

/// Occurrence requirements for boolean clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    /// The clause must match (equivalent to AND).
    Must,
    /// The clause should match (equivalent to OR).
    Should,
    /// The clause must not match (equivalent to NOT).
    MustNot,
    /// The clause must match but does not contribute to scoring.
    Filter,
}

impl Occur {
    fn key(&self) -> &'static str {
        match self {
            Occur::Must => "must",
            Occur::Should => "should",
            Occur::MustNot => "must_not",
            Occur::Filter => "filter",
        }
    }
}

/// A clause in a boolean predicate.
#[derive(Debug, Clone)]
pub struct BoolClause {
    pub predicate: Box<dyn SearchPredicate>,
    pub occur: Occur,
}

/// A predicate that combines other predicates with boolean logic.
///
/// Clauses are built in the same context as the boolean predicate itself, so
/// each clause adds the nested clauses it needs on its own.
#[derive(Debug, Clone, Default)]
pub struct BoolPredicate {
    clauses: Vec<BoolClause>,
    minimum_should_match: Option<u32>,
    boost: Option<f32>,
}

impl BoolPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> BoolPredicateBuilder {
        BoolPredicateBuilder::new()
    }

    pub fn add_clause(&mut self, predicate: Box<dyn SearchPredicate>, occur: Occur) {
        self.clauses.push(BoolClause { predicate, occur });
    }

    pub fn clauses(&self) -> &[BoolClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Get clauses by occurrence type.
    pub fn clauses_by_occur(&self, occur: Occur) -> Vec<&BoolClause> {
        self.clauses.iter().filter(|c| c.occur == occur).collect()
    }
}

impl SearchPredicate for BoolPredicate {
    fn check_nestable_within(&self, expected_parent_nested_path: Option<&str>) -> Result<()> {
        for clause in &self.clauses {
            clause.predicate.check_nestable_within(expected_parent_nested_path)?;
        }
        Ok(())
    }

    fn build(&self, context: &PredicateContext) -> Result<Value> {
        let mut inner = Map::new();
        for occur in [Occur::Must, Occur::Should, Occur::MustNot, Occur::Filter] {
            let built = self
                .clauses_by_occur(occur)
                .into_iter()
                .map(|clause| clause.predicate.build(context))
                .collect::<Result<Vec<Value>>>()?;
            if !built.is_empty() {
                inner.insert(occur.key().to_string(), Value::Array(built));
            }
        }
        if let Some(minimum) = self.minimum_should_match {
            inner.insert("minimum_should_match".to_string(), json!(minimum));
        }
        if let Some(boost) = self.boost {
            inner.insert("boost".to_string(), Value::from(boost));
        }
        Ok(json!({ "bool": inner }))
    }

    fn clone_box(&self) -> Box<dyn SearchPredicate> {
        Box::new(self.clone())
    }
}

/// Builder for creating boolean predicates.
#[derive(Debug, Default)]
pub struct BoolPredicateBuilder {
    predicate: BoolPredicate,
}

impl BoolPredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, predicate: impl SearchPredicate + 'static) -> Self {
        self.predicate.add_clause(Box::new(predicate), Occur::Must);
        self
    }

    pub fn should(mut self, predicate: impl SearchPredicate + 'static) -> Self {
        self.predicate.add_clause(Box::new(predicate), Occur::Should);
        self
    }

    pub fn must_not(mut self, predicate: impl SearchPredicate + 'static) -> Self {
        self.predicate.add_clause(Box::new(predicate), Occur::MustNot);
        self
    }

    pub fn filter(mut self, predicate: impl SearchPredicate + 'static) -> Self {
        self.predicate.add_clause(Box::new(predicate), Occur::Filter);
        self
    }

    pub fn minimum_should_match(mut self, minimum: u32) -> Self {
        self.predicate.minimum_should_match = Some(minimum);
        self
    }

    pub fn boost(mut self, boost: f32) -> Self {
        self.predicate.boost = Some(boost);
        self
    }

    pub fn build(self) -> BoolPredicate {
        self.predicate
    }
}
