//! Search predicates.
//!
//! Predicates are built against a [`SearchScope`](crate::scope::SearchScope)
//! through a [`PredicateFactory`], composed freely, and rendered as
//! Elasticsearch query JSON in a [`PredicateContext`].
//!
//! # Module Structure
//!
//! - `nestable`: implicit nesting of predicates on nested fields
//! - `field`: match, phrase, range, wildcard and exists predicates
//! - `boolean`: boolean combination of predicates
//! - `nested`: explicit nested clauses
//! - `simple`: match-all and id predicates
//! - `factory`: scope-bound construction and validation

pub mod boolean;
pub mod factory;
pub mod field;
pub mod nestable;
pub mod nested;
pub mod simple;

use std::fmt::Debug;

use serde_json::Value;

use crate::error::Result;

pub use boolean::{BoolPredicate, BoolPredicateBuilder, Occur};
pub use factory::{PredicateFactory, RangePredicateStep};
pub use field::{FieldPredicate, FieldPredicateKind, RangeBound};
pub use nested::NestedPredicate;
pub use simple::{IdPredicate, MatchAllPredicate};

/// The context a predicate is being built in.
///
/// The nested path is the path of the closest enclosing `nested` clause, or
/// `None` at the root of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateContext {
    nested_path: Option<String>,
}

impl PredicateContext {
    /// The context of the query root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn nested_path(&self) -> Option<&str> {
        self.nested_path.as_deref()
    }

    /// A copy of this context with a different nested path.
    pub fn with_nested_path(&self, nested_path: Option<&str>) -> Self {
        PredicateContext {
            nested_path: nested_path.map(str::to_string),
        }
    }
}

/// A predicate that can be rendered as an Elasticsearch query.
pub trait SearchPredicate: Debug + Send + Sync {
    /// Check that this predicate may appear inside a nested clause on
    /// `expected_parent_nested_path` (`None` meaning the query root).
    fn check_nestable_within(&self, expected_parent_nested_path: Option<&str>) -> Result<()>;

    /// Render this predicate as query JSON.
    fn build(&self, context: &PredicateContext) -> Result<Value>;

    /// Clone this predicate into a box.
    fn clone_box(&self) -> Box<dyn SearchPredicate>;
}

impl Clone for Box<dyn SearchPredicate> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Insert `boost` into the single inner object of a query clause.
///
/// `{"match": {"f": {...}}}` style clauses put the boost one level deeper;
/// those are handled by the predicates themselves.
pub(crate) fn apply_boost(mut clause: Value, boost: Option<f32>) -> Value {
    if let Some(boost) = boost {
        if let Some(inner) = clause
            .as_object_mut()
            .and_then(|outer| outer.values_mut().next())
            .and_then(Value::as_object_mut)
        {
            inner.insert("boost".to_string(), Value::from(boost));
        }
    }
    clause
}
