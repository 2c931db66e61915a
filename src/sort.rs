//! Search sorts.
//!
//! Sorts are created through a scope-bound [`SortFactory`], which checks the
//! targeted fields support the requested sort. Rendering depends on the
//! protocol dialect for fields inside nested objects.
//!
//! Every sort also has a [`MergeSortField`] counterpart describing how the
//! sort values it produces compare, so that results of several queries using
//! the same sorts can be merged (see [`crate::merge`]).

use serde_json::{Map, Value, json};

use crate::dialect::ProtocolDialect;
use crate::error::{NestorError, Result};
use crate::merge::MergeSortField;
use crate::schema::{FieldKind, FieldValue, GeoPoint};
use crate::scope::{ResolvedValueField, SearchScope};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Placement of documents without a value for the sorted field.
#[derive(Debug, Clone, PartialEq)]
pub enum MissingValue {
    First,
    Last,
    /// Sort as if the document had this (encoded) value.
    Use(Value),
}

/// Sort on the value of a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSort {
    path: String,
    kind: FieldKind,
    order: SortOrder,
    missing: MissingValue,
    nested_path_hierarchy: Vec<String>,
}

impl FieldSort {
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn asc(self) -> Self {
        self.order(SortOrder::Asc)
    }

    pub fn desc(self) -> Self {
        self.order(SortOrder::Desc)
    }

    pub fn missing_first(mut self) -> Self {
        self.missing = MissingValue::First;
        self
    }

    pub fn missing_last(mut self) -> Self {
        self.missing = MissingValue::Last;
        self
    }

    /// Sort documents without a value as if they had `value`.
    pub fn missing_as(mut self, value: impl Into<FieldValue>) -> Result<Self> {
        let encoded = self.kind.encode(&self.path, &value.into())?;
        self.missing = MissingValue::Use(encoded);
        Ok(self)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Sort on the distance between a geo point field and a center.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceSort {
    path: String,
    center: GeoPoint,
    order: SortOrder,
    nested_path_hierarchy: Vec<String>,
}

impl DistanceSort {
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn desc(self) -> Self {
        self.order(SortOrder::Desc)
    }
}

/// A sort criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchSort {
    /// Relevance score; descending by default.
    Score { order: SortOrder },
    Field(FieldSort),
    Distance(DistanceSort),
    /// Internal index order, the cheapest sort.
    IndexOrder,
}

impl SearchSort {
    pub fn to_json(&self, dialect: &dyn ProtocolDialect) -> Value {
        match self {
            SearchSort::Score { order } => json!({ "_score": { "order": order.as_str() } }),
            SearchSort::IndexOrder => json!("_doc"),
            SearchSort::Field(sort) => {
                let mut inner = Map::new();
                inner.insert("order".to_string(), json!(sort.order.as_str()));
                let missing = match &sort.missing {
                    MissingValue::First => json!("_first"),
                    MissingValue::Last => json!("_last"),
                    MissingValue::Use(value) => value.clone(),
                };
                inner.insert("missing".to_string(), missing);
                dialect.render_nested_sort(&sort.nested_path_hierarchy, &mut inner);
                json!({ sort.path.as_str(): inner })
            }
            SearchSort::Distance(sort) => {
                let mut inner = Map::new();
                inner.insert(
                    sort.path.clone(),
                    json!({ "lat": sort.center.lat, "lon": sort.center.lon }),
                );
                inner.insert("order".to_string(), json!(sort.order.as_str()));
                inner.insert("unit".to_string(), json!("m"));
                dialect.render_nested_sort(&sort.nested_path_hierarchy, &mut inner);
                json!({ "_geo_distance": inner })
            }
        }
    }

    /// How the sort values of this sort compare when merging results.
    pub fn merge_field(&self) -> MergeSortField {
        match self {
            SearchSort::Score { order } => MergeSortField::Score {
                reverse: *order == SortOrder::Asc,
            },
            SearchSort::IndexOrder => MergeSortField::Doc,
            SearchSort::Field(sort) => MergeSortField::Field {
                reverse: sort.order == SortOrder::Desc,
                missing_last: sort.missing != MissingValue::First,
            },
            SearchSort::Distance(sort) => MergeSortField::Field {
                reverse: sort.order == SortOrder::Desc,
                missing_last: true,
            },
        }
    }

    pub fn is_score(&self) -> bool {
        matches!(self, SearchSort::Score { .. })
    }
}

/// Creates sorts for the fields of a scope.
#[derive(Debug, Clone, Copy)]
pub struct SortFactory<'a> {
    scope: &'a SearchScope,
}

impl<'a> SortFactory<'a> {
    pub fn new(scope: &'a SearchScope) -> Self {
        SortFactory { scope }
    }

    pub fn score(&self) -> SearchSort {
        SearchSort::Score {
            order: SortOrder::Desc,
        }
    }

    pub fn index_order(&self) -> SearchSort {
        SearchSort::IndexOrder
    }

    /// Sort on `path`, ascending, documents without value last.
    pub fn field(&self, path: &str) -> Result<FieldSort> {
        let field = self.resolve_sortable(path)?;
        if field.field_type.kind() == FieldKind::GeoPoint {
            return Err(NestorError::unsupported_operation("Field sorts", &field.path));
        }
        Ok(FieldSort {
            kind: field.field_type.kind(),
            path: field.path,
            order: SortOrder::Asc,
            missing: MissingValue::Last,
            nested_path_hierarchy: field.nested_path_hierarchy,
        })
    }

    /// Sort on the distance to `center`, nearest first.
    pub fn distance(&self, path: &str, center: GeoPoint) -> Result<DistanceSort> {
        let field = self.scope.resolve_value_field(path)?;
        if field.field_type.kind() != FieldKind::GeoPoint {
            return Err(NestorError::unsupported_operation(
                "Distance related operations",
                &field.path,
            ));
        }
        let field = self.check_sortable(field)?;
        Ok(DistanceSort {
            path: field.path,
            center,
            order: SortOrder::Asc,
            nested_path_hierarchy: field.nested_path_hierarchy,
        })
    }

    fn resolve_sortable(&self, path: &str) -> Result<ResolvedValueField> {
        let field = self.scope.resolve_value_field(path)?;
        if !field.field_type.kind().supports_sort() {
            return Err(NestorError::unsupported_operation("Sorts", &field.path));
        }
        self.check_sortable(field)
    }

    fn check_sortable(&self, field: ResolvedValueField) -> Result<ResolvedValueField> {
        if field.field_type.is_sortable() {
            Ok(field)
        } else {
            Err(NestorError::invalid_argument(format!(
                "Field '{}' is not sortable: declare it sortable to sort on it",
                field.path
            )))
        }
    }
}

impl From<FieldSort> for SearchSort {
    fn from(sort: FieldSort) -> Self {
        SearchSort::Field(sort)
    }
}

impl From<DistanceSort> for SearchSort {
    fn from(sort: DistanceSort) -> Self {
        SearchSort::Distance(sort)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::dialect::{Elasticsearch56ProtocolDialect, Elasticsearch7ProtocolDialect};
    use crate::schema::{FieldType, IndexSchema, ObjectStructure};

    fn scope() -> SearchScope {
        let schema = IndexSchema::builder("events")
            .field("title", FieldType::text())
            .field("day", FieldType::local_date().sortable(true))
            .field("rank", FieldType::integer())
            .field("place", FieldType::geo_point().sortable(true))
            .object("sessions", ObjectStructure::Nested, |o| {
                o.field("start", FieldType::long().sortable(true))
            })
            .build()
            .unwrap();
        SearchScope::single(Arc::new(schema))
    }

    #[test]
    fn test_score_and_index_order() {
        let scope = scope();
        let dialect = Elasticsearch7ProtocolDialect;
        assert_eq!(
            scope.sort().score().to_json(&dialect),
            json!({ "_score": { "order": "desc" } })
        );
        assert_eq!(scope.sort().index_order().to_json(&dialect), json!("_doc"));
    }

    #[test]
    fn test_local_date_sort_with_missing_value() {
        let scope = scope();
        let sort = scope
            .sort()
            .field("day")
            .unwrap()
            .desc()
            .missing_as(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
            .unwrap();
        assert_eq!(
            SearchSort::from(sort).to_json(&Elasticsearch7ProtocolDialect),
            json!({ "day": { "order": "desc", "missing": "2000-01-01" } })
        );

        let bad = scope.sort().field("day").unwrap().missing_as(3);
        assert!(bad.is_err());
    }

    #[test]
    fn test_nested_field_sort_per_dialect() {
        let scope = scope();
        let sort: SearchSort = scope.sort().field("sessions.start").unwrap().into();
        assert_eq!(
            sort.to_json(&Elasticsearch7ProtocolDialect),
            json!({
                "sessions.start": {
                    "order": "asc",
                    "missing": "_last",
                    "nested": { "path": "sessions" }
                }
            })
        );
        assert_eq!(
            sort.to_json(&Elasticsearch56ProtocolDialect),
            json!({
                "sessions.start": {
                    "order": "asc",
                    "missing": "_last",
                    "nested_path": "sessions"
                }
            })
        );
    }

    #[test]
    fn test_distance_sort() {
        let scope = scope();
        let sort: SearchSort = scope
            .sort()
            .distance("place", GeoPoint::new(45.0, 4.5))
            .unwrap()
            .into();
        assert_eq!(
            sort.to_json(&Elasticsearch7ProtocolDialect),
            json!({
                "_geo_distance": {
                    "place": { "lat": 45.0, "lon": 4.5 },
                    "order": "asc",
                    "unit": "m"
                }
            })
        );

        let err = scope.sort().distance("day", GeoPoint::new(0.0, 0.0)).unwrap_err();
        assert!(err.to_string().contains("Distance related operations"));
        assert!(scope.sort().field("place").is_err());
    }

    #[test]
    fn test_unsortable_fields() {
        let scope = scope();
        assert!(matches!(
            scope.sort().field("title"),
            Err(NestorError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            scope.sort().field("rank"),
            Err(NestorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_merge_fields() {
        let scope = scope();
        assert_eq!(
            scope.sort().score().merge_field(),
            MergeSortField::Score { reverse: false }
        );
        assert_eq!(
            SearchSort::Score { order: SortOrder::Asc }.merge_field(),
            MergeSortField::Score { reverse: true }
        );
        let field: SearchSort = scope.sort().field("day").unwrap().desc().missing_first().into();
        assert_eq!(
            field.merge_field(),
            MergeSortField::Field {
                reverse: true,
                missing_last: false
            }
        );
    }
}
