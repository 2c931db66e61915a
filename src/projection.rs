//! Search projections: what each hit returns.
//!
//! A projection contributes to the request (which parts of `_source` to load)
//! and extracts its value from each hit of the response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{NestorError, Result};
use crate::schema::{FieldKind, FieldValue};
use crate::scope::SearchScope;

/// The index and id of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentReference {
    pub index: String,
    pub id: String,
}

/// Something to extract from each hit.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchProjection {
    DocumentReference,
    Id,
    Score,
    /// The value of a single-valued field, read from `_source`.
    Field { path: String, kind: FieldKind },
    /// The whole `_source` document.
    Source,
}

/// The value extracted by a [`SearchProjection`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionValue {
    Reference(DocumentReference),
    Id(String),
    Score(f32),
    Field(Option<FieldValue>),
    Source(Value),
}

impl SearchProjection {
    pub fn is_score(&self) -> bool {
        matches!(self, SearchProjection::Score)
    }

    /// Extract this projection from a hit of a search response.
    pub fn extract(&self, hit: &Value) -> Result<ProjectionValue> {
        match self {
            SearchProjection::DocumentReference => Ok(ProjectionValue::Reference(DocumentReference {
                index: required_str(hit, "_index")?.to_string(),
                id: required_str(hit, "_id")?.to_string(),
            })),
            SearchProjection::Id => Ok(ProjectionValue::Id(required_str(hit, "_id")?.to_string())),
            SearchProjection::Score => {
                let score = hit
                    .get("_score")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| NestorError::invalid_response("missing '_score' in hit"))?;
                Ok(ProjectionValue::Score(score as f32))
            }
            SearchProjection::Source => Ok(ProjectionValue::Source(
                hit.get("_source").cloned().unwrap_or(Value::Null),
            )),
            SearchProjection::Field { path, kind } => {
                let mut values = Vec::new();
                if let Some(source) = hit.get("_source") {
                    let segments: Vec<&str> = path.split('.').collect();
                    collect_source_values(source, &segments, &mut values);
                }
                match values.as_slice() {
                    [] => Ok(ProjectionValue::Field(None)),
                    [value] => Ok(ProjectionValue::Field(Some(kind.decode(path, value)?))),
                    _ => Err(NestorError::invalid_response(format!(
                        "field '{path}' has {} values in '_source', expected at most one",
                        values.len()
                    ))),
                }
            }
        }
    }
}

fn required_str<'v>(hit: &'v Value, key: &str) -> Result<&'v str> {
    hit.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| NestorError::invalid_response(format!("missing '{key}' in hit")))
}

/// Collect the non-null values at `segments` under `node`, descending into arrays.
fn collect_source_values<'v>(node: &'v Value, segments: &[&str], out: &mut Vec<&'v Value>) {
    match node {
        Value::Array(items) => {
            for item in items {
                collect_source_values(item, segments, out);
            }
        }
        Value::Null => {}
        _ => match segments.split_first() {
            None => out.push(node),
            Some((head, rest)) => {
                if let Some(child) = node.get(*head) {
                    collect_source_values(child, rest, out);
                }
            }
        },
    }
}

/// The `_source` filter needed by `projections`, if any.
pub(crate) fn source_filter(projections: &[SearchProjection]) -> Option<Value> {
    if projections.iter().any(|p| matches!(p, SearchProjection::Source)) {
        return None;
    }
    let mut includes: Vec<&str> = projections
        .iter()
        .filter_map(|p| match p {
            SearchProjection::Field { path, .. } => Some(path.as_str()),
            _ => None,
        })
        .collect();
    if includes.is_empty() {
        return Some(Value::Bool(false));
    }
    includes.sort_unstable();
    includes.dedup();
    let mut filter = Map::new();
    filter.insert("includes".to_string(), json!(includes));
    Some(Value::Object(filter))
}

/// Creates projections for the fields of a scope.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionFactory<'a> {
    scope: &'a SearchScope,
}

impl<'a> ProjectionFactory<'a> {
    pub fn new(scope: &'a SearchScope) -> Self {
        ProjectionFactory { scope }
    }

    pub fn document_reference(&self) -> SearchProjection {
        SearchProjection::DocumentReference
    }

    pub fn id(&self) -> SearchProjection {
        SearchProjection::Id
    }

    pub fn score(&self) -> SearchProjection {
        SearchProjection::Score
    }

    pub fn source(&self) -> SearchProjection {
        SearchProjection::Source
    }

    /// Project the value of the field at `path`.
    pub fn field(&self, path: &str) -> Result<SearchProjection> {
        let field = self.scope.resolve_value_field(path)?;
        if !field.field_type.is_projectable() {
            return Err(NestorError::invalid_argument(format!(
                "Field '{}' is not projectable: declare it projectable to project it",
                field.path
            )));
        }
        Ok(SearchProjection::Field {
            kind: field.field_type.kind(),
            path: field.path,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::schema::{FieldType, IndexSchema, ObjectStructure};

    fn scope() -> SearchScope {
        let schema = IndexSchema::builder("books")
            .field("title", FieldType::text())
            .field("published", FieldType::local_date())
            .field("secret", FieldType::keyword().projectable(false))
            .multi_valued_field("tags", FieldType::keyword())
            .object("author", ObjectStructure::Flattened, |o| {
                o.field("name", FieldType::keyword())
            })
            .build()
            .unwrap();
        SearchScope::single(Arc::new(schema))
    }

    fn hit() -> Value {
        json!({
            "_index": "books",
            "_id": "1",
            "_score": 1.25,
            "_source": {
                "title": "Dune",
                "published": "1965-08-01",
                "tags": ["sf", "classic"],
                "author": { "name": "Herbert" }
            }
        })
    }

    #[test]
    fn test_metadata_projections() {
        let scope = scope();
        let projection = scope.projection();
        assert_eq!(
            projection.document_reference().extract(&hit()).unwrap(),
            ProjectionValue::Reference(DocumentReference {
                index: "books".to_string(),
                id: "1".to_string()
            })
        );
        assert_eq!(
            projection.id().extract(&hit()).unwrap(),
            ProjectionValue::Id("1".to_string())
        );
        assert_eq!(
            projection.score().extract(&hit()).unwrap(),
            ProjectionValue::Score(1.25)
        );
        assert!(projection.score().extract(&json!({ "_score": null })).is_err());
    }

    #[test]
    fn test_field_projection() {
        let scope = scope();
        let published = scope.projection().field("published").unwrap();
        assert_eq!(
            published.extract(&hit()).unwrap(),
            ProjectionValue::Field(Some(FieldValue::LocalDate(
                NaiveDate::from_ymd_opt(1965, 8, 1).unwrap()
            )))
        );

        let author = scope.projection().field("author.name").unwrap();
        assert_eq!(
            author.extract(&hit()).unwrap(),
            ProjectionValue::Field(Some(FieldValue::Text("Herbert".to_string())))
        );

        let missing = json!({ "_index": "books", "_id": "2", "_source": {} });
        assert_eq!(published.extract(&missing).unwrap(), ProjectionValue::Field(None));
    }

    #[test]
    fn test_multiple_values_rejected() {
        let scope = scope();
        let tags = scope.projection().field("tags").unwrap();
        assert!(matches!(
            tags.extract(&hit()),
            Err(NestorError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_unprojectable_field() {
        let scope = scope();
        assert!(scope.projection().field("secret").is_err());
        assert!(scope.projection().field("missing").is_err());
    }

    #[test]
    fn test_source_filter() {
        let scope = scope();
        let title = scope.projection().field("title").unwrap();
        let author = scope.projection().field("author.name").unwrap();

        assert_eq!(
            source_filter(&[SearchProjection::DocumentReference]),
            Some(json!(false))
        );
        assert_eq!(
            source_filter(&[title.clone(), author, title.clone()]),
            Some(json!({ "includes": ["author.name", "title"] }))
        );
        assert_eq!(source_filter(&[title, SearchProjection::Source]), None);
    }
}
