//! Search queries and their results.
//!
//! A [`SearchQuery`] gathers a predicate, sorts and projections built against
//! the same scope. It renders as a search request body for a given dialect,
//! and turns search responses into [`SearchResult`]s.

use log::{debug, warn};
use serde_json::{Map, Value, json};

use crate::config::NestorConfig;
use crate::dialect::ProtocolDialect;
use crate::error::{NestorError, Result};
use crate::merge::{MergeSortField, ScoreDoc, SortValue, TopDocs};
use crate::predicate::{MatchAllPredicate, PredicateContext, SearchPredicate};
use crate::projection::{self, ProjectionValue, SearchProjection};
use crate::sort::SearchSort;

/// Builder for [`SearchQuery`]; obtained from
/// [`SearchScope::query`](crate::scope::SearchScope::query).
#[derive(Debug)]
pub struct SearchQueryBuilder {
    indexes: Vec<String>,
    predicate: Option<Box<dyn SearchPredicate>>,
    sorts: Vec<SearchSort>,
    projections: Vec<SearchProjection>,
    routing_keys: Vec<String>,
}

impl SearchQueryBuilder {
    pub fn new(indexes: Vec<String>) -> Self {
        SearchQueryBuilder {
            indexes,
            predicate: None,
            sorts: Vec::new(),
            projections: Vec::new(),
            routing_keys: Vec::new(),
        }
    }

    /// The predicate hits must match. Defaults to matching all documents.
    pub fn where_(mut self, predicate: impl SearchPredicate + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Add a sort. Hits are sorted by descending score when no sort is added.
    pub fn sort(mut self, sort: impl Into<SearchSort>) -> Self {
        self.sorts.push(sort.into());
        self
    }

    /// Add a projection. Defaults to a document reference.
    pub fn projection(mut self, projection: SearchProjection) -> Self {
        self.projections.push(projection);
        self
    }

    pub fn routing(mut self, key: impl Into<String>) -> Self {
        self.routing_keys.push(key.into());
        self
    }

    pub fn build(self) -> Result<SearchQuery> {
        let predicate = self
            .predicate
            .unwrap_or_else(|| Box::new(MatchAllPredicate::new()));
        predicate.check_nestable_within(None)?;

        let projections = if self.projections.is_empty() {
            vec![SearchProjection::DocumentReference]
        } else {
            self.projections
        };

        Ok(SearchQuery {
            indexes: self.indexes,
            predicate,
            sorts: self.sorts,
            projections,
            routing_keys: self.routing_keys,
        })
    }
}

/// A query ready to be rendered.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    indexes: Vec<String>,
    predicate: Box<dyn SearchPredicate>,
    sorts: Vec<SearchSort>,
    projections: Vec<SearchProjection>,
    routing_keys: Vec<String>,
}

impl SearchQuery {
    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    pub fn sorts(&self) -> &[SearchSort] {
        &self.sorts
    }

    pub fn projections(&self) -> &[SearchProjection] {
        &self.projections
    }

    pub fn routing_keys(&self) -> &[String] {
        &self.routing_keys
    }

    /// The query clause alone.
    pub fn query_json(&self) -> Result<Value> {
        self.predicate.build(&PredicateContext::root())
    }

    /// Render the request body fetching `limit` hits (the configured default
    /// when `None`) starting at `offset`.
    pub fn to_body(
        &self,
        dialect: &dyn ProtocolDialect,
        config: &NestorConfig,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Value> {
        let limit = limit.unwrap_or(config.default_limit);
        let window = offset.checked_add(limit).unwrap_or(usize::MAX);
        if window > config.max_result_window {
            return Err(NestorError::invalid_argument(format!(
                "offset + limit ({window}) exceeds the maximum result window ({})",
                config.max_result_window
            )));
        }

        let mut body = Map::new();
        body.insert("query".to_string(), self.query_json()?);
        body.insert("from".to_string(), json!(offset));
        body.insert("size".to_string(), json!(limit));

        if !self.sorts.is_empty() {
            let sorts: Vec<Value> = self.sorts.iter().map(|s| s.to_json(dialect)).collect();
            body.insert("sort".to_string(), Value::Array(sorts));
            let sorted_by_score = self.sorts.iter().all(SearchSort::is_score);
            if !sorted_by_score && self.projections.iter().any(SearchProjection::is_score) {
                body.insert("track_scores".to_string(), json!(true));
            }
        }

        if let Some(filter) = projection::source_filter(&self.projections) {
            body.insert("_source".to_string(), filter);
        }

        if dialect.track_total_hits_in_body() {
            body.insert("track_total_hits".to_string(), json!(config.track_total_hits));
        }

        debug!("Rendered search body for indexes {:?}", self.indexes);
        Ok(Value::Object(body))
    }

    /// How the sort values of hits compare, for merging results.
    pub fn merge_sort(&self) -> Vec<MergeSortField> {
        if self.sorts.is_empty() {
            vec![MergeSortField::Score { reverse: false }]
        } else {
            self.sorts.iter().map(SearchSort::merge_field).collect()
        }
    }

    /// Parse a search or scroll response.
    pub fn parse_response(&self, dialect: &dyn ProtocolDialect, response: &Value) -> Result<SearchResult> {
        let hits_object = response
            .get("hits")
            .ok_or_else(|| NestorError::invalid_response("missing 'hits'"))?;
        let total_hit_count = dialect.parse_total_hits(hits_object)?;

        if let Some(failed) = response.pointer("/_shards/failed").and_then(Value::as_u64) {
            if failed > 0 {
                warn!("{failed} shard(s) failed; results are partial");
            }
        }

        let raw_hits = hits_object
            .get("hits")
            .and_then(Value::as_array)
            .ok_or_else(|| NestorError::invalid_response("missing or invalid 'hits.hits'"))?;

        let hits = raw_hits
            .iter()
            .map(|hit| self.parse_hit(hit))
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchResult {
            total_hit_count,
            took_ms: response.get("took").and_then(Value::as_u64).unwrap_or(0),
            timed_out: response
                .get("timed_out")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            scroll_id: response
                .get("_scroll_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            hits,
        })
    }

    fn parse_hit(&self, hit: &Value) -> Result<SearchHit> {
        let text = |key: &str| -> Result<String> {
            hit.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| NestorError::invalid_response(format!("missing '{key}' in hit")))
        };

        let sort_values = hit
            .get("sort")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(SortValue::from_json).collect())
            .unwrap_or_default();

        let projections = self
            .projections
            .iter()
            .map(|p| p.extract(hit))
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchHit {
            index: text("_index")?,
            id: text("_id")?,
            score: hit.get("_score").and_then(Value::as_f64).map(|s| s as f32),
            sort_values,
            projections,
        })
    }
}

/// One hit of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub index: String,
    pub id: String,
    pub score: Option<f32>,
    pub sort_values: Vec<SortValue>,
    /// One value per projection of the query, in order.
    pub projections: Vec<ProjectionValue>,
}

/// A page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub total_hit_count: u64,
    pub took_ms: u64,
    pub timed_out: bool,
    /// Set when the search opened or continued a scroll.
    pub scroll_id: Option<String>,
    pub hits: Vec<SearchHit>,
}

impl SearchResult {
    /// The hits as top docs, `doc` being the rank of each hit in this page.
    ///
    /// Hits without a score (field sorts without score tracking) get `NaN`.
    pub fn to_top_docs(&self, sort: &[MergeSortField]) -> TopDocs {
        let has_field_sort = sort.iter().any(|f| matches!(f, MergeSortField::Field { .. }));
        let score_docs = self
            .hits
            .iter()
            .enumerate()
            .map(|(rank, hit)| {
                let doc = ScoreDoc::new(rank, hit.score.unwrap_or(f32::NAN));
                if has_field_sort {
                    doc.with_sort_values(hit.sort_values.clone())
                } else {
                    doc
                }
            })
            .collect();
        TopDocs::new(self.total_hit_count, score_docs)
    }
}
