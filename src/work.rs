//! Elasticsearch requests.
//!
//! Each builder produces an [`ElasticsearchRequest`]: a method, a path, query
//! string parameters and an optional JSON body. Sending it is left to the
//! caller's HTTP client.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use log::debug;
use serde_json::{Map, Value, json};

use crate::dialect::ProtocolDialect;
use crate::error::{NestorError, Result};
use crate::schema::IndexSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// A request ready to be sent to Elasticsearch.
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticsearchRequest {
    pub method: HttpMethod,
    pub path: String,
    pub params: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl ElasticsearchRequest {
    fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        ElasticsearchRequest {
            method,
            path: path.into(),
            params: BTreeMap::new(),
            body: None,
        }
    }

    fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Display for ElasticsearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)?;
        let mut separator = '?';
        for (key, value) in &self.params {
            write!(f, "{separator}{key}={value}")?;
            separator = '&';
        }
        if let Some(body) = &self.body {
            write!(f, " {body}")?;
        }
        Ok(())
    }
}

/// Render a duration the way Elasticsearch parses time values.
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        // Sub-millisecond remainders round up.
        format!("{}ms", duration.as_nanos().div_ceil(1_000_000))
    }
}

/// `POST /<indexes>/_search`.
#[derive(Debug, Clone)]
pub struct SearchWorkBuilder {
    indexes: Vec<String>,
    body: Value,
    routing_keys: Vec<String>,
    scroll: Option<Duration>,
    allow_partial_search_results: Option<bool>,
}

impl SearchWorkBuilder {
    pub fn new(indexes: Vec<String>, body: Value) -> Self {
        SearchWorkBuilder {
            indexes,
            body,
            routing_keys: Vec::new(),
            scroll: None,
            allow_partial_search_results: None,
        }
    }

    pub fn routing_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routing_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Open a scroll kept alive for `timeout`.
    pub fn scroll(mut self, timeout: Duration) -> Self {
        self.scroll = Some(timeout);
        self
    }

    pub fn allow_partial_search_results(mut self, allow: bool) -> Self {
        self.allow_partial_search_results = Some(allow);
        self
    }

    pub fn build(self, dialect: &dyn ProtocolDialect) -> Result<ElasticsearchRequest> {
        if self.indexes.is_empty() {
            return Err(NestorError::invalid_argument("A search must target at least one index"));
        }
        let mut request =
            ElasticsearchRequest::new(HttpMethod::Post, format!("/{}/_search", self.indexes.join(",")));

        if !self.routing_keys.is_empty() {
            let mut keys = self.routing_keys;
            keys.sort();
            keys.dedup();
            request = request.param("routing", keys.join(","));
        }
        if let Some(timeout) = self.scroll {
            request = request.param("scroll", format_duration(timeout));
        }
        if let Some(allow) = self.allow_partial_search_results {
            if dialect.supports_allow_partial_search_results() {
                request = request.param("allow_partial_search_results", allow.to_string());
            }
        }

        let request = request.body(self.body);
        debug!("Built search request: {request}");
        Ok(request)
    }
}

/// `POST /_search/scroll`: fetch the next page of a scroll.
#[derive(Debug, Clone)]
pub struct ScrollWorkBuilder {
    scroll_id: String,
    timeout: Duration,
}

impl ScrollWorkBuilder {
    pub fn new(scroll_id: impl Into<String>, timeout: Duration) -> Self {
        ScrollWorkBuilder {
            scroll_id: scroll_id.into(),
            timeout,
        }
    }

    pub fn build(self) -> Result<ElasticsearchRequest> {
        if self.scroll_id.is_empty() {
            return Err(NestorError::invalid_argument("Scroll id must not be empty"));
        }
        Ok(
            ElasticsearchRequest::new(HttpMethod::Post, "/_search/scroll").body(json!({
                "scroll": format_duration(self.timeout),
                "scroll_id": self.scroll_id,
            })),
        )
    }
}

/// `DELETE /_search/scroll`: release a scroll context.
#[derive(Debug, Clone)]
pub struct ClearScrollWorkBuilder {
    scroll_id: String,
}

impl ClearScrollWorkBuilder {
    pub fn new(scroll_id: impl Into<String>) -> Self {
        ClearScrollWorkBuilder {
            scroll_id: scroll_id.into(),
        }
    }

    pub fn build(self) -> Result<ElasticsearchRequest> {
        if self.scroll_id.is_empty() {
            return Err(NestorError::invalid_argument("Scroll id must not be empty"));
        }
        Ok(ElasticsearchRequest::new(HttpMethod::Delete, "/_search/scroll")
            .body(json!({ "scroll_id": [self.scroll_id] })))
    }
}

/// `PUT /<index>` with the mapping of a schema.
#[derive(Debug, Clone)]
pub struct CreateIndexWorkBuilder<'a> {
    schema: &'a IndexSchema,
    settings: Option<Map<String, Value>>,
}

impl<'a> CreateIndexWorkBuilder<'a> {
    pub fn new(schema: &'a IndexSchema) -> Self {
        CreateIndexWorkBuilder {
            schema,
            settings: None,
        }
    }

    /// Index settings, e.g. analysis definitions.
    pub fn settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn build(self, dialect: &dyn ProtocolDialect) -> Result<ElasticsearchRequest> {
        let mut body = dialect.wrap_mapping(self.schema.to_mapping());
        if let Some(settings) = self.settings {
            let object = body
                .as_object_mut()
                .ok_or_else(|| NestorError::internal("Wrapped mapping is not a JSON object"))?;
            object.insert("settings".to_string(), Value::Object(settings));
        }
        let request =
            ElasticsearchRequest::new(HttpMethod::Put, format!("/{}", self.schema.name())).body(body);
        debug!("Built create index request: {request}");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Elasticsearch60ProtocolDialect, Elasticsearch7ProtocolDialect};
    use crate::schema::FieldType;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(60)), "60s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_micros(500)), "1ms");
        assert_eq!(format_duration(Duration::from_micros(1500)), "2ms");
        assert_eq!(format_duration(Duration::from_nanos(1)), "1ms");
    }

    #[test]
    fn test_search_request() {
        let request = SearchWorkBuilder::new(
            vec!["a".to_string(), "b".to_string()],
            json!({ "query": { "match_all": {} } }),
        )
        .routing_keys(["r2", "r1", "r2"])
        .scroll(Duration::from_secs(30))
        .allow_partial_search_results(false)
        .build(&Elasticsearch7ProtocolDialect)
        .unwrap();

        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.path, "/a,b/_search");
        assert_eq!(request.params.get("routing").map(String::as_str), Some("r1,r2"));
        assert_eq!(request.params.get("scroll").map(String::as_str), Some("30s"));
        assert_eq!(
            request.params.get("allow_partial_search_results").map(String::as_str),
            Some("false")
        );
        assert_eq!(
            request.to_string(),
            "POST /a,b/_search?allow_partial_search_results=false&routing=r1,r2&scroll=30s \
             {\"query\":{\"match_all\":{}}}"
        );
    }

    #[test]
    fn test_partial_results_flag_dropped_on_old_versions() {
        let request = SearchWorkBuilder::new(vec!["a".to_string()], json!({}))
            .allow_partial_search_results(true)
            .build(&Elasticsearch60ProtocolDialect)
            .unwrap();
        assert!(request.params.is_empty());

        assert!(
            SearchWorkBuilder::new(vec![], json!({}))
                .build(&Elasticsearch7ProtocolDialect)
                .is_err()
        );
    }

    #[test]
    fn test_scroll_requests() {
        let next = ScrollWorkBuilder::new("abc", Duration::from_secs(60)).build().unwrap();
        assert_eq!(next.method, HttpMethod::Post);
        assert_eq!(next.path, "/_search/scroll");
        assert_eq!(next.body, Some(json!({ "scroll": "60s", "scroll_id": "abc" })));

        let clear = ClearScrollWorkBuilder::new("abc").build().unwrap();
        assert_eq!(clear.method, HttpMethod::Delete);
        assert_eq!(clear.body, Some(json!({ "scroll_id": ["abc"] })));

        assert!(ScrollWorkBuilder::new("", Duration::from_secs(1)).build().is_err());
        assert!(ClearScrollWorkBuilder::new("").build().is_err());
    }

    #[test]
    fn test_create_index_request() {
        let schema = IndexSchema::builder("books")
            .field("title", FieldType::text())
            .build()
            .unwrap();

        let legacy = CreateIndexWorkBuilder::new(&schema)
            .build(&Elasticsearch60ProtocolDialect)
            .unwrap();
        assert_eq!(legacy.method, HttpMethod::Put);
        assert_eq!(legacy.path, "/books");
        let body = legacy.body.unwrap();
        assert!(body["mappings"]["doc"]["properties"]["title"].is_object());

        let mut settings = Map::new();
        settings.insert("number_of_shards".to_string(), json!(1));
        let modern = CreateIndexWorkBuilder::new(&schema)
            .settings(settings)
            .build(&Elasticsearch7ProtocolDialect)
            .unwrap();
        let body = modern.body.unwrap();
        assert!(body["mappings"]["properties"]["title"].is_object());
        assert_eq!(body["settings"]["number_of_shards"], json!(1));
    }
}
