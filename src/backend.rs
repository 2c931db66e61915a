//! Entry point tying configuration, dialect and request builders together.

use std::time::Duration;

use log::info;
use serde_json::Value;

use crate::config::NestorConfig;
use crate::dialect::{ProtocolDialect, create_dialect};
use crate::error::Result;
use crate::query::{SearchQuery, SearchResult};
use crate::schema::IndexSchema;
use crate::work::{
    ClearScrollWorkBuilder, CreateIndexWorkBuilder, ElasticsearchRequest, ScrollWorkBuilder,
    SearchWorkBuilder,
};

/// Builds requests for, and reads responses from, one Elasticsearch cluster.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use nestor::backend::Backend;
/// use nestor::config::NestorConfig;
/// use nestor::schema::{FieldType, IndexSchema};
/// use nestor::scope::SearchScope;
///
/// let backend = Backend::new(NestorConfig::builder().version("7.10").build().unwrap()).unwrap();
/// let schema = IndexSchema::builder("books")
///     .field("title", FieldType::text())
///     .build()
///     .unwrap();
/// let scope = SearchScope::single(Arc::new(schema));
///
/// let query = scope
///     .query()
///     .where_(scope.predicate().match_field("title", "dune").unwrap())
///     .build()
///     .unwrap();
/// let request = backend.search_request(&query, 0, None).unwrap();
/// assert_eq!(request.path, "/books/_search");
/// ```
#[derive(Debug)]
pub struct Backend {
    config: NestorConfig,
    dialect: Box<dyn ProtocolDialect>,
}

impl Backend {
    pub fn new(config: NestorConfig) -> Result<Self> {
        config.validate()?;
        let version = config.parsed_version()?;
        let dialect = create_dialect(version.as_ref())?;
        info!("Backend ready ({})", dialect.name());
        Ok(Backend { config, dialect })
    }

    pub fn config(&self) -> &NestorConfig {
        &self.config
    }

    pub fn dialect(&self) -> &dyn ProtocolDialect {
        self.dialect.as_ref()
    }

    fn scroll_timeout(&self) -> Duration {
        Duration::from_secs(self.config.scroll_timeout_secs)
    }

    /// Fetch `limit` hits (the configured default when `None`) from `offset`.
    pub fn search_request(
        &self,
        query: &SearchQuery,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<ElasticsearchRequest> {
        let body = query.to_body(self.dialect(), &self.config, offset, limit)?;
        SearchWorkBuilder::new(query.indexes().to_vec(), body)
            .routing_keys(query.routing_keys().iter().cloned())
            .allow_partial_search_results(self.config.allow_partial_search_results)
            .build(self.dialect())
    }

    /// Open a scroll returning `chunk_size` hits per page.
    pub fn scroll_request(&self, query: &SearchQuery, chunk_size: usize) -> Result<ElasticsearchRequest> {
        let body = query.to_body(self.dialect(), &self.config, 0, Some(chunk_size))?;
        SearchWorkBuilder::new(query.indexes().to_vec(), body)
            .routing_keys(query.routing_keys().iter().cloned())
            .scroll(self.scroll_timeout())
            .allow_partial_search_results(self.config.allow_partial_search_results)
            .build(self.dialect())
    }

    /// Fetch the next page of an open scroll.
    pub fn scroll_next_request(&self, scroll_id: &str) -> Result<ElasticsearchRequest> {
        ScrollWorkBuilder::new(scroll_id, self.scroll_timeout()).build()
    }

    pub fn clear_scroll_request(&self, scroll_id: &str) -> Result<ElasticsearchRequest> {
        ClearScrollWorkBuilder::new(scroll_id).build()
    }

    pub fn create_index_request(&self, schema: &IndexSchema) -> Result<ElasticsearchRequest> {
        CreateIndexWorkBuilder::new(schema).build(self.dialect())
    }

    pub fn parse_search_response(&self, query: &SearchQuery, response: &Value) -> Result<SearchResult> {
        query.parse_response(self.dialect(), response)
    }
}
