//! # Nestor
//!
//! A typed search DSL producing Elasticsearch requests.
//!
//! ## Features
//!
//! - Index schemas with nested and flattened objects
//! - Predicates, sorts and projections checked against the schema
//! - Implicit `nested` wrapping of predicates on nested fields
//! - Request and response formats for Elasticsearch 5.6 to 7.x
//! - Merging of sorted top hits from several shards
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use nestor::schema::{FieldType, IndexSchema, ObjectStructure};
//! use nestor::scope::SearchScope;
//! use nestor::predicate::{PredicateContext, SearchPredicate};
//! use serde_json::json;
//!
//! let schema = IndexSchema::builder("books")
//!     .object("authors", ObjectStructure::Nested, |o| {
//!         o.field("name", FieldType::keyword())
//!     })
//!     .build()
//!     .unwrap();
//! let scope = SearchScope::single(Arc::new(schema));
//!
//! let predicate = scope.predicate().match_field("authors.name", "Tolkien").unwrap();
//! assert_eq!(
//!     predicate.build(&PredicateContext::root()).unwrap(),
//!     json!({
//!         "nested": {
//!             "path": "authors",
//!             "query": { "match": { "authors.name": { "query": "Tolkien" } } }
//!         }
//!     })
//! );
//! ```

pub mod backend;
pub mod config;
pub mod dialect;
mod error;
pub mod merge;
pub mod predicate;
pub mod projection;
pub mod query;
pub mod schema;
pub mod scope;
pub mod sort;
mod util;
pub mod work;

// Re-exports for the public API
pub use backend::Backend;
pub use config::NestorConfig;
pub use error::{NestorError, Result};
pub use query::{SearchHit, SearchQuery, SearchResult};
pub use scope::SearchScope;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
