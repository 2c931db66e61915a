//! Protocol dialects.
//!
//! The request and response formats of Elasticsearch drift across releases.
//! A [`ProtocolDialect`] captures the differences that matter to nestor, and
//! [`create_dialect`] picks the right one for a configured version.
//!
//! | Dialect | Versions | `allow_partial_search_results` | total hits | nested sort | mapping type |
//! |---------|----------|------|------|------|------|
//! | [`Elasticsearch56ProtocolDialect`] | 5.6 | no | number | `nested_path` | `doc` |
//! | [`Elasticsearch60ProtocolDialect`] | 6.0 – 6.2 | no | number | `nested` | `doc` |
//! | [`Elasticsearch63ProtocolDialect`] | 6.3 – 6.8 | yes | number | `nested` | `doc` |
//! | [`Elasticsearch7ProtocolDialect`] | 7.x | yes | object | `nested` | none |

pub mod version;

use std::fmt::Debug;

use log::{info, warn};
use serde_json::{Map, Value, json};

use crate::error::{NestorError, Result};

pub use version::ElasticsearchVersion;

/// Version-specific parts of the Elasticsearch protocol.
pub trait ProtocolDialect: Debug + Send + Sync {
    /// Human-readable name.
    fn name(&self) -> &'static str;

    /// Whether search requests accept `allow_partial_search_results`.
    fn supports_allow_partial_search_results(&self) -> bool {
        true
    }

    /// Whether `track_total_hits` must be sent to get exact hit counts.
    fn track_total_hits_in_body(&self) -> bool {
        false
    }

    /// The mapping type name, for versions that still have mapping types.
    fn mapping_type_name(&self) -> Option<&'static str> {
        Some("doc")
    }

    /// Add the nested options of a sort on a field enclosed in `hierarchy`.
    fn render_nested_sort(&self, hierarchy: &[String], sort: &mut Map<String, Value>) {
        if let Some(nested) = chained_nested(hierarchy) {
            sort.insert("nested".to_string(), nested);
        }
    }

    /// Read the total hit count from the `hits` object of a search response.
    fn parse_total_hits(&self, hits: &Value) -> Result<u64> {
        hits.get("total")
            .and_then(Value::as_u64)
            .ok_or_else(|| NestorError::invalid_response("missing or invalid 'hits.total'"))
    }

    /// Wrap an index mapping the way index creation expects it.
    fn wrap_mapping(&self, mapping: Value) -> Value {
        match self.mapping_type_name() {
            Some(type_name) => json!({ "mappings": { type_name: mapping } }),
            None => json!({ "mappings": mapping }),
        }
    }
}

/// `{"path": h0, "nested": {"path": h1, ...}}`, outermost first.
fn chained_nested(hierarchy: &[String]) -> Option<Value> {
    hierarchy.iter().rev().fold(None, |inner, path| {
        let mut object = Map::new();
        object.insert("path".to_string(), json!(path));
        if let Some(inner) = inner {
            object.insert("nested".to_string(), inner);
        }
        Some(Value::Object(object))
    })
}

/// Elasticsearch 5.6.
#[derive(Debug, Clone, Copy, Default)]
pub struct Elasticsearch56ProtocolDialect;

impl ProtocolDialect for Elasticsearch56ProtocolDialect {
    fn name(&self) -> &'static str {
        "Elasticsearch 5.6"
    }

    fn supports_allow_partial_search_results(&self) -> bool {
        false
    }

    /// Only the innermost nested path can be given.
    fn render_nested_sort(&self, hierarchy: &[String], sort: &mut Map<String, Value>) {
        if let Some(path) = hierarchy.last() {
            sort.insert("nested_path".to_string(), json!(path));
        }
    }
}

/// Elasticsearch 6.0 to 6.2.
#[derive(Debug, Clone, Copy, Default)]
pub struct Elasticsearch60ProtocolDialect;

impl ProtocolDialect for Elasticsearch60ProtocolDialect {
    fn name(&self) -> &'static str {
        "Elasticsearch 6.0"
    }

    // The partial results flag appeared in 6.3.
    fn supports_allow_partial_search_results(&self) -> bool {
        false
    }
}

/// Elasticsearch 6.3 to 6.8.
#[derive(Debug, Clone, Copy, Default)]
pub struct Elasticsearch63ProtocolDialect;

impl ProtocolDialect for Elasticsearch63ProtocolDialect {
    fn name(&self) -> &'static str {
        "Elasticsearch 6.3"
    }
}

/// Elasticsearch 7.x.
#[derive(Debug, Clone, Copy, Default)]
pub struct Elasticsearch7ProtocolDialect;

impl ProtocolDialect for Elasticsearch7ProtocolDialect {
    fn name(&self) -> &'static str {
        "Elasticsearch 7"
    }

    fn track_total_hits_in_body(&self) -> bool {
        true
    }

    fn mapping_type_name(&self) -> Option<&'static str> {
        None
    }

    fn parse_total_hits(&self, hits: &Value) -> Result<u64> {
        let total = hits
            .get("total")
            .ok_or_else(|| NestorError::invalid_response("missing 'hits.total'"))?;
        if let Some(relation) = total.get("relation").and_then(Value::as_str) {
            if relation != "eq" {
                warn!("Total hit count is a lower bound (relation '{relation}')");
            }
        }
        total
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| NestorError::invalid_response("missing or invalid 'hits.total.value'"))
    }
}

/// Pick the dialect for `version`, or for the latest supported release.
pub fn create_dialect(version: Option<&ElasticsearchVersion>) -> Result<Box<dyn ProtocolDialect>> {
    let Some(version) = version else {
        info!("No Elasticsearch version configured, assuming the latest supported one");
        return Ok(Box::new(Elasticsearch7ProtocolDialect));
    };

    let dialect: Box<dyn ProtocolDialect> = match version.major {
        5 if version.minor.is_none() || version.minor == Some(6) => {
            Box::new(Elasticsearch56ProtocolDialect)
        }
        6 => match version.minor {
            None => Box::new(Elasticsearch63ProtocolDialect),
            Some(0..=2) => Box::new(Elasticsearch60ProtocolDialect),
            Some(3..=8) => Box::new(Elasticsearch63ProtocolDialect),
            Some(_) => return Err(NestorError::UnsupportedVersion(version.to_string())),
        },
        7 => Box::new(Elasticsearch7ProtocolDialect),
        major if major > 7 => {
            warn!(
                "Elasticsearch version {version} is newer than the latest supported version; \
                 falling back to the Elasticsearch 7 dialect"
            );
            Box::new(Elasticsearch7ProtocolDialect)
        }
        _ => return Err(NestorError::UnsupportedVersion(version.to_string())),
    };

    info!("Using the {} dialect for Elasticsearch {version}", dialect.name());
    Ok(dialect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialect_for(text: &str) -> Result<Box<dyn ProtocolDialect>> {
        create_dialect(Some(&ElasticsearchVersion::parse(text).unwrap()))
    }

    #[test]
    fn test_dialect_selection() {
        assert_eq!(dialect_for("5.6.16").unwrap().name(), "Elasticsearch 5.6");
        assert_eq!(dialect_for("6.0").unwrap().name(), "Elasticsearch 6.0");
        assert_eq!(dialect_for("6.2.4").unwrap().name(), "Elasticsearch 6.0");
        assert_eq!(dialect_for("6.3").unwrap().name(), "Elasticsearch 6.3");
        assert_eq!(dialect_for("6").unwrap().name(), "Elasticsearch 6.3");
        assert_eq!(dialect_for("7.10.2").unwrap().name(), "Elasticsearch 7");
        assert_eq!(dialect_for("8.1").unwrap().name(), "Elasticsearch 7");
        assert_eq!(create_dialect(None).unwrap().name(), "Elasticsearch 7");
    }

    #[test]
    fn test_unsupported_versions() {
        for text in ["2.4", "5.5", "6.9"] {
            assert!(
                matches!(dialect_for(text), Err(NestorError::UnsupportedVersion(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn test_partial_results_flag() {
        assert!(!Elasticsearch56ProtocolDialect.supports_allow_partial_search_results());
        assert!(!Elasticsearch60ProtocolDialect.supports_allow_partial_search_results());
        assert!(Elasticsearch63ProtocolDialect.supports_allow_partial_search_results());
        assert!(Elasticsearch7ProtocolDialect.supports_allow_partial_search_results());
    }

    #[test]
    fn test_nested_sort_rendering() {
        let hierarchy = vec!["a".to_string(), "a.b".to_string()];

        let mut legacy = Map::new();
        Elasticsearch56ProtocolDialect.render_nested_sort(&hierarchy, &mut legacy);
        assert_eq!(Value::Object(legacy), json!({ "nested_path": "a.b" }));

        let mut chained = Map::new();
        Elasticsearch7ProtocolDialect.render_nested_sort(&hierarchy, &mut chained);
        assert_eq!(
            Value::Object(chained),
            json!({ "nested": { "path": "a", "nested": { "path": "a.b" } } })
        );

        let mut root = Map::new();
        Elasticsearch7ProtocolDialect.render_nested_sort(&[], &mut root);
        assert!(root.is_empty());
    }

    #[test]
    fn test_total_hits_formats() {
        let legacy = json!({ "total": 42, "hits": [] });
        assert_eq!(Elasticsearch63ProtocolDialect.parse_total_hits(&legacy).unwrap(), 42);
        assert!(Elasticsearch7ProtocolDialect.parse_total_hits(&legacy).is_err());

        let modern = json!({ "total": { "value": 42, "relation": "eq" }, "hits": [] });
        assert_eq!(Elasticsearch7ProtocolDialect.parse_total_hits(&modern).unwrap(), 42);
        assert!(Elasticsearch63ProtocolDialect.parse_total_hits(&modern).is_err());
    }

    #[test]
    fn test_wrap_mapping() {
        let mapping = json!({ "properties": {} });
        assert_eq!(
            Elasticsearch60ProtocolDialect.wrap_mapping(mapping.clone()),
            json!({ "mappings": { "doc": { "properties": {} } } })
        );
        assert_eq!(
            Elasticsearch7ProtocolDialect.wrap_mapping(mapping),
            json!({ "mappings": { "properties": {} } })
        );
    }
}
