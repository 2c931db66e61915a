//! Field types and field values.
//!
//! This module defines:
//! - [`FieldKind`] - The kind of value a field holds (text, long, date, ...)
//! - [`FieldType`] - A kind plus its indexing options
//! - [`FieldValue`] - A typed value used in predicates, sorts and projections
//!
//! # Value conversion
//!
//! Values are checked against the kind of the field they target and encoded
//! as the JSON the backend expects. A few widening conversions are accepted:
//!
//! ```
//! use nestor::schema::{FieldKind, FieldValue};
//!
//! let json = FieldKind::Long.encode("count", &FieldValue::Integer(42)).unwrap();
//! assert_eq!(json, serde_json::json!(42));
//!
//! assert!(FieldKind::Boolean.encode("flag", &FieldValue::Integer(1)).is_err());
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{NestorError, Result};

/// Date format used on the wire for [`FieldKind::LocalDate`].
pub const LOCAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// A geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }
}

/// The kind of value stored in a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Analyzed full-text.
    Text,
    /// Exact-match string.
    Keyword,
    /// A single character, indexed as a keyword.
    Char,
    Integer,
    Long,
    Double,
    Boolean,
    /// A calendar date without time zone.
    LocalDate,
    GeoPoint,
}

impl FieldKind {
    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Keyword => "keyword",
            FieldKind::Char => "char",
            FieldKind::Integer => "integer",
            FieldKind::Long => "long",
            FieldKind::Double => "double",
            FieldKind::Boolean => "boolean",
            FieldKind::LocalDate => "local date",
            FieldKind::GeoPoint => "geo point",
        }
    }

    /// Whether full-text predicates (phrase, wildcard, fuzzy match) apply.
    pub fn supports_text_predicates(&self) -> bool {
        matches!(self, FieldKind::Text | FieldKind::Keyword)
    }

    /// Whether range predicates apply.
    pub fn supports_range(&self) -> bool {
        !matches!(self, FieldKind::Boolean | FieldKind::GeoPoint)
    }

    /// Whether the kind can ever be sorted on.
    pub fn supports_sort(&self) -> bool {
        !matches!(self, FieldKind::Text)
    }

    /// Encode a value for a field of this kind.
    pub fn encode(&self, field: &str, value: &FieldValue) -> Result<Value> {
        let encoded = match (self, value) {
            (FieldKind::Text | FieldKind::Keyword, FieldValue::Text(s)) => json!(s),
            (FieldKind::Text | FieldKind::Keyword, FieldValue::Char(c)) => json!(c.to_string()),
            (FieldKind::Char, FieldValue::Char(c)) => json!(c.to_string()),
            (FieldKind::Char, FieldValue::Text(s)) if s.chars().count() == 1 => json!(s),
            (FieldKind::Integer, FieldValue::Integer(i)) => json!(i),
            (FieldKind::Long, FieldValue::Integer(i)) => json!(i64::from(*i)),
            (FieldKind::Long, FieldValue::Long(l)) => json!(l),
            (FieldKind::Double, FieldValue::Integer(i)) => json!(f64::from(*i)),
            (FieldKind::Double, FieldValue::Long(l)) => json!(*l as f64),
            (FieldKind::Double, FieldValue::Double(d)) if d.is_finite() => json!(d),
            (FieldKind::Boolean, FieldValue::Boolean(b)) => json!(b),
            (FieldKind::LocalDate, FieldValue::LocalDate(d)) => {
                json!(d.format(LOCAL_DATE_FORMAT).to_string())
            }
            (FieldKind::GeoPoint, FieldValue::GeoPoint(p)) => json!({ "lat": p.lat, "lon": p.lon }),
            _ => {
                return Err(NestorError::InvalidFieldValue {
                    field: field.to_string(),
                    expected: format!("a {} value, got {:?}", self.name(), value),
                });
            }
        };
        Ok(encoded)
    }

    /// Decode a `_source` value for a field of this kind.
    pub fn decode(&self, field: &str, value: &Value) -> Result<FieldValue> {
        let invalid = || {
            NestorError::invalid_response(format!(
                "value {value} of field '{field}' is not a valid {}",
                self.name()
            ))
        };

        let decoded = match self {
            FieldKind::Text | FieldKind::Keyword => {
                FieldValue::Text(value.as_str().ok_or_else(invalid)?.to_string())
            }
            FieldKind::Char => {
                let s = value.as_str().ok_or_else(invalid)?;
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => FieldValue::Char(c),
                    _ => return Err(invalid()),
                }
            }
            FieldKind::Integer => {
                let i = value.as_i64().ok_or_else(invalid)?;
                FieldValue::Integer(i32::try_from(i).map_err(|_| invalid())?)
            }
            FieldKind::Long => FieldValue::Long(value.as_i64().ok_or_else(invalid)?),
            FieldKind::Double => FieldValue::Double(value.as_f64().ok_or_else(invalid)?),
            FieldKind::Boolean => FieldValue::Boolean(value.as_bool().ok_or_else(invalid)?),
            FieldKind::LocalDate => {
                let s = value.as_str().ok_or_else(invalid)?;
                let date = NaiveDate::parse_from_str(s, LOCAL_DATE_FORMAT).map_err(|_| invalid())?;
                FieldValue::LocalDate(date)
            }
            FieldKind::GeoPoint => {
                let point: GeoPoint = serde_json::from_value(value.clone()).map_err(|_| invalid())?;
                FieldValue::GeoPoint(point)
            }
        };
        Ok(decoded)
    }
}

/// A field kind together with its indexing options.
///
/// # Examples
///
/// ```
/// use nestor::schema::FieldType;
///
/// let title = FieldType::text().analyzer("english");
/// let category = FieldType::keyword().sortable(true);
/// assert!(category.is_sortable());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldType {
    kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    analyzer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    normalizer: Option<String>,
    #[serde(default = "default_true")]
    searchable: bool,
    #[serde(default)]
    sortable: bool,
    #[serde(default = "default_true")]
    projectable: bool,
}

fn default_true() -> bool {
    true
}

impl FieldType {
    pub fn new(kind: FieldKind) -> Self {
        FieldType {
            kind,
            analyzer: None,
            normalizer: None,
            searchable: true,
            sortable: false,
            projectable: true,
        }
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    pub fn keyword() -> Self {
        Self::new(FieldKind::Keyword)
    }

    pub fn char() -> Self {
        Self::new(FieldKind::Char)
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn long() -> Self {
        Self::new(FieldKind::Long)
    }

    pub fn double() -> Self {
        Self::new(FieldKind::Double)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn local_date() -> Self {
        Self::new(FieldKind::LocalDate)
    }

    pub fn geo_point() -> Self {
        Self::new(FieldKind::GeoPoint)
    }

    /// Set the analyzer (text fields only).
    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    /// Set the normalizer (keyword fields only).
    pub fn normalizer(mut self, normalizer: impl Into<String>) -> Self {
        self.normalizer = Some(normalizer.into());
        self
    }

    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn projectable(mut self, projectable: bool) -> Self {
        self.projectable = projectable;
        self
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn analyzer_name(&self) -> Option<&str> {
        self.analyzer.as_deref()
    }

    pub fn normalizer_name(&self) -> Option<&str> {
        self.normalizer.as_deref()
    }

    pub fn is_searchable(&self) -> bool {
        self.searchable
    }

    pub fn is_sortable(&self) -> bool {
        self.sortable
    }

    pub fn is_projectable(&self) -> bool {
        self.projectable
    }

    /// Check whether two fields can be targeted by a single predicate or sort.
    ///
    /// Kinds and text analysis must match; indexing flags are checked
    /// separately, per operation.
    pub fn is_dsl_compatible_with(&self, other: &FieldType) -> bool {
        self.kind == other.kind
            && self.analyzer == other.analyzer
            && self.normalizer == other.normalizer
    }

    /// Check that the options make sense for the kind.
    pub(crate) fn validate(&self, path: &str) -> Result<()> {
        if self.analyzer.is_some() && self.kind != FieldKind::Text {
            return Err(NestorError::invalid_argument(format!(
                "Field '{path}': an analyzer can only be set on text fields"
            )));
        }
        if self.normalizer.is_some() && self.kind != FieldKind::Keyword {
            return Err(NestorError::invalid_argument(format!(
                "Field '{path}': a normalizer can only be set on keyword fields"
            )));
        }
        if self.sortable && !self.kind.supports_sort() {
            return Err(NestorError::invalid_argument(format!(
                "Field '{path}': {} fields cannot be sortable",
                self.kind.name()
            )));
        }
        Ok(())
    }

    /// Elasticsearch mapping for this field.
    pub(crate) fn to_mapping(&self) -> Value {
        let mut mapping = serde_json::Map::new();
        let type_name = match self.kind {
            FieldKind::Text => "text",
            FieldKind::Keyword | FieldKind::Char => "keyword",
            FieldKind::Integer => "integer",
            FieldKind::Long => "long",
            FieldKind::Double => "double",
            FieldKind::Boolean => "boolean",
            FieldKind::LocalDate => "date",
            FieldKind::GeoPoint => "geo_point",
        };
        mapping.insert("type".to_string(), json!(type_name));

        if let Some(analyzer) = &self.analyzer {
            mapping.insert("analyzer".to_string(), json!(analyzer));
        }
        if let Some(normalizer) = &self.normalizer {
            mapping.insert("normalizer".to_string(), json!(normalizer));
        }
        if self.kind == FieldKind::LocalDate {
            mapping.insert("format".to_string(), json!("strict_date"));
        }
        if !self.searchable {
            mapping.insert("index".to_string(), json!(false));
        }
        // Text has no doc values at all.
        if self.kind != FieldKind::Text {
            mapping.insert("doc_values".to_string(), json!(self.sortable));
        }
        Value::Object(mapping)
    }
}

/// A typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Char(char),
    Integer(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
    LocalDate(NaiveDate),
    GeoPoint(GeoPoint),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(i64::from(*i)),
            FieldValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_local_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::LocalDate(d) => Some(*d),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<char> for FieldValue {
    fn from(value: char) -> Self {
        FieldValue::Char(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Long(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::LocalDate(value)
    }
}

impl From<GeoPoint> for FieldValue {
    fn from(value: GeoPoint) -> Self {
        FieldValue::GeoPoint(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_widening() {
        assert_eq!(FieldKind::Long.encode("f", &FieldValue::Integer(3)).unwrap(), json!(3));
        assert_eq!(FieldKind::Double.encode("f", &FieldValue::Long(3)).unwrap(), json!(3.0));
        assert_eq!(FieldKind::Char.encode("f", &"x".into()).unwrap(), json!("x"));
        assert_eq!(FieldKind::Keyword.encode("f", &'y'.into()).unwrap(), json!("y"));
    }

    #[test]
    fn test_encode_rejects_mismatch() {
        let err = FieldKind::Integer.encode("age", &FieldValue::Long(1)).unwrap_err();
        assert!(matches!(err, NestorError::InvalidFieldValue { ref field, .. } if field == "age"));
        assert!(FieldKind::Char.encode("c", &"xy".into()).is_err());
        assert!(FieldKind::Double.encode("d", &FieldValue::Double(f64::NAN)).is_err());
    }

    #[test]
    fn test_local_date_round_trip_format() {
        let date = NaiveDate::from_ymd_opt(2019, 4, 2).unwrap();
        let encoded = FieldKind::LocalDate.encode("d", &date.into()).unwrap();
        assert_eq!(encoded, json!("2019-04-02"));
        assert_eq!(
            FieldKind::LocalDate.decode("d", &encoded).unwrap(),
            FieldValue::LocalDate(date)
        );
    }

    #[test]
    fn test_decode_rejects_bad_values() {
        assert!(FieldKind::Char.decode("c", &json!("ab")).is_err());
        assert!(FieldKind::Integer.decode("i", &json!(i64::MAX)).is_err());
        assert!(FieldKind::LocalDate.decode("d", &json!("02/04/2019")).is_err());
    }

    #[test]
    fn test_field_type_validation() {
        assert!(FieldType::text().sortable(true).validate("t").is_err());
        assert!(FieldType::keyword().analyzer("english").validate("k").is_err());
        assert!(FieldType::text().normalizer("lower").validate("t").is_err());
        assert!(FieldType::keyword().normalizer("lower").sortable(true).validate("k").is_ok());
    }

    #[test]
    fn test_char_mapping_is_keyword() {
        let mapping = FieldType::char().sortable(true).to_mapping();
        assert_eq!(mapping, json!({ "type": "keyword", "doc_values": true }));
    }

    #[test]
    fn test_dsl_compatibility() {
        assert!(FieldType::text().is_dsl_compatible_with(&FieldType::text().projectable(false)));
        assert!(!FieldType::text().analyzer("a").is_dsl_compatible_with(&FieldType::text()));
        assert!(!FieldType::long().is_dsl_compatible_with(&FieldType::integer()));
    }
}
