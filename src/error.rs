//! Error types for nestor.
//!
//! All fallible operations in the crate return [`Result`], whose error type is
//! [`NestorError`]. Variants that callers commonly need to match on carry
//! structured data; the rest carry a message.

use thiserror::Error;

/// The error type for nestor operations.
#[derive(Error, Debug)]
pub enum NestorError {
    /// An argument passed to a builder or factory was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The configuration is inconsistent or out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No index in the scope declares this field.
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    /// A predicate was composed under a nested clause it does not belong to.
    #[error(
        "Invalid nested object path '{expected}' for predicate on fields {field_paths:?}: \
         the predicate must be nested in an object path enclosing these fields"
    )]
    InvalidNestedPath {
        expected: String,
        field_paths: Vec<String>,
    },

    /// The field type does not support the requested operation.
    #[error("{operation} are not supported by the type of field '{field}'")]
    UnsupportedOperation { operation: String, field: String },

    /// The same field is declared differently across the indexes of a scope.
    #[error("Field '{field}' is incompatible across the targeted indexes: {reason}")]
    IncompatibleField { field: String, reason: String },

    /// A value does not fit the type of the field it targets.
    #[error("Invalid value for field '{field}': expected {expected}")]
    InvalidFieldValue { field: String, expected: String },

    /// The configured Elasticsearch version has no matching dialect.
    #[error("Unsupported Elasticsearch version: {0}")]
    UnsupportedVersion(String),

    /// A response body did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NestorError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        NestorError::InvalidArgument(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        NestorError::InvalidConfig(msg.into())
    }

    pub fn unknown_field(path: impl Into<String>) -> Self {
        NestorError::UnknownField(path.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        NestorError::InvalidResponse(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        NestorError::Internal(msg.into())
    }

    /// An operation is not available for the type of `field`.
    pub fn unsupported_operation(operation: impl Into<String>, field: impl Into<String>) -> Self {
        NestorError::UnsupportedOperation {
            operation: operation.into(),
            field: field.into(),
        }
    }
}

/// Result type alias for nestor operations.
pub type Result<T> = std::result::Result<T, NestorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_operation_message() {
        let err = NestorError::unsupported_operation("Text predicates", "myField");
        let msg = err.to_string();
        assert!(msg.contains("Text predicates"));
        assert!(msg.contains("are not supported by"));
        assert!(msg.contains("'myField'"));
    }

    #[test]
    fn test_invalid_nested_path_message() {
        let err = NestorError::InvalidNestedPath {
            expected: "contacts".to_string(),
            field_paths: vec!["orders.total".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'contacts'"));
        assert!(msg.contains("orders.total"));
    }
}
