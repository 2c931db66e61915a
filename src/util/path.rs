//! Dotted field path helpers.
//!
//! Paths are absolute and dot-separated (`contacts.address.city`). A path is a
//! structural descendant of another when it extends it by at least one segment.

use crate::error::{NestorError, Result};

/// Join a child name to an optional parent path.
pub fn join(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    }
}

/// Check whether `path` lies strictly below `ancestor`.
pub fn is_strict_descendant(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len() + 1
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'.'
}

/// Validate that a nesting path hierarchy is a strictly nested chain.
pub fn validate_hierarchy(hierarchy: &[String]) -> Result<()> {
    for pair in hierarchy.windows(2) {
        if !is_strict_descendant(&pair[1], &pair[0]) {
            return Err(NestorError::invalid_argument(format!(
                "Nested path '{}' is not enclosed in '{}'",
                pair[1], pair[0]
            )));
        }
    }
    Ok(())
}
