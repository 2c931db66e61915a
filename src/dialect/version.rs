//! Elasticsearch version numbers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{NestorError, Result};

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(?:\.(\d+)(?:\.(\d+))?)?(?:-([0-9A-Za-z.]+))?$").unwrap()
});

/// A possibly partial Elasticsearch version, e.g. `7`, `6.8` or `7.10.2`.
///
/// Missing components mean "any": `6` designates every 6.x release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticsearchVersion {
    pub major: u32,
    pub minor: Option<u32>,
    pub micro: Option<u32>,
    pub qualifier: Option<String>,
}

impl ElasticsearchVersion {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let invalid = || {
            NestorError::invalid_config(format!(
                "Invalid Elasticsearch version '{text}': expected <major>[.<minor>[.<micro>]][-<qualifier>]"
            ))
        };

        let captures = VERSION_PATTERN.captures(text).ok_or_else(invalid)?;

        let number = |index: usize| -> Result<Option<u32>> {
            captures
                .get(index)
                .map(|m| m.as_str().parse::<u32>().map_err(|_| invalid()))
                .transpose()
        };

        Ok(ElasticsearchVersion {
            major: number(1)?.ok_or_else(invalid)?,
            minor: number(2)?,
            micro: number(3)?,
            qualifier: captures.get(4).map(|m| m.as_str().to_string()),
        })
    }

    /// The version is `major.minor` or later (unspecified minor counts as 0).
    pub fn is_at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor.unwrap_or(0)) >= (major, minor)
    }
}

impl fmt::Display for ElasticsearchVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        if let Some(minor) = self.minor {
            write!(f, ".{minor}")?;
            if let Some(micro) = self.micro {
                write!(f, ".{micro}")?;
            }
        }
        if let Some(qualifier) = &self.qualifier {
            write!(f, "-{qualifier}")?;
        }
        Ok(())
    }
}
