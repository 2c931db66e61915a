use serde::{Deserialize, Serialize};

use crate::dialect::ElasticsearchVersion;
use crate::error::{NestorError, Result};

/// Backend configuration.
///
/// # Examples
///
/// ```
/// use nestor::config::NestorConfig;
///
/// let config = NestorConfig::builder()
///     .version("6.8")
///     .default_limit(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.default_limit, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NestorConfig {
    /// Elasticsearch version; `None` targets the latest supported release.
    pub version: Option<String>,
    /// Number of hits fetched when a search does not set a limit.
    pub default_limit: usize,
    /// How long scroll contexts are kept alive between requests.
    pub scroll_timeout_secs: u64,
    /// Ask for exact total hit counts.
    pub track_total_hits: bool,
    /// Accept results when some shards failed.
    pub allow_partial_search_results: bool,
    /// Upper bound of `offset + limit`, as enforced by Elasticsearch.
    pub max_result_window: usize,
}

impl Default for NestorConfig {
    fn default() -> Self {
        NestorConfig {
            version: None,
            default_limit: 10,
            scroll_timeout_secs: 60,
            track_total_hits: true,
            allow_partial_search_results: false,
            max_result_window: 10_000,
        }
    }
}

impl NestorConfig {
    pub fn builder() -> NestorConfigBuilder {
        NestorConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration. Missing keys take their
    /// default value.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: NestorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(NestorError::invalid_config("default_limit must be greater than 0"));
        }
        if self.scroll_timeout_secs == 0 {
            return Err(NestorError::invalid_config(
                "scroll_timeout_secs must be greater than 0",
            ));
        }
        if self.default_limit > self.max_result_window {
            return Err(NestorError::invalid_config(format!(
                "default_limit ({}) exceeds max_result_window ({})",
                self.default_limit, self.max_result_window
            )));
        }
        self.parsed_version()?;
        Ok(())
    }

    /// The configured version, parsed.
    pub fn parsed_version(&self) -> Result<Option<ElasticsearchVersion>> {
        self.version
            .as_deref()
            .map(ElasticsearchVersion::parse)
            .transpose()
    }
}

/// Builder for [`NestorConfig`].
#[derive(Debug, Default)]
pub struct NestorConfigBuilder {
    config: NestorConfig,
}

impl NestorConfigBuilder {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = Some(version.into());
        self
    }

    pub fn default_limit(mut self, limit: usize) -> Self {
        self.config.default_limit = limit;
        self
    }

    pub fn scroll_timeout_secs(mut self, secs: u64) -> Self {
        self.config.scroll_timeout_secs = secs;
        self
    }

    pub fn track_total_hits(mut self, track: bool) -> Self {
        self.config.track_total_hits = track;
        self
    }

    pub fn allow_partial_search_results(mut self, allow: bool) -> Self {
        self.config.allow_partial_search_results = allow;
        self
    }

    pub fn max_result_window(mut self, window: usize) -> Self {
        self.config.max_result_window = window;
        self
    }

    pub fn build(self) -> Result<NestorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
