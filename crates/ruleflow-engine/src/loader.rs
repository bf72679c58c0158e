//! Configuration loading from JSON strings and files.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::RuleEngineConfig;

/// Failure to load or parse a configuration document.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The document was empty or whitespace-only.
    #[error("configuration content is empty ({source_desc})")]
    Empty {
        /// Where the document came from.
        source_desc: String,
    },

    /// The file does not exist.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// The missing path.
        path: String,
    },

    /// Reading the document failed.
    #[error("failed to read configuration from {source_desc}")]
    Io {
        /// Where the document came from.
        source_desc: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The document is not a valid configuration.
    #[error("failed to parse configuration from {source_desc}: {message}")]
    Parse {
        /// Where the document came from.
        source_desc: String,
        /// The parser's complaint.
        message: String,
    },
}

/// Loads [`RuleEngineConfig`] documents.
///
/// Accepts both a bare configuration object and the wrapped form
/// `{"ruleEngineConfig": { ... }}`.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationLoader;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigWrapper {
    rule_engine_config: Option<RuleEngineConfig>,
}

impl ConfigurationLoader {
    /// Create a loader.
    pub fn new() -> Self {
        Self
    }

    /// Parse a configuration from a JSON string.
    pub fn from_str(&self, content: &str) -> Result<RuleEngineConfig, ConfigurationError> {
        self.parse(content, "string")
    }

    /// Load a configuration from a JSON file.
    pub fn from_file(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<RuleEngineConfig, ConfigurationError> {
        let path = path.as_ref();
        let source_desc = format!("file:{}", path.display());
        info!(path = %path.display(), "loading rule engine configuration");

        if !path.exists() {
            return Err(ConfigurationError::NotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            source_desc: source_desc.clone(),
            source,
        })?;

        self.parse(&content, &source_desc)
    }

    /// Render a configuration back to JSON.
    pub fn to_json_string(
        &self,
        config: &RuleEngineConfig,
        pretty: bool,
    ) -> Result<String, ConfigurationError> {
        let render = if pretty {
            serde_json::to_string_pretty(config)
        } else {
            serde_json::to_string(config)
        };
        render.map_err(|e| ConfigurationError::Parse {
            source_desc: "in-memory config".to_owned(),
            message: e.to_string(),
        })
    }

    fn parse(
        &self,
        content: &str,
        source_desc: &str,
    ) -> Result<RuleEngineConfig, ConfigurationError> {
        if content.trim().is_empty() {
            return Err(ConfigurationError::Empty {
                source_desc: source_desc.to_owned(),
            });
        }

        debug!(source = source_desc, "parsing rule engine configuration");

        match serde_json::from_str::<RuleEngineConfig>(content) {
            Ok(config) => {
                // A wrapped document also parses directly (unknown keys are
                // ignored), but comes out hollow; prefer the wrapped config.
                if config.entry_point.is_empty() && config.rules.is_empty() {
                    if let Some(wrapped) = self.unwrap(content) {
                        debug!("using ruleEngineConfig wrapper");
                        self.log_loaded(&wrapped, source_desc);
                        return Ok(wrapped);
                    }
                }
                self.log_loaded(&config, source_desc);
                Ok(config)
            }
            Err(direct_error) => match self.unwrap(content) {
                Some(wrapped) => {
                    debug!("direct parse failed, using ruleEngineConfig wrapper");
                    self.log_loaded(&wrapped, source_desc);
                    Ok(wrapped)
                }
                None => Err(ConfigurationError::Parse {
                    source_desc: source_desc.to_owned(),
                    message: direct_error.to_string(),
                }),
            },
        }
    }

    fn unwrap(&self, content: &str) -> Option<RuleEngineConfig> {
        serde_json::from_str::<ConfigWrapper>(content)
            .ok()
            .and_then(|wrapper| wrapper.rule_engine_config)
    }

    fn log_loaded(&self, config: &RuleEngineConfig, source_desc: &str) {
        info!(
            source = source_desc,
            version = config.version.as_deref().unwrap_or("<unset>"),
            entry_point = %config.entry_point,
            rules = config.rule_count(),
            "configuration loaded"
        );
    }
}
