//! Engine configuration.
//!
//! [`EngineConfig`] holds every tunable the engine reads. All fields have
//! defaults, so a configuration file only needs the keys it changes:
//!
//! ```rust
//! use whisker::EngineConfig;
//!
//! let config = EngineConfig::from_yaml(r#"
//! start_delimiter: "<%"
//! end_delimiter: "%>"
//! partial_recursion_limit: 4
//! "#).unwrap();
//!
//! assert_eq!(config.start_delimiter, "<%");
//! assert!(config.cache_enabled);
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, WhiskerError};
use crate::lexer::Delimiters;

/// Default alias under which iteration metadata is reachable.
pub const DEFAULT_ITERATION_ALIAS: &str = "iter";

/// Tunables read by the engine at build time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Opening tag delimiter each template starts with.
    pub start_delimiter: String,
    /// Closing tag delimiter each template starts with.
    pub end_delimiter: String,
    /// Keep compiled templates in the registry cache.
    pub cache_enabled: bool,
    /// Recompile cached templates older than this many seconds.
    pub cache_expiration_secs: Option<u64>,
    /// Maximum nesting depth of partials within one render call.
    pub partial_recursion_limit: usize,
    /// Maximum number of scope frames within one render call.
    pub scope_depth_limit: usize,
    /// Name under which iteration metadata is exposed (`{{iter.index}}`).
    pub iteration_alias: String,
    /// Strip whitespace and newline around standalone block tags.
    pub remove_standalone_lines: bool,
    /// Write `{{name}}` output without HTML escaping.
    pub skip_value_escaping: bool,
    /// Compile every template the locators know about during `build`.
    pub precompile_all: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_delimiter: "{{".to_string(),
            end_delimiter: "}}".to_string(),
            cache_enabled: true,
            cache_expiration_secs: None,
            partial_recursion_limit: 10,
            scope_depth_limit: 1024,
            iteration_alias: DEFAULT_ITERATION_ALIAS.to_string(),
            remove_standalone_lines: true,
            skip_value_escaping: false,
            precompile_all: false,
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        for (key, delimiter) in [
            ("start_delimiter", &self.start_delimiter),
            ("end_delimiter", &self.end_delimiter),
        ] {
            if delimiter.is_empty() {
                return Err(WhiskerError::Config(format!("{} must not be empty", key)));
            }
            if delimiter.contains(char::is_whitespace) || delimiter.contains('=') {
                return Err(WhiskerError::Config(format!(
                    "{} must not contain whitespace or '=': {:?}",
                    key, delimiter
                )));
            }
        }
        if self.iteration_alias.is_empty() || self.iteration_alias.contains('.') {
            return Err(WhiskerError::Config(format!(
                "iteration_alias must be a non-empty name without dots: {:?}",
                self.iteration_alias
            )));
        }
        if self.scope_depth_limit == 0 {
            return Err(WhiskerError::Config(
                "scope_depth_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Delimiters every template starts with.
    pub fn delimiters(&self) -> Delimiters {
        Delimiters::new(&self.start_delimiter, &self.end_delimiter)
    }

    pub fn cache_expiration(&self) -> Option<Duration> {
        self.cache_expiration_secs.map(Duration::from_secs)
    }
}
