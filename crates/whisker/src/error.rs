//! Error types for template compilation and rendering.
//!
//! [`WhiskerError`] covers every failure the engine surfaces to callers:
//! template source defects found while compiling, helper misuse and runaway
//! recursion found while rendering, and failures of the collaborators the
//! engine talks to (locators, configuration, data serialization).
//!
//! Unresolved names are deliberately absent from this list. A missing value
//! renders as empty text, never as an error.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while compiling or rendering templates.
#[derive(Debug, Error)]
pub enum WhiskerError {
    /// A tag is unterminated, empty, or a delimiter change is malformed.
    #[error("malformed tag in template \"{template}\" at line {line}: {reason}")]
    MalformedTag {
        template: String,
        line: usize,
        reason: String,
    },

    /// A closing tag does not match the innermost open section or helper.
    #[error(
        "unmatched tag \"{found}\" in \"{template}\" at line {line}, expected \"{expected}\""
    )]
    UnmatchedTag {
        template: String,
        line: usize,
        expected: String,
        found: String,
    },

    /// The template ended while a section or helper block was still open.
    #[error("unclosed tag \"{name}\" in template \"{template}\" opened at line {line}")]
    UnclosedTag {
        template: String,
        name: String,
        line: usize,
    },

    /// A helper received parameters it cannot use.
    #[error("invalid usage of helper \"{helper}\": {reason}")]
    InvalidHelperUsage { helper: String, reason: String },

    /// Partial nesting or scope depth exceeded the configured bound.
    #[error("recursion limit of {limit} exceeded while rendering \"{template}\"")]
    RecursionLimit { template: String, limit: usize },

    /// No locator could provide the requested template.
    #[error("template not found: \"{0}\"")]
    TemplateNotFound(String),

    /// A locator found the template but failed to read it.
    #[error("failed to load template \"{name}\" from {path:?}: {message}")]
    Locator {
        name: String,
        path: PathBuf,
        message: String,
    },

    /// Engine configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Render data could not be converted into template values.
    #[error("data serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The output sink rejected rendered text.
    #[error("failed to write rendered output")]
    Write(#[from] std::fmt::Error),
}

impl WhiskerError {
    /// Create an invalid helper usage error.
    pub fn helper_usage(helper: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHelperUsage {
            helper: helper.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed tag error.
    pub(crate) fn malformed(template: &str, line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedTag {
            template: template.to_string(),
            line,
            reason: reason.into(),
        }
    }

    /// Returns true for errors caused by defects in template source.
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedTag { .. } | Self::UnmatchedTag { .. } | Self::UnclosedTag { .. }
        )
    }
}

impl From<serde_yaml::Error> for WhiskerError {
    fn from(err: serde_yaml::Error) -> Self {
        WhiskerError::Config(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, WhiskerError>;

/// Failure raised inside a single resolver strategy.
///
/// The resolver chain never propagates these: the failing strategy is
/// treated as having found nothing and the next one is tried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResolveError {
    message: String,
}

impl ResolveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
