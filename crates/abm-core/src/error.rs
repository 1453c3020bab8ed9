//! Framework base error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! `#[from]` variant, so configuration failures keep their key and node
//! context all the way up to `main`.

use thiserror::Error;

/// Errors raised by the configuration facade and the logging setup.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required key is missing.  `node` is a YAML dump of the node that
    /// was searched.
    #[error("missing config key `{key}` in node:\n{node}")]
    Key { key: String, node: String },

    /// A key exists but its value does not convert to the requested type.
    #[error("cannot read config key `{key}` as `{type_name}`: {reason}\nin node:\n{node}")]
    Conversion {
        key:       String,
        type_name: &'static str,
        reason:    String,
        node:      String,
    },

    /// Semantic violation of a configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `abm-core`.
pub type CoreResult<T> = Result<T, CoreError>;
