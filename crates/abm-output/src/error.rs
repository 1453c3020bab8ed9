//! Error types for abm-output.

use thiserror::Error;

use abm_core::CoreError;

/// Errors raised by the storage facade and the data manager.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Dataset or group creation, capacity, or shape violation.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A required `data_manager` sub-node is absent.
    #[error("data_manager configuration is missing `{0}`")]
    MissingConfig(String),

    /// A task names a decider or trigger that was never registered.
    #[error("task `{task}` refers to unknown {kind} `{name}`")]
    UnknownAssociation {
        task: String,
        kind: &'static str,
        name: String,
    },

    #[error("invalid output configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] CoreError),
}

/// Alias for `Result<T, OutputError>`.
pub type OutputResult<T> = Result<T, OutputError>;
