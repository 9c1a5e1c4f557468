// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! The variants follow the failure classes the pipeline distinguishes when
//! deciding whether a run is retried on the next invocation or escalated to
//! an operator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunsyncError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A required marker or report is absent, or more than one candidate
    /// matched where exactly one is required.
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    /// The path does not look like a run directory at all.
    #[error("Validation failure: {0}")]
    ValidationFailure(String),

    #[error("Transfer failure: {0}")]
    TransferFailure(String),

    /// The run was copied but the transfer log could not be updated.
    #[error("Transfer log write failure: {0}")]
    LogWriteFailure(String),

    #[error("Status store failure: {0}")]
    StoreFailure(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunsyncError {
    /// Whether the next invocation can be expected to retry this condition on
    /// its own. Validation failures never resolve by themselves and a log
    /// write failure needs an operator before anything is repeated.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RunsyncError::ValidationFailure(_) | RunsyncError::LogWriteFailure(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RunsyncError>;
