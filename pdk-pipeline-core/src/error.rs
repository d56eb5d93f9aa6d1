//! Error types for pipeline construction and sample file generation.

use thiserror::Error;

/// Fatal, construction-time configuration errors. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Neither a hosted repository nor a connection was configured.
    #[error("Either repositoryName or codestarConnectionArn must be provided")]
    MissingRepository,

    /// A connection was configured without its `owner/name` companion.
    #[error("repositoryOwnerAndName is required when using codestarConnectionArn")]
    MissingOwnerAndName,
}

/// Errors raised while writing the sample OpenAPI document.
#[derive(Debug, Error)]
pub enum SampleSpecError {
    #[error("IO error writing sample spec: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialise sample spec: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
