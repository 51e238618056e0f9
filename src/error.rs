use thiserror::Error;

/// Attitude estimator error types
///
/// Only configuration and input-source problems surface here. Per-sample
/// anomalies are absorbed by the pipeline and never become errors.
#[derive(Error, Debug)]
pub enum AttitudeError {
    #[error("No input source provided")]
    MissingSource,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for estimator setup and input loading
pub type Result<T> = std::result::Result<T, AttitudeError>;
