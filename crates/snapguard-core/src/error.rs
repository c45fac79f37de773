use thiserror::Error;

/// Top-level error type for the Snapguard system.
///
/// Each variant wraps a subsystem-specific error. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for
/// SnapguardError` so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SnapguardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Classification error: {0}")]
    Classify(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Retention error: {0}")]
    Retention(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for SnapguardError {
    fn from(err: toml::de::Error) -> Self {
        SnapguardError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SnapguardError {
    fn from(err: toml::ser::Error) -> Self {
        SnapguardError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SnapguardError {
    fn from(err: serde_json::Error) -> Self {
        SnapguardError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Snapguard operations.
pub type Result<T> = std::result::Result<T, SnapguardError>;
