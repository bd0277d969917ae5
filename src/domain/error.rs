use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    /// No working parser exists for the provider (unknown name or skeleton).
    #[error("unsupported operation for provider {provider}: {reason}")]
    UnsupportedOperation { provider: String, reason: String },

    /// The file could not be read as XML at all.
    #[error("malformed input in {}: {reason}", path.display())]
    MalformedInput { path: PathBuf, reason: String },

    #[error("backend write failed: {0}")]
    BackendWrite(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("an import run is already in progress")]
    ImportInProgress,
}

impl IngestionError {
    pub fn unsupported(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MalformedInput {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedOperation { .. })
    }
}
