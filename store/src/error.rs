use honeygraph::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("schema rejected by graph store: {0}")]
    SchemaError(String),

    #[error("graph store write failed: {0}")]
    WriteError(#[source] anyhow::Error),

    #[error("graph store write deadline ({0:?}) exceeded")]
    WriteTimeout(std::time::Duration),

    #[error("graph store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),

    #[error("network '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("invalid network config: {0}")]
    InvalidConfig(String),

    #[error("storage I/O failure: {0}")]
    StorageError(#[source] anyhow::Error),

    #[error("no network registered with prefix '{0}'")]
    NotFound(String),
}

impl StoreError {
    /// Per §7: only store-unavailable and deadline-exceeded failures are
    /// retried at the pipeline level; everything else is terminal for the
    /// write that produced it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable(_) | StoreError::WriteTimeout(_) => ErrorKind::Retryable,
            _ => ErrorKind::Fatal,
        }
    }
}
