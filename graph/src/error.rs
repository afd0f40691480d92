//! Error kinds shared across crate boundaries. Each crate that needs a
//! richer, component-specific error type (the Namespace Registry's
//! `StoreError`, the Ingest Coordinator's `IngestError`, ...) defines its
//! own `thiserror` enum and converts into `CoreError` at the point where a
//! caller no longer needs the specific variant, the same way the teacher's
//! `graph` crate sits underneath `graph-core` and `graph-store-postgres`.

use thiserror::Error;

/// Whether a failure is worth retrying at the pipeline level. Per §7,
/// only store-write and content-store failures are ever `Retryable`; every
/// other kind is terminal for the operation that produced it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Retryable,
    Fatal,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("content store fetch for '{hash}' failed: {source}")]
    ContentStore {
        hash: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("content store request for '{hash}' timed out after {elapsed_secs}s")]
    ContentStoreTimeout { hash: String, elapsed_secs: u64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ContentStore { .. } | CoreError::ContentStoreTimeout { .. } => {
                ErrorKind::Retryable
            }
            CoreError::Other(_) => ErrorKind::Fatal,
        }
    }
}
