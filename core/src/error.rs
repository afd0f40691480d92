//! Errors raised by the Ingest Coordinator and its subsystems (§7).

use thiserror::Error;

use honeygraph::error::ErrorKind;
use honeygraph::types::BlockNumber;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed inbound message: {0}")]
    InvalidMessage(String),

    #[error("checkpoint at block {block_num} failed boundary validation: {reason}")]
    InvalidBoundary { block_num: BlockNumber, reason: String },

    #[error("graph-store write failed after exhausting retries")]
    WriteFailed(#[source] anyhow::Error),

    #[error("recovery failed for fork {fork_hash}: {reason}")]
    RecoveryFailed { fork_hash: String, reason: String },

    #[error("network degraded after recovery and upstream fallback both failed")]
    NetworkDegraded,

    #[error(transparent)]
    Store(#[from] honeygraph_store::StoreError),

    #[error(transparent)]
    Content(#[from] honeygraph::error::CoreError),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::WriteFailed(_) => ErrorKind::Retryable,
            IngestError::Store(e) => e.kind(),
            IngestError::Content(e) => e.kind(),
            _ => ErrorKind::Fatal,
        }
    }
}
