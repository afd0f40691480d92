//! Client for the external content-addressed payload store (§6). Used for
//! two things: filling gaps in an empty `batch` message, and replaying a
//! canonical branch's checkpoint payloads during reorg recovery.
//!
//! Structured after the teacher's `graph::ipfs` module (`client.rs` /
//! `retry_policy.rs` split, `IpfsClient` trait), scaled down to the one
//! operation this system actually needs: fetch-by-hash.

mod http_client;
mod wire;

pub use http_client::HttpContentStore;
pub use wire::WireOperation;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{ForkHash, Operation};

/// Abstraction over "fetch the operations for a checkpoint hash", so the
/// Recovery Subsystem can be tested against an in-memory fake (see the
/// `mock` crate) without a real content-addressed store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetches and parses the payload for `hash`, returning the ordered
    /// operations it contains. `fork_hash` on every returned operation is
    /// overwritten with `hash` by the caller, not by the store.
    async fn fetch(&self, hash: &ForkHash) -> Result<Vec<Operation>, CoreError>;
}
