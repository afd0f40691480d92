//! An in-memory `ContentStore` fake: payloads are registered by hash up
//! front, so recovery tests can exercise gap-fill and replay without an
//! HTTP server.

use std::collections::HashMap;

use async_trait::async_trait;
use honeygraph::content_store::ContentStore;
use honeygraph::error::CoreError;
use honeygraph::types::{ForkHash, Operation};
use parking_lot::RwLock;

#[derive(Default)]
pub struct InMemoryContentStore {
    payloads: RwLock<HashMap<String, Vec<Operation>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        InMemoryContentStore::default()
    }

    pub fn register(&self, hash: impl Into<String>, operations: Vec<Operation>) {
        self.payloads.write().insert(hash.into(), operations);
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn fetch(&self, hash: &ForkHash) -> Result<Vec<Operation>, CoreError> {
        self.payloads
            .read()
            .get(hash.as_str())
            .cloned()
            .ok_or_else(|| CoreError::ContentStore {
                hash: hash.to_string(),
                source: anyhow::anyhow!("no payload registered for this hash"),
            })
    }
}
