//! An in-memory `SnapshotFacility` fake. Snapshots are plain clones of a
//! caller-supplied state blob rather than filesystem copies, so recovery
//! tests can run without touching disk.

use std::collections::HashMap;

use async_trait::async_trait;
use honeygraph_store::{SnapshotFacility, StoreError};
use parking_lot::RwLock;
use serde_json::Value;

#[derive(Default)]
pub struct InMemorySnapshotFacility {
    current: RwLock<Value>,
    snapshots: RwLock<HashMap<String, Value>>,
}

impl InMemorySnapshotFacility {
    pub fn new() -> Self {
        InMemorySnapshotFacility::default()
    }

    pub fn set_current(&self, value: Value) {
        *self.current.write() = value;
    }

    pub fn current(&self) -> Value {
        self.current.read().clone()
    }
}

#[async_trait]
impl SnapshotFacility for InMemorySnapshotFacility {
    async fn snapshot(&self, name: &str) -> Result<(), StoreError> {
        let current = self.current.read().clone();
        self.snapshots.write().insert(name.to_owned(), current);
        Ok(())
    }

    async fn rollback(&self, name: &str) -> Result<(), StoreError> {
        let restored = self
            .snapshots
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::StorageError(anyhow::anyhow!("no snapshot named '{}'", name)))?;
        *self.current.write() = restored;
        Ok(())
    }

    async fn destroy(&self, _prefix: &str) -> Result<(), StoreError> {
        *self.current.write() = Value::Null;
        Ok(())
    }
}
