//! An in-memory `GraphClient` that records committed mutations by their
//! namespaced identity, standing in for a real graph store in tests
//! (§8 scenario 6's namespace isolation check reads through this fake).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use honeygraph::types::NetworkPrefix;
use honeygraph_store::{namespaced, EntityKind, GraphClient, GraphClientFactory, Mutation, MutationOp, StoreError};
use parking_lot::RwLock;
use serde_json::Value;

type EntityStore = Arc<RwLock<HashMap<String, (EntityKind, Value)>>>;

#[derive(Default)]
pub struct InMemoryGraphClient {
    prefix: RwLock<Option<NetworkPrefix>>,
    schema: RwLock<Vec<String>>,
    entities: EntityStore,
}

impl InMemoryGraphClient {
    pub fn new() -> Self {
        InMemoryGraphClient::default()
    }

    pub fn for_prefix(prefix: NetworkPrefix) -> Self {
        let client = InMemoryGraphClient::new();
        *client.prefix.write() = Some(prefix);
        client
    }

    /// Binds `prefix` to a caller-supplied backing map rather than a fresh
    /// one, so two clients can stand in for two network-scoped connections
    /// to the *same* physical store (the real `GrpcGraphClient`'s actual
    /// topology: one backend, many network-prefixed clients). Lets tests
    /// observe that a global entity written under one prefix is visible
    /// through another.
    pub fn sharing_store(prefix: NetworkPrefix, entities: EntityStore) -> Self {
        InMemoryGraphClient {
            prefix: RwLock::new(Some(prefix)),
            schema: RwLock::new(Vec::new()),
            entities,
        }
    }

    /// Reads back the value stored for a non-namespaced identity, applying
    /// the same namespacing rule a real write would have (global entities
    /// pass through; namespaced entities are prefixed).
    pub fn get(&self, entity: EntityKind, identity: &str) -> Option<Value> {
        let prefix = self.prefix.read().clone()?;
        let key = namespaced(&prefix, entity.scope(), identity);
        self.entities.read().get(&key).map(|(_, v)| v.clone())
    }

    pub fn schema_applications(&self) -> Vec<String> {
        self.schema.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }
}

#[async_trait]
impl GraphClient for InMemoryGraphClient {
    async fn apply_schema(&self, text: &str) -> Result<(), StoreError> {
        self.schema.write().push(text.to_owned());
        Ok(())
    }

    async fn query(&self, _text: &str, _vars: Value) -> Result<Value, StoreError> {
        let snapshot: HashMap<String, Value> = self
            .entities
            .read()
            .iter()
            .map(|(k, (_, v))| (k.clone(), v.clone()))
            .collect();
        Ok(serde_json::to_value(snapshot).unwrap_or(Value::Null))
    }

    async fn write(&self, mutations: Vec<Mutation>) -> Result<(), StoreError> {
        let prefix = self
            .prefix
            .read()
            .clone()
            .ok_or_else(|| StoreError::InvalidConfig("InMemoryGraphClient has no prefix set".into()))?;

        let mut entities = self.entities.write();
        for m in mutations {
            let key = namespaced(&prefix, m.entity.scope(), &m.identity);
            match m.op {
                MutationOp::Set(v) => {
                    entities.insert(key, (m.entity, v));
                }
                MutationOp::Delete(_) => {
                    entities.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Hands out one shared `InMemoryGraphClient` per prefix, so tests can
/// register several networks and inspect each one's committed state.
#[derive(Default)]
pub struct InMemoryGraphClientFactory {
    clients: RwLock<HashMap<NetworkPrefix, Arc<InMemoryGraphClient>>>,
}

impl InMemoryGraphClientFactory {
    pub fn new() -> Self {
        InMemoryGraphClientFactory::default()
    }

    pub fn client_for(&self, prefix: &NetworkPrefix) -> Option<Arc<InMemoryGraphClient>> {
        self.clients.read().get(prefix).cloned()
    }
}

#[async_trait]
impl GraphClientFactory for InMemoryGraphClientFactory {
    async fn create(&self, prefix: &NetworkPrefix) -> Result<Arc<dyn GraphClient>, StoreError> {
        let client = Arc::new(InMemoryGraphClient::for_prefix(prefix.clone()));
        self.clients.write().insert(prefix.clone(), client.clone());
        Ok(client)
    }
}

/// A factory whose clients all share one backing map, modeling the real
/// deployment's single physical store behind many network-scoped
/// connections. `InMemoryGraphClientFactory` gives every network an
/// isolated store instead, which is what most tests want; reach for this
/// one specifically to exercise global-entity visibility across networks.
#[derive(Default)]
pub struct SharedInMemoryGraphClientFactory {
    store: EntityStore,
    clients: RwLock<HashMap<NetworkPrefix, Arc<InMemoryGraphClient>>>,
}

impl SharedInMemoryGraphClientFactory {
    pub fn new() -> Self {
        SharedInMemoryGraphClientFactory::default()
    }

    pub fn client_for(&self, prefix: &NetworkPrefix) -> Option<Arc<InMemoryGraphClient>> {
        self.clients.read().get(prefix).cloned()
    }
}

#[async_trait]
impl GraphClientFactory for SharedInMemoryGraphClientFactory {
    async fn create(&self, prefix: &NetworkPrefix) -> Result<Arc<dyn GraphClient>, StoreError> {
        let client = Arc::new(InMemoryGraphClient::sharing_store(prefix.clone(), self.store.clone()));
        self.clients.write().insert(prefix.clone(), client.clone());
        Ok(client)
    }
}
