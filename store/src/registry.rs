//! Namespace / Network Registry (§4.2): maps a network prefix to its
//! schema, data directory, token set, and a dedicated Graph Client.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use honeygraph::prelude::*;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use slog::{error, info, o};

use crate::client::GraphClient;
use crate::error::StoreError;

lazy_static::lazy_static! {
    static ref TOKEN_SYMBOL_RE: Regex = Regex::new("^[A-Z0-9]{2,10}$").unwrap();
}

/// Base schema every network gets, regardless of its own extension. Kept
/// as a constant rather than a file so the registry has no load-time
/// dependency beyond the graph store itself.
pub const BASE_SCHEMA: &str = r#"
type Account { username: string @index(exact) . }
type Path { full_path: string @index(exact) . item_count: int . }
"#;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub description: String,
    pub tokens: Vec<TokenDescriptor>,
    #[serde(default)]
    pub schema_extension: Option<String>,
}

impl NetworkConfig {
    fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::InvalidConfig("name must not be empty".into()));
        }
        if self.description.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "description must not be empty".into(),
            ));
        }
        if self.tokens.is_empty() {
            return Err(StoreError::InvalidConfig(
                "at least one token is required".into(),
            ));
        }
        for t in &self.tokens {
            if !TOKEN_SYMBOL_RE.is_match(&t.symbol) {
                return Err(StoreError::InvalidConfig(format!(
                    "token symbol '{}' must match ^[A-Z0-9]{{2,10}}$",
                    t.symbol
                )));
            }
            if t.name.trim().is_empty() {
                return Err(StoreError::InvalidConfig(format!(
                    "token '{}' is missing a name",
                    t.symbol
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenStat {
    pub symbol: String,
    pub circulating: String,
}

#[derive(Clone, Serialize, Deserialize)]
struct CheckpointArtifact {
    block_num: BlockNumber,
    state_hash: String,
    token_stats: Vec<TokenStat>,
}

/// Creates the Graph Client a newly registered network is bound to.
/// Abstracted behind a trait so tests can install an in-memory fake (see
/// the `mock` crate) instead of dialing a real graph store.
#[async_trait]
pub trait GraphClientFactory: Send + Sync {
    async fn create(&self, prefix: &NetworkPrefix) -> Result<Arc<dyn GraphClient>, StoreError>;
}

struct NetworkEntry {
    config: NetworkConfig,
    data_dir: PathBuf,
    client: Arc<dyn GraphClient>,
}

pub struct NetworkRegistry {
    data_dir: PathBuf,
    factory: Arc<dyn GraphClientFactory>,
    entries: RwLock<HashMap<NetworkPrefix, NetworkEntry>>,
    logger: Logger,
}

impl NetworkRegistry {
    pub fn new(data_dir: impl Into<PathBuf>, factory: Arc<dyn GraphClientFactory>, logger: Logger) -> Self {
        NetworkRegistry {
            data_dir: data_dir.into(),
            factory,
            entries: RwLock::new(HashMap::new()),
            logger: logger.new(o!("component" => "network_registry")),
        }
    }

    fn registry_file(&self) -> PathBuf {
        self.data_dir.join("network-registry.json")
    }

    /// Reconstitutes the registry from its persisted file. A failure to
    /// read or reconnect any one entry is logged but never aborts startup
    /// of sibling networks (§4.2 Durability).
    pub async fn load(
        data_dir: impl Into<PathBuf>,
        factory: Arc<dyn GraphClientFactory>,
        logger: Logger,
    ) -> Result<Self, StoreError> {
        let registry = NetworkRegistry::new(data_dir, factory, logger);

        let path = registry.registry_file();
        if !path.exists() {
            return Ok(registry);
        }

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| StoreError::StorageError(e.into()))?;
        let persisted: HashMap<String, NetworkConfig> =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::StorageError(e.into()))?;

        for (prefix_str, config) in persisted {
            let prefix = match NetworkPrefix::try_from(prefix_str.as_str()) {
                Ok(p) => p,
                Err(e) => {
                    error!(registry.logger, "skipping malformed persisted prefix"; "prefix" => prefix_str, "error" => %e);
                    continue;
                }
            };

            if let Err(e) = registry.install(&prefix, config).await {
                error!(registry.logger, "failed to reconstitute network, skipping";
                    "prefix" => prefix.to_string(), "error" => %e);
            }
        }

        Ok(registry)
    }

    async fn install(&self, prefix: &NetworkPrefix, config: NetworkConfig) -> Result<(), StoreError> {
        let network_dir = self.data_dir.join("networks").join(prefix.as_str());
        tokio::fs::create_dir_all(&network_dir)
            .await
            .map_err(|e| StoreError::StorageError(e.into()))?;

        let client = self.factory.create(prefix).await?;

        let mut schema = BASE_SCHEMA.to_owned();
        if let Some(ext) = &config.schema_extension {
            schema.push_str(ext);
        }
        client.apply_schema(&schema).await?;

        self.entries.write().insert(
            prefix.clone(),
            NetworkEntry {
                config,
                data_dir: network_dir,
                client,
            },
        );
        Ok(())
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let snapshot: HashMap<String, NetworkConfig> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.to_string(), v.config.clone()))
            .collect();

        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|e| StoreError::StorageError(e.into()))?;
        let bytes =
            serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::StorageError(e.into()))?;
        tokio::fs::write(self.registry_file(), bytes)
            .await
            .map_err(|e| StoreError::StorageError(e.into()))
    }

    pub async fn register(&self, prefix: &str, config: NetworkConfig) -> Result<(), StoreError> {
        let prefix = NetworkPrefix::try_from(prefix)
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;

        if self.entries.read().contains_key(&prefix) {
            return Err(StoreError::AlreadyRegistered(prefix.to_string()));
        }

        self.install(&prefix, config).await?;
        self.persist().await?;

        info!(self.logger, "registered network"; "prefix" => prefix.to_string());
        Ok(())
    }

    pub fn get(&self, prefix: &str) -> Option<Arc<dyn GraphClient>> {
        let prefix = NetworkPrefix::try_from(prefix).ok()?;
        self.entries.read().get(&prefix).map(|e| e.client.clone())
    }

    pub fn all(&self) -> Vec<NetworkPrefix> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn find_by_token(&self, symbol: &str) -> Vec<NetworkPrefix> {
        self.entries
            .read()
            .iter()
            .filter(|(_, e)| e.config.tokens.iter().any(|t| t.symbol == symbol))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Records a checkpoint artifact under `checkpoints/<prefix>/<blockNum>.json`.
    pub async fn snapshot(
        &self,
        prefix: &str,
        block_num: BlockNumber,
        state_hash: &str,
        token_stats: Vec<TokenStat>,
    ) -> Result<(), StoreError> {
        let prefix = NetworkPrefix::try_from(prefix)
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        if !self.entries.read().contains_key(&prefix) {
            return Err(StoreError::NotFound(prefix.to_string()));
        }

        let dir = self.data_dir.join("checkpoints").join(prefix.as_str());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::StorageError(e.into()))?;

        let artifact = CheckpointArtifact {
            block_num,
            state_hash: state_hash.to_owned(),
            token_stats,
        };
        let bytes =
            serde_json::to_vec_pretty(&artifact).map_err(|e| StoreError::StorageError(e.into()))?;
        tokio::fs::write(dir.join(format!("{}.json", block_num)), bytes)
            .await
            .map_err(|e| StoreError::StorageError(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullClient;

    #[async_trait]
    impl GraphClient for NullClient {
        async fn apply_schema(&self, _text: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn query(&self, _text: &str, _vars: serde_json::Value) -> Result<serde_json::Value, StoreError> {
            Ok(serde_json::Value::Null)
        }
        async fn write(&self, _mutations: Vec<crate::mutation::Mutation>) -> Result<(), StoreError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct CountingFactory(AtomicUsize);

    #[async_trait]
    impl GraphClientFactory for CountingFactory {
        async fn create(&self, _prefix: &NetworkPrefix) -> Result<Arc<dyn GraphClient>, StoreError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullClient))
        }
    }

    fn config() -> NetworkConfig {
        NetworkConfig {
            name: "SPK Network".into(),
            description: "test network".into(),
            tokens: vec![TokenDescriptor {
                symbol: "SPK".into(),
                name: "SPK token".into(),
            }],
            schema_extension: None,
        }
    }

    #[tokio::test]
    async fn register_rejects_bad_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let registry = NetworkRegistry::new(
            dir.path(),
            Arc::new(CountingFactory(AtomicUsize::new(0))),
            honeygraph::log::discard_logger(),
        );
        let err = registry.register("not-a-prefix", config()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn register_rejects_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let registry = NetworkRegistry::new(
            dir.path(),
            Arc::new(CountingFactory(AtomicUsize::new(0))),
            honeygraph::log::discard_logger(),
        );
        registry.register("spkccT_", config()).await.unwrap();
        let err = registry.register("spkccT_", config()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn register_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(CountingFactory(AtomicUsize::new(0)));
        let registry = NetworkRegistry::new(dir.path(), factory.clone(), honeygraph::log::discard_logger());
        registry.register("spkccT_", config()).await.unwrap();

        let reloaded = NetworkRegistry::load(dir.path(), factory, honeygraph::log::discard_logger())
            .await
            .unwrap();
        assert_eq!(reloaded.all().len(), 1);
        assert!(reloaded.get("spkccT_").is_some());
    }

    #[tokio::test]
    async fn find_by_token_matches_registered_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let registry = NetworkRegistry::new(
            dir.path(),
            Arc::new(CountingFactory(AtomicUsize::new(0))),
            honeygraph::log::discard_logger(),
        );
        registry.register("spkccT_", config()).await.unwrap();
        assert_eq!(registry.find_by_token("SPK").len(), 1);
        assert_eq!(registry.find_by_token("NOPE").len(), 0);
    }
}
