use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use slog::{debug, o, warn, Logger};

use crate::backoff::ExponentialBackoff;
use crate::error::CoreError;
use crate::types::{ForkHash, ForkKey, Operation};

use super::wire::WireOperation;
use super::ContentStore;

/// Fetches `GET {base_url}/ipfs/<hash>` and parses the response body as a
/// JSON array of `WireOperation`s, per §6.
pub struct HttpContentStore {
    client: Client,
    base_url: String,
    timeout: Duration,
    backoff_base: Duration,
    backoff_max: Duration,
    logger: Logger,
}

impl HttpContentStore {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        backoff_base: Duration,
        backoff_max: Duration,
        logger: Logger,
    ) -> Self {
        HttpContentStore {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
            backoff_base,
            backoff_max,
            logger: logger.new(o!("component" => "content_store")),
        }
    }

    fn url_for(&self, hash: &ForkHash) -> String {
        format!("{}/ipfs/{}", self.base_url.trim_end_matches('/'), hash)
    }

    async fn fetch_once(&self, hash: &ForkHash) -> Result<Vec<WireOperation>, CoreError> {
        let url = self.url_for(hash);

        let resp = tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| CoreError::ContentStoreTimeout {
                hash: hash.to_string(),
                elapsed_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| CoreError::ContentStore {
                hash: hash.to_string(),
                source: e.into(),
            })?;

        let resp = resp.error_for_status().map_err(|e| CoreError::ContentStore {
            hash: hash.to_string(),
            source: e.into(),
        })?;

        resp.json::<Vec<WireOperation>>()
            .await
            .map_err(|e| CoreError::ContentStore {
                hash: hash.to_string(),
                source: e.into(),
            })
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn fetch(&self, hash: &ForkHash) -> Result<Vec<Operation>, CoreError> {
        let mut backoff = ExponentialBackoff::new(self.backoff_base, self.backoff_max);
        let mut last_err = None;

        for attempt in 0..3 {
            match self.fetch_once(hash).await {
                Ok(ops) => {
                    debug!(self.logger, "fetched checkpoint payload";
                        "hash" => hash.to_string(), "operations" => ops.len());
                    let fork_hash = ForkKey::Hash(hash.clone());
                    return Ok(ops
                        .into_iter()
                        .map(|w| w.into_operation(fork_hash.clone()))
                        .collect());
                }
                Err(e) => {
                    warn!(self.logger, "content store fetch failed, retrying";
                        "hash" => hash.to_string(), "attempt" => attempt, "error" => %e);
                    last_err = Some(e);
                    backoff.sleep_async().await;
                }
            }
        }

        Err(last_err.expect("loop always runs at least once"))
    }
}
