//! Binds the Namespace Registry to the real graph store over gRPC. A
//! thin adapter because `GrpcGraphClient::connect` is async and needs the
//! store endpoint and message-size bound that only the registry's caller
//! (this binary) knows.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use honeygraph::types::NetworkPrefix;
use honeygraph_store::{GraphClient, GraphClientFactory, GrpcGraphClient, StoreError};
use slog::Logger;

pub struct GrpcGraphClientFactory {
    endpoint: String,
    max_message_bytes: usize,
    connect_timeout: Duration,
    logger: Logger,
}

impl GrpcGraphClientFactory {
    pub fn new(endpoint: String, max_message_bytes: usize, connect_timeout: Duration, logger: Logger) -> Self {
        GrpcGraphClientFactory {
            endpoint,
            max_message_bytes,
            connect_timeout,
            logger,
        }
    }
}

#[async_trait]
impl GraphClientFactory for GrpcGraphClientFactory {
    async fn create(&self, prefix: &NetworkPrefix) -> Result<Arc<dyn GraphClient>, StoreError> {
        let client = GrpcGraphClient::connect(
            prefix.clone(),
            self.endpoint.clone(),
            self.max_message_bytes,
            self.connect_timeout,
            self.logger.clone(),
        )
        .await?;
        Ok(Arc::new(client))
    }
}
