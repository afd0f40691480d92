//! Typed wrapper over the graph store (§4.1). The store itself is an
//! external collaborator accessed via a narrow gRPC-style service; this
//! module is the only place that protocol leaks into the codebase.

use std::time::Duration;

use async_trait::async_trait;
use honeygraph::grpc::graph_store_client::GraphStoreClient;
use honeygraph::grpc::{ApplySchemaRequest, QueryRequest, WriteRequest};
use honeygraph::types::NetworkPrefix;
use serde_json::Value;
use slog::{o, Logger};
use tonic::transport::{Channel, Endpoint};

use crate::error::StoreError;
use crate::mutation::{Mutation, MutationOp};
use crate::namespace::namespaced;

/// Public contract for the Graph Client Adapter. Implemented by
/// `GrpcGraphClient` against the real store and by an in-memory fake (see
/// the `mock` crate) in tests.
#[async_trait]
pub trait GraphClient: Send + Sync {
    async fn apply_schema(&self, text: &str) -> Result<(), StoreError>;
    async fn query(&self, text: &str, vars: Value) -> Result<Value, StoreError>;
    async fn write(&self, mutations: Vec<Mutation>) -> Result<(), StoreError>;
    async fn close(&self) -> Result<(), StoreError>;
}

/// Default implementation: an insecure gRPC channel to the graph store,
/// with configurable message-size bounds because a single block batch can
/// carry a large JSON payload (§4.1).
pub struct GrpcGraphClient {
    prefix: NetworkPrefix,
    inner: GraphStoreClient<Channel>,
    logger: Logger,
}

impl GrpcGraphClient {
    pub async fn connect(
        prefix: NetworkPrefix,
        endpoint_uri: impl Into<String>,
        max_message_bytes: usize,
        connect_timeout: Duration,
        logger: Logger,
    ) -> Result<Self, StoreError> {
        let endpoint = Endpoint::from_shared(endpoint_uri.into())
            .map_err(|e| StoreError::InvalidConfig(e.to_string()))?
            .connect_timeout(connect_timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| StoreError::Unavailable(e.into()))?;

        let inner = GraphStoreClient::new(channel)
            .max_decoding_message_size(max_message_bytes)
            .max_encoding_message_size(max_message_bytes);

        Ok(GrpcGraphClient {
            inner,
            logger: logger.new(o!("component" => "graph_client", "network" => prefix.to_string())),
            prefix,
        })
    }

    fn prefixed_mutation_json(&self, m: &Mutation) -> Value {
        let namespaced_temp_id = namespaced(&self.prefix, m.entity.scope(), &m.temp_id);
        let namespaced_identity = namespaced(&self.prefix, m.entity.scope(), &m.identity);

        let (action, mut body) = match &m.op {
            MutationOp::Set(v) => ("set", v.clone()),
            MutationOp::Delete(v) => ("delete", v.clone()),
        };

        if let Value::Object(ref mut map) = body {
            map.insert("uid".to_owned(), Value::String(format!("_:{}", namespaced_temp_id)));
            map.insert("identity".to_owned(), Value::String(namespaced_identity));
            map.insert(
                "dgraph.type".to_owned(),
                Value::String(m.entity.type_name().to_owned()),
            );
        }

        serde_json::json!({ "op": action, "body": body })
    }
}

#[async_trait]
impl GraphClient for GrpcGraphClient {
    async fn apply_schema(&self, text: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.clone();
        inner
            .apply_schema(ApplySchemaRequest {
                schema_text: text.to_owned(),
            })
            .await
            .map_err(|status| StoreError::SchemaError(status.message().to_owned()))?;
        Ok(())
    }

    async fn query(&self, text: &str, vars: Value) -> Result<Value, StoreError> {
        let mut inner = self.inner.clone();
        let vars_json = serde_json::to_vec(&vars).map_err(|e| StoreError::WriteError(e.into()))?;

        let resp = inner
            .query(QueryRequest {
                query_text: text.to_owned(),
                vars_json,
            })
            .await
            .map_err(|status| StoreError::Unavailable(anyhow::anyhow!(status.to_string())))?;

        serde_json::from_slice(&resp.into_inner().result_json)
            .map_err(|e| StoreError::WriteError(e.into()))
    }

    async fn write(&self, mutations: Vec<Mutation>) -> Result<(), StoreError> {
        if mutations.is_empty() {
            return Ok(());
        }

        let mutations_json = mutations
            .iter()
            .map(|m| serde_json::to_vec(&self.prefixed_mutation_json(m)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::WriteError(e.into()))?;

        let mut inner = self.inner.clone();
        let resp = inner
            .write(WriteRequest { mutations_json })
            .await
            .map_err(|status| classify_write_failure(status))?;

        if !resp.into_inner().committed {
            return Err(StoreError::WriteError(anyhow::anyhow!(
                "graph store reported an uncommitted write"
            )));
        }

        slog::debug!(self.logger, "committed write transaction"; "mutations" => mutations.len());
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn classify_write_failure(status: tonic::Status) -> StoreError {
    use tonic::Code;
    match status.code() {
        Code::Unavailable | Code::DeadlineExceeded | Code::ResourceExhausted => {
            StoreError::Unavailable(anyhow::anyhow!(status.to_string()))
        }
        _ => StoreError::WriteError(anyhow::anyhow!(status.to_string())),
    }
}
