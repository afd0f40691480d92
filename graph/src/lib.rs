pub mod backoff;
pub mod content_store;
pub mod env;
pub mod error;
pub mod events;
pub mod log;
pub mod metrics;
pub mod prelude;
pub mod types;

/// Generated client stubs for the Graph Client Adapter's gRPC-style transport.
/// See `proto/graph_store.proto`.
pub mod grpc {
    tonic::include_proto!("honeygraph.store.v1");
}

pub use anyhow;
pub use slog;
pub use tokio;
