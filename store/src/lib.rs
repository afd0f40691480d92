pub mod client;
pub mod error;
pub mod mutation;
pub mod namespace;
pub mod registry;
pub mod snapshot;

pub use client::{GraphClient, GrpcGraphClient};
pub use error::StoreError;
pub use mutation::{EntityKind, Mutation, MutationOp};
pub use namespace::{namespaced, EntityScope};
pub use registry::{GraphClientFactory, NetworkConfig, NetworkRegistry, TokenDescriptor, TokenStat};
pub use snapshot::{FsSnapshotFacility, SnapshotFacility};
