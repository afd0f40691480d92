//! In-memory fakes for the pipeline's external collaborators, used as
//! dev-dependencies across the workspace in place of a real graph store,
//! content-addressed store, or snapshot facility.

mod content_store;
mod graph_client;
mod snapshot;

pub use content_store::InMemoryContentStore;
pub use graph_client::{InMemoryGraphClient, InMemoryGraphClientFactory, SharedInMemoryGraphClientFactory};
pub use snapshot::InMemorySnapshotFacility;
