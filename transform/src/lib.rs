//! Data Transformer (§4.7): turns `(path, data)` operations into graph
//! mutations, grouped by batch. Depends on `honeygraph-store` only for the
//! `Mutation`/`EntityKind` shapes it produces, never for the transport that
//! commits them.

mod accumulator;
mod batch;
mod contract;
mod dispatch;
mod simple;
mod stats;

pub use accumulator::{Accumulator, Identity};
pub use batch::Transformer;
pub use dispatch::dispatch_operation;
pub use stats::BatchStats;
