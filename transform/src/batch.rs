//! Orchestrates one logical batch through the accumulator (§4.7): a batch
//! is the set of operations bounded by a fork's buffer between two write
//! markers, or the contents of an `ipfs:batch` recovery fetch.

use honeygraph::metrics::IngestMetrics;
use honeygraph::types::{BlockInfo, NetworkPrefix, Operation};
use honeygraph_store::Mutation;
use slog::Logger;

use crate::accumulator::Accumulator;
use crate::dispatch::dispatch_operation;
use crate::stats::BatchStats;

/// Transforms a batch of operations for one network into a mutation list
/// plus summary statistics. Pure with respect to its inputs: two batches
/// carrying the same operations in the same order produce identical
/// mutation sets (§8's idempotence invariant).
pub struct Transformer {
    prefix: NetworkPrefix,
}

impl Transformer {
    pub fn new(prefix: NetworkPrefix) -> Self {
        Transformer { prefix }
    }

    /// Runs every non-marker operation through dispatch, then drains the
    /// accumulator. Write markers carry no data to transform; they exist
    /// only to bound the Fork Tracker's checkpoint boundary.
    pub fn transform_batch(
        &self,
        operations: &[Operation],
        metrics: &IngestMetrics,
        logger: &Logger,
    ) -> (Vec<Mutation>, BatchStats) {
        let mut acc = Accumulator::new(self.prefix.clone());

        for op in operations {
            if op.is_write_marker() {
                continue;
            }
            let block = BlockInfo {
                block_num: op.block_num,
                timestamp: op.timestamp,
            };
            dispatch_operation(&op.path, &op.data, op.kind, block, &mut acc, metrics, logger);
        }

        let (mutations, path_counts) = acc.drain();
        let stats = BatchStats::from_path_file_counts(&path_counts);
        (mutations, stats)
    }
}
