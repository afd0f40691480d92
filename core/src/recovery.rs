//! Recovery Subsystem (§4.8, §8, §9): resolves competing forks at the same
//! height, rolls back and replays through the external snapshot facility
//! and content store, and fills gaps signalled by an empty `batch` message.

use std::sync::Arc;

use honeygraph::backoff::ExponentialBackoff;
use honeygraph::content_store::ContentStore;
use honeygraph::types::{BlockNumber, ForkHash, NetworkPrefix, Operation};
use honeygraph_store::SnapshotFacility;
use slog::{info, o, warn, Logger};

use crate::error::IngestError;

/// One fork competing for canonical status at a given height.
#[derive(Clone, Debug)]
pub struct ForkCandidate {
    pub hash: ForkHash,
    /// Number of distinct nodes that reported this hash.
    pub witness_count: usize,
}

/// Chooses the canonical branch among competing forks at the same height.
/// Pluggable per §9's open question; `MajorityThenLowestHash` is the
/// default.
pub trait CanonicalSelector: Send + Sync {
    fn select(&self, candidates: &[ForkCandidate]) -> ForkHash;
}

/// Majority vote by witness count; ties broken by the lexicographically
/// lowest hash so the choice is deterministic across replicas that saw
/// the same candidate set in a different order.
pub struct MajorityThenLowestHash;

impl CanonicalSelector for MajorityThenLowestHash {
    fn select(&self, candidates: &[ForkCandidate]) -> ForkHash {
        candidates
            .iter()
            .max_by(|a, b| {
                a.witness_count
                    .cmp(&b.witness_count)
                    .then_with(|| b.hash.as_str().cmp(a.hash.as_str()))
            })
            .map(|c| c.hash.clone())
            .expect("select is never called with an empty candidate list")
    }
}

pub struct RecoverySubsystem {
    content_store: Arc<dyn ContentStore>,
    snapshot_facility: Arc<dyn SnapshotFacility>,
    selector: Arc<dyn CanonicalSelector>,
    logger: Logger,
}

impl RecoverySubsystem {
    pub fn new(
        content_store: Arc<dyn ContentStore>,
        snapshot_facility: Arc<dyn SnapshotFacility>,
        selector: Arc<dyn CanonicalSelector>,
        logger: Logger,
    ) -> Self {
        RecoverySubsystem {
            content_store,
            snapshot_facility,
            selector,
            logger: logger.new(o!("component" => "recovery")),
        }
    }

    pub fn select_canonical(&self, candidates: &[ForkCandidate]) -> ForkHash {
        self.selector.select(candidates)
    }

    /// Rolls back to `restore_point`, discards the orphaned fork's buffer
    /// (the caller drops it), fetches and replays canonical payloads for
    /// every block from `restore_point + 1` through `replay_through`
    /// (scenario 3 in §8). Tolerates the snapshot facility's absence only
    /// by surfacing `RecoveryFailed` rather than guessing at a recovery.
    pub async fn rollback_and_replay(
        &self,
        network: &NetworkPrefix,
        restore_point: &str,
        canonical_hashes: &[ForkHash],
    ) -> Result<Vec<Operation>, IngestError> {
        self.snapshot_facility
            .rollback(restore_point)
            .await
            .map_err(|e| IngestError::RecoveryFailed {
                fork_hash: restore_point.to_owned(),
                reason: e.to_string(),
            })?;

        let mut replayed = Vec::new();
        for hash in canonical_hashes {
            let ops = self.fetch_with_retry(hash).await?;
            replayed.extend(ops);
        }

        info!(self.logger, "rollback and replay complete";
            "network" => network.to_string(), "restore_point" => restore_point, "replayed" => replayed.len());
        Ok(replayed)
    }

    /// Fills a gap signalled by an empty `batch` message (§8 scenario 4):
    /// fetches `hash`'s payload from the content store and returns its
    /// operations so the coordinator can reinject them as if received
    /// normally.
    pub async fn fill_gap(
        &self,
        hash: &ForkHash,
        requested_from: BlockNumber,
        requested_to: BlockNumber,
    ) -> Result<Vec<Operation>, IngestError> {
        let ops = self.fetch_with_retry(hash).await?;
        let in_range: Vec<Operation> = ops
            .into_iter()
            .filter(|op| op.block_num >= requested_from && op.block_num <= requested_to)
            .collect();
        Ok(in_range)
    }

    async fn fetch_with_retry(&self, hash: &ForkHash) -> Result<Vec<Operation>, IngestError> {
        let mut backoff = ExponentialBackoff::new(
            std::time::Duration::from_millis(250),
            std::time::Duration::from_secs(30),
        );
        let mut last_err = None;
        for attempt in 0..3 {
            match self.content_store.fetch(hash).await {
                Ok(ops) => return Ok(ops),
                Err(e) => {
                    warn!(self.logger, "content store fetch failed, retrying";
                        "hash" => hash.as_str(), "attempt" => attempt, "error" => %e);
                    last_err = Some(e);
                    backoff.sleep_async().await;
                }
            }
        }
        Err(IngestError::RecoveryFailed {
            fork_hash: hash.to_string(),
            reason: last_err.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// Requests missing operations from the upstream node when the content
    /// store fetch itself also fails (§7's `RecoveryFailed` fallback
    /// chain). The coordinator sends the resulting `request_missing`
    /// reply; this call only computes the range to ask for.
    pub fn upstream_fallback_range(&self, from: BlockNumber, to: BlockNumber) -> (BlockNumber, BlockNumber) {
        (from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_then_lowest_hash_breaks_ties_deterministically() {
        let selector = MajorityThenLowestHash;
        let candidates = vec![
            ForkCandidate { hash: ForkHash::from("H1b"), witness_count: 1 },
            ForkCandidate { hash: ForkHash::from("H1a"), witness_count: 1 },
        ];
        assert_eq!(selector.select(&candidates).as_str(), "H1a");
    }

    #[test]
    fn majority_then_lowest_hash_prefers_more_witnesses() {
        let selector = MajorityThenLowestHash;
        let candidates = vec![
            ForkCandidate { hash: ForkHash::from("H1a"), witness_count: 1 },
            ForkCandidate { hash: ForkHash::from("H1b"), witness_count: 2 },
        ];
        assert_eq!(selector.select(&candidates).as_str(), "H1b");
    }
}
