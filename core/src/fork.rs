//! Fork Tracker (§4.8, §9): owns the per-network fork map and checkpoint
//! map behind a single lock, exposing operations rather than the maps
//! themselves, mirroring the teacher's `BlockStreamState` shape for the
//! state machine itself.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use honeygraph::types::{BlockNumber, Checkpoint, ForkHash, ForkKey, NetworkPrefix, Operation};
use parking_lot::Mutex;

/// A Fork's lifecycle. Valid transitions: `Open -> Closed`, then
/// `Closed -> Confirmed` or `Closed -> Orphaned`. A fork never re-opens
/// once closed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ForkState {
    /// Accepting operations; no checkpoint has bounded it yet.
    Open,
    /// A `sendCheckpoint` closed the buffer; awaiting canonical selection.
    Closed,
    /// Selected as the canonical branch at its height.
    Confirmed,
    /// Lost canonical selection or was swept as stale.
    Orphaned,
}

/// One branch of in-flight operations for a network, keyed by its
/// checkpoint hash (or `Pending` before any checkpoint has closed it).
pub struct Fork {
    pub key: ForkKey,
    pub prev_hash: Option<ForkHash>,
    pub state: ForkState,
    pub buffer: VecDeque<Operation>,
    pub node_ids: HashSet<String>,
    pub checkpoint: Option<Checkpoint>,
    pub last_update: Instant,
    /// Set when the oldest write marker was evicted by the buffer cap;
    /// confirmation is refused until a fresh write marker is resubmitted
    /// (§8 boundary behavior).
    pub confirmation_disabled: bool,
}

impl Fork {
    fn new(key: ForkKey) -> Self {
        Fork {
            key,
            prev_hash: None,
            state: ForkState::Open,
            buffer: VecDeque::new(),
            node_ids: HashSet::new(),
            checkpoint: None,
            last_update: Instant::now(),
            confirmation_disabled: false,
        }
    }

    /// Appends `op`, evicting the oldest entry if the buffer is already at
    /// `cap`. Returns true if the evicted entry was a write marker.
    pub fn push_operation(&mut self, op: Operation, cap: usize) {
        self.last_update = Instant::now();
        if self.buffer.len() >= cap {
            if let Some(evicted) = self.buffer.pop_front() {
                if evicted.is_write_marker() {
                    self.confirmation_disabled = true;
                }
            }
        }
        self.buffer.push_back(op);
    }

    pub fn last_write_marker(&self) -> Option<&Operation> {
        self.buffer.iter().rev().find(|op| op.is_write_marker())
    }

    pub fn highest_block_num(&self) -> Option<BlockNumber> {
        self.buffer.iter().map(|op| op.block_num).max()
    }
}

struct NetworkState {
    forks: HashMap<ForkKey, Fork>,
    /// Accepted checkpoints, by block number. Per §8, two confirmed
    /// checkpoints at the same height must carry equal hashes.
    checkpoints: HashMap<BlockNumber, ForkHash>,
    /// The fork each connected node is currently appending to.
    active_fork: HashMap<String, ForkKey>,
}

impl NetworkState {
    fn new() -> Self {
        NetworkState {
            forks: HashMap::new(),
            checkpoints: HashMap::new(),
            active_fork: HashMap::new(),
        }
    }
}

/// Outcome of closing a fork with an incoming checkpoint.
#[derive(Debug)]
pub enum CloseOutcome {
    /// No competing hash was seen at this height; `key` is now `Closed`.
    Accepted,
    /// A different hash was already recorded at this height.
    ForkDetected { canonical_hash: ForkHash },
}

pub struct ForkTracker {
    networks: Mutex<HashMap<NetworkPrefix, NetworkState>>,
    buffer_cap: usize,
}

impl ForkTracker {
    pub fn new(buffer_cap: usize) -> Self {
        ForkTracker {
            networks: Mutex::new(HashMap::new()),
            buffer_cap,
        }
    }

    fn with_network<R>(&self, network: &NetworkPrefix, f: impl FnOnce(&mut NetworkState) -> R) -> R {
        let mut guard = self.networks.lock();
        let state = guard.entry(network.clone()).or_insert_with(NetworkState::new);
        f(state)
    }

    /// Appends `op` to `node_id`'s active fork, opening a `Pending` fork
    /// if the node has none yet.
    pub fn record_operation(&self, network: &NetworkPrefix, node_id: &str, op: Operation) {
        self.with_network(network, |state| {
            let key = state
                .active_fork
                .entry(node_id.to_owned())
                .or_insert(ForkKey::Pending)
                .clone();
            let fork = state.forks.entry(key.clone()).or_insert_with(|| Fork::new(key));
            fork.node_ids.insert(node_id.to_owned());
            fork.push_operation(op, self.buffer_cap);
        });
    }

    /// Closes `node_id`'s active (pending) fork with `checkpoint`, rekeying
    /// it under the checkpoint's hash. Detects a competing hash already
    /// recorded at this height.
    pub fn close_fork(
        &self,
        network: &NetworkPrefix,
        node_id: &str,
        checkpoint: Checkpoint,
    ) -> CloseOutcome {
        self.with_network(network, |state| {
            let pending_key = state
                .active_fork
                .get(node_id)
                .cloned()
                .unwrap_or(ForkKey::Pending);

            let mut fork = state.forks.remove(&pending_key).unwrap_or_else(|| Fork::new(pending_key.clone()));
            fork.key = ForkKey::Hash(checkpoint.hash.clone());
            fork.prev_hash = Some(checkpoint.prev_hash.clone());
            fork.state = ForkState::Closed;
            fork.checkpoint = Some(checkpoint.clone());

            let outcome = match state.checkpoints.get(&checkpoint.block_num) {
                Some(existing) if *existing != checkpoint.hash => CloseOutcome::ForkDetected {
                    canonical_hash: existing.clone(),
                },
                _ => {
                    state.checkpoints.insert(checkpoint.block_num, checkpoint.hash.clone());
                    CloseOutcome::Accepted
                }
            };

            state.active_fork.insert(node_id.to_owned(), fork.key.clone());
            state.forks.insert(fork.key.clone(), fork);
            outcome
        })
    }

    pub fn confirm(&self, network: &NetworkPrefix, hash: &ForkHash) {
        self.with_network(network, |state| {
            if let Some(fork) = state.forks.get_mut(&ForkKey::Hash(hash.clone())) {
                fork.state = ForkState::Confirmed;
            }
        });
    }

    pub fn orphan(&self, network: &NetworkPrefix, hash: &ForkHash) {
        self.with_network(network, |state| {
            if let Some(fork) = state.forks.get_mut(&ForkKey::Hash(hash.clone())) {
                fork.state = ForkState::Orphaned;
            }
        });
    }

    /// Removes `node_id` from any fork it belonged to, dropping its active
    /// pointer (§4.8 disconnect handling).
    pub fn remove_node(&self, network: &NetworkPrefix, node_id: &str) {
        self.with_network(network, |state| {
            state.active_fork.remove(node_id);
            for fork in state.forks.values_mut() {
                fork.node_ids.remove(node_id);
            }
        });
    }

    pub fn checkpoint_map(&self, network: &NetworkPrefix) -> HashMap<BlockNumber, ForkHash> {
        self.with_network(network, |state| state.checkpoints.clone())
    }

    /// Evicts forks whose `lastUpdate` predates `retention`, and separately
    /// sweeps forks that have fallen more than `sweep_lag_blocks` behind
    /// the highest confirmed checkpoint (§4.8).
    pub fn sweep(
        &self,
        network: &NetworkPrefix,
        retention: std::time::Duration,
        sweep_lag_blocks: BlockNumber,
    ) -> Vec<ForkKey> {
        self.with_network(network, |state| {
            let newest = state.checkpoints.keys().copied().max().unwrap_or(0);
            let now = Instant::now();
            let mut evicted = Vec::new();

            state.forks.retain(|key, fork| {
                let stale_by_age = now.duration_since(fork.last_update) > retention;
                let stale_by_lag = matches!(fork.state, ForkState::Orphaned)
                    && fork
                        .checkpoint
                        .as_ref()
                        .map(|c| newest.saturating_sub(c.block_num) > sweep_lag_blocks)
                        .unwrap_or(false);

                let keep = !(stale_by_age || stale_by_lag);
                if !keep {
                    evicted.push(key.clone());
                }
                keep
            });

            state.active_fork.retain(|_, k| state.forks.contains_key(k));
            evicted
        })
    }

    pub fn fork_snapshot(&self, network: &NetworkPrefix, key: &ForkKey) -> Option<ForkSnapshot> {
        self.with_network(network, |state| {
            state.forks.get(key).map(|f| ForkSnapshot {
                state: f.state,
                buffer: f.buffer.iter().cloned().collect(),
                confirmation_disabled: f.confirmation_disabled,
                checkpoint: f.checkpoint.clone(),
            })
        })
    }
}

/// An immutable read of a fork's buffer and state, returned so callers
/// never hold the tracker's lock across an `.await` point.
#[derive(Clone)]
pub struct ForkSnapshot {
    pub state: ForkState,
    pub buffer: Vec<Operation>,
    pub confirmation_disabled: bool,
    pub checkpoint: Option<Checkpoint>,
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use honeygraph::types::OperationKind;

    use super::*;

    fn prefix() -> NetworkPrefix {
        NetworkPrefix::try_from("spkccT_").unwrap()
    }

    fn op(kind: OperationKind, index: u64, block_num: BlockNumber) -> Operation {
        Operation {
            kind,
            path: vec!["balances".into(), "alice".into()],
            data: serde_json::json!(1),
            index,
            block_num,
            timestamp: 0,
            fork_hash: ForkKey::Pending,
        }
    }

    #[test]
    fn buffer_cap_evicts_oldest_and_disables_confirmation_if_marker_evicted() {
        let tracker = ForkTracker::new(2);
        let network = prefix();
        tracker.record_operation(&network, "n1", op(OperationKind::WriteMarker, 1, 100));
        tracker.record_operation(&network, "n1", op(OperationKind::Put, 2, 100));
        tracker.record_operation(&network, "n1", op(OperationKind::Put, 3, 100));

        let snap = tracker.fork_snapshot(&network, &ForkKey::Pending).unwrap();
        assert_eq!(snap.buffer.len(), 2);
        assert!(snap.confirmation_disabled);
    }

    #[test]
    fn close_fork_detects_competing_checkpoint_at_same_height() {
        let tracker = ForkTracker::new(100);
        let network = prefix();
        tracker.record_operation(&network, "a", op(OperationKind::Put, 1, 100));
        tracker.record_operation(&network, "b", op(OperationKind::Put, 1, 100));

        let cp_a = Checkpoint {
            block_num: 101,
            hash: ForkHash::from("H1a"),
            prev_hash: ForkHash::from("H0"),
            timestamp: 0,
        };
        let cp_b = Checkpoint {
            block_num: 101,
            hash: ForkHash::from("H1b"),
            prev_hash: ForkHash::from("H0"),
            timestamp: 0,
        };

        assert!(matches!(
            tracker.close_fork(&network, "a", cp_a),
            CloseOutcome::Accepted
        ));
        match tracker.close_fork(&network, "b", cp_b) {
            CloseOutcome::ForkDetected { canonical_hash } => {
                assert_eq!(canonical_hash.as_str(), "H1a");
            }
            CloseOutcome::Accepted => panic!("expected a fork to be detected"),
        }
    }

    #[test]
    fn remove_node_drops_membership_without_dropping_fork() {
        let tracker = ForkTracker::new(100);
        let network = prefix();
        tracker.record_operation(&network, "a", op(OperationKind::Put, 1, 100));
        tracker.remove_node(&network, "a");
        let snap = tracker.fork_snapshot(&network, &ForkKey::Pending).unwrap();
        assert_eq!(snap.buffer.len(), 1);
    }
}
