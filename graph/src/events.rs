//! Domain events the Ingest Coordinator emits, per §9's re-architecture
//! note: explicit bounded channels fanning out to subscribers, not a
//! global event bus.

use tokio::sync::broadcast;

use crate::types::{BlockNumber, ForkHash, NetworkPrefix};

#[derive(Clone, Debug)]
pub enum IngestEvent {
    /// A checkpoint was accepted and a new Fork opened.
    Checkpoint {
        network: NetworkPrefix,
        block_num: BlockNumber,
        hash: ForkHash,
    },
    /// Competing checkpoint hashes were observed at the same height.
    ForkDetected {
        network: NetworkPrefix,
        block_num: BlockNumber,
        canonical_hash: ForkHash,
        fork_hash: ForkHash,
        node_id: String,
    },
    /// A checkpoint failed Checkpoint Validator's structural rules.
    InvalidBoundary {
        network: NetworkPrefix,
        node_id: String,
        block_num: BlockNumber,
        reason: String,
    },
    /// An operation was appended to a Fork's buffer.
    Operation {
        network: NetworkPrefix,
        fork_hash: ForkHash,
        index: u64,
    },
    /// Rollback + replay finished after a fork resolved.
    RecoveryComplete {
        network: NetworkPrefix,
        restored_to: BlockNumber,
        replayed_through: BlockNumber,
    },
    /// A gap-fill batch fetch completed (corresponds to the wire-level
    /// `ipfs:batch:complete` notification in §8 scenario 4).
    BatchComplete {
        network: NetworkPrefix,
        fork_hash: ForkHash,
        from: BlockNumber,
        to: BlockNumber,
    },
    /// A network's writer is paused after exhausting write retries.
    WriteFailed {
        network: NetworkPrefix,
        reason: String,
    },
}

/// Default channel depth for the event bus. Slow subscribers lag rather
/// than block the coordinator; `broadcast` drops the oldest entry for a
/// lagging receiver instead of applying backpressure to the producer.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub type EventSender = broadcast::Sender<IngestEvent>;
pub type EventReceiver = broadcast::Receiver<IngestEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
