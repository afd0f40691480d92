//! Ingest Coordinator (§4.8): owns the event loop driving one network's
//! worth of connections. Dispatches inbound messages via the Protocol
//! Adapter, routes them to the Fork Tracker / Checkpoint Validator /
//! Recovery Subsystem, and commits confirmed forks through the Data
//! Transformer and the network's Graph Client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use honeygraph::backoff::ExponentialBackoff;
use honeygraph::events::{EventSender, IngestEvent};
use honeygraph::metrics::IngestMetrics;
use honeygraph::types::{BlockNumber, Checkpoint, ForkHash, ForkKey, NetworkPrefix, Operation, OperationKind};
use honeygraph_store::{GraphClient, NetworkRegistry};
use honeygraph_transform::Transformer;
use parking_lot::Mutex;
use slog::{error, info, o, warn, Logger};
use tokio::sync::mpsc;

use crate::checkpoint::validate_boundary;
use crate::fork::{CloseOutcome, ForkTracker};
use crate::protocol::{BatchOperation, InboundMessage, OutboundMessage, RequestedRange};
use crate::recovery::{ForkCandidate, RecoverySubsystem};

/// One committed write, queued onto a network's FIFO worker so that
/// writes within a network stay globally ordered (§5).
struct WriteJob {
    network: NetworkPrefix,
    mutations: Vec<honeygraph_store::Mutation>,
    checkpoint: Checkpoint,
}

pub struct IngestCoordinator {
    registry: Arc<NetworkRegistry>,
    fork_tracker: Arc<ForkTracker>,
    recovery: Arc<RecoverySubsystem>,
    metrics: Arc<IngestMetrics>,
    events: EventSender,
    logger: Logger,
    write_deadline: Duration,
    write_max_retries: usize,
    backoff_base: Duration,
    backoff_max: Duration,
    fork_sweep_lag_blocks: u64,
    write_queues: Mutex<HashMap<NetworkPrefix, mpsc::UnboundedSender<WriteJob>>>,
}

impl IngestCoordinator {
    pub fn new(
        registry: Arc<NetworkRegistry>,
        fork_tracker: Arc<ForkTracker>,
        recovery: Arc<RecoverySubsystem>,
        metrics: Arc<IngestMetrics>,
        events: EventSender,
        write_deadline: Duration,
        write_max_retries: usize,
        backoff_base: Duration,
        backoff_max: Duration,
        fork_sweep_lag_blocks: u64,
        logger: Logger,
    ) -> Self {
        IngestCoordinator {
            registry,
            fork_tracker,
            recovery,
            metrics,
            events,
            logger: logger.new(o!("component" => "ingest_coordinator")),
            write_deadline,
            write_max_retries,
            backoff_base,
            backoff_max,
            fork_sweep_lag_blocks,
            write_queues: Mutex::new(HashMap::new()),
        }
    }

    /// Ensures a write worker is running for `network` and returns its
    /// queue handle, spawning one on first use.
    fn write_queue(&self, network: &NetworkPrefix) -> mpsc::UnboundedSender<WriteJob> {
        let mut queues = self.write_queues.lock();
        if let Some(tx) = queues.get(network) {
            return tx.clone();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = WriteWorker {
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            events: self.events.clone(),
            write_deadline: self.write_deadline,
            write_max_retries: self.write_max_retries,
            backoff_base: self.backoff_base,
            backoff_max: self.backoff_max,
            logger: self.logger.new(o!("component" => "write_worker", "network" => network.to_string())),
        };
        tokio::spawn(worker.run(rx));

        queues.insert(network.clone(), tx.clone());
        tx
    }

    pub fn connect(&self, network: &NetworkPrefix, node_id: &str) -> OutboundMessage {
        info!(self.logger, "node connected"; "network" => network.to_string(), "node_id" => node_id);
        OutboundMessage::Connected {
            node_id: node_id.to_owned(),
            server: "honeygraph".to_owned(),
            timestamp: now_unix(),
        }
    }

    pub fn disconnect(&self, network: &NetworkPrefix, node_id: &str) {
        self.fork_tracker.remove_node(network, node_id);
        info!(self.logger, "node disconnected"; "network" => network.to_string(), "node_id" => node_id);
    }

    /// Committed checkpoint hash by block number, for a given network.
    pub fn checkpoint_map(&self, network: &NetworkPrefix) -> HashMap<BlockNumber, ForkHash> {
        self.fork_tracker.checkpoint_map(network)
    }

    /// Dispatches one inbound message, returning zero or more outbound
    /// replies. Per-connection ordering is preserved by the caller driving
    /// this from a single task per connection (§5).
    pub async fn handle_message(
        &self,
        network: &NetworkPrefix,
        node_id: &str,
        msg: InboundMessage,
    ) -> Vec<OutboundMessage> {
        match msg {
            InboundMessage::Identify { .. } | InboundMessage::SyncStatus { .. } => Vec::new(),

            InboundMessage::Operation {
                index,
                block_num,
                kind,
                path,
                data,
                fork_hash,
            } => {
                let fork_key = fork_hash.map(ForkHash::from).map(ForkKey::Hash).unwrap_or(ForkKey::Pending);
                let fork_hash_for_event = fork_key.hash().cloned().unwrap_or_else(|| ForkHash::from("pending"));
                let op = Operation {
                    kind,
                    path,
                    data,
                    index,
                    block_num,
                    timestamp: now_unix(),
                    fork_hash: fork_key,
                };
                self.fork_tracker.record_operation(network, node_id, op);
                let _ = self.events.send(IngestEvent::Operation {
                    network: network.clone(),
                    fork_hash: fork_hash_for_event,
                    index,
                });
                vec![OutboundMessage::Ack { index, success: true }]
            }

            InboundMessage::WriteMarker {
                index,
                block_num,
                fork_hash,
                ..
            } => {
                let op = Operation {
                    kind: OperationKind::WriteMarker,
                    path: Vec::new(),
                    data: serde_json::Value::Null,
                    index,
                    block_num,
                    timestamp: now_unix(),
                    fork_hash: fork_hash.map(ForkHash::from).map(ForkKey::Hash).unwrap_or(ForkKey::Pending),
                };
                self.fork_tracker.record_operation(network, node_id, op);
                vec![OutboundMessage::Ack { index, success: true }]
            }

            InboundMessage::SendCheckpoint {
                block_num,
                hash,
                prev_hash,
                timestamp,
            } => {
                self.handle_checkpoint(network, node_id, Checkpoint {
                    block_num,
                    hash: ForkHash::from(hash),
                    prev_hash: ForkHash::from(prev_hash),
                    timestamp,
                })
                .await
            }

            InboundMessage::Batch { operations, requested_range } => {
                self.handle_batch(network, node_id, operations, requested_range).await
            }
        }
    }

    async fn handle_checkpoint(
        &self,
        network: &NetworkPrefix,
        node_id: &str,
        checkpoint: Checkpoint,
    ) -> Vec<OutboundMessage> {
        let pending_key = ForkKey::Pending;
        let snapshot = match self.fork_tracker.fork_snapshot(network, &pending_key) {
            Some(s) => s,
            None => {
                return vec![OutboundMessage::Error {
                    error: "no pending fork to close".to_owned(),
                }]
            }
        };

        if let Err(e) = validate_boundary(&checkpoint, &snapshot) {
            let _ = self.events.send(IngestEvent::InvalidBoundary {
                network: network.clone(),
                node_id: node_id.to_owned(),
                block_num: checkpoint.block_num,
                reason: e.to_string(),
            });
            return vec![OutboundMessage::Error { error: e.to_string() }];
        }

        match self.fork_tracker.close_fork(network, node_id, checkpoint.clone()) {
            CloseOutcome::Accepted => {
                let _ = self.events.send(IngestEvent::Checkpoint {
                    network: network.clone(),
                    block_num: checkpoint.block_num,
                    hash: checkpoint.hash.clone(),
                });
                self.fork_tracker.confirm(network, &checkpoint.hash);
                self.queue_write(network, &checkpoint, snapshot.buffer);
                Vec::new()
            }
            CloseOutcome::ForkDetected { canonical_hash } => {
                let _ = self.events.send(IngestEvent::ForkDetected {
                    network: network.clone(),
                    block_num: checkpoint.block_num,
                    canonical_hash: canonical_hash.clone(),
                    fork_hash: checkpoint.hash.clone(),
                    node_id: node_id.to_owned(),
                });
                self.metrics
                    .forks_detected
                    .with_label_values(&[network.as_str()])
                    .inc();

                let candidates = vec![
                    ForkCandidate { hash: canonical_hash.clone(), witness_count: 1 },
                    ForkCandidate { hash: checkpoint.hash.clone(), witness_count: 1 },
                ];
                let winner = self.recovery.select_canonical(&candidates);
                let loser = if winner == checkpoint.hash { canonical_hash.clone() } else { checkpoint.hash.clone() };

                self.fork_tracker.confirm(network, &winner);
                self.fork_tracker.orphan(network, &loser);

                // The loser's buffer (discarded by never being queued for write) may
                // have already diverged from the winner's chain below this height;
                // restore to the last ancestor both sides agreed on and replay the
                // winner's payload forward so the store never reflects the loser.
                match self
                    .recovery
                    .rollback_and_replay(network, checkpoint.prev_hash.as_str(), &[winner.clone()])
                    .await
                {
                    Ok(replayed) => {
                        let restored_to = self
                            .fork_tracker
                            .checkpoint_map(network)
                            .into_iter()
                            .find(|(_, hash)| *hash == checkpoint.prev_hash)
                            .map(|(block_num, _)| block_num)
                            .unwrap_or(0);
                        let _ = self.events.send(IngestEvent::RecoveryComplete {
                            network: network.clone(),
                            restored_to,
                            replayed_through: checkpoint.block_num,
                        });
                        self.queue_write(network, &checkpoint, replayed);
                    }
                    Err(e) => {
                        warn!(self.logger, "reorg recovery failed, leaving store as-is";
                            "network" => network.to_string(), "error" => %e);
                    }
                }
                Vec::new()
            }
        }
    }

    async fn handle_batch(
        &self,
        network: &NetworkPrefix,
        node_id: &str,
        operations: Vec<BatchOperation>,
        requested_range: Option<RequestedRange>,
    ) -> Vec<OutboundMessage> {
        if operations.is_empty() {
            let Some(range) = requested_range else {
                return Vec::new();
            };

            self.metrics.recovery_attempts.inc();
            let pending = self.fork_tracker.fork_snapshot(network, &ForkKey::Pending);
            let hash = pending
                .and_then(|s| s.checkpoint.map(|c| c.hash))
                .unwrap_or_else(|| ForkHash::from(node_id));

            return match self.recovery.fill_gap(&hash, range.from, range.to).await {
                Ok(ops) => {
                    for op in ops {
                        self.fork_tracker.record_operation(network, node_id, op);
                    }
                    let _ = self.events.send(IngestEvent::BatchComplete {
                        network: network.clone(),
                        fork_hash: hash,
                        from: range.from,
                        to: range.to,
                    });
                    Vec::new()
                }
                Err(e) => {
                    warn!(self.logger, "gap-fill recovery failed"; "error" => %e);
                    vec![OutboundMessage::RequestMissing { from: range.from, to: range.to }]
                }
            };
        }

        for batch_op in operations {
            let op = Operation {
                kind: batch_op.kind,
                path: batch_op.path,
                data: batch_op.data,
                index: batch_op.index,
                block_num: batch_op.block_num,
                timestamp: now_unix(),
                fork_hash: ForkKey::Pending,
            };
            self.fork_tracker.record_operation(network, node_id, op);
        }
        Vec::new()
    }

    fn queue_write(&self, network: &NetworkPrefix, checkpoint: &Checkpoint, buffer: Vec<Operation>) {
        let transformer = Transformer::new(network.clone());
        let (mutations, _) = transformer.transform_batch(&buffer, &self.metrics, &self.logger);

        let queue = self.write_queue(network);
        let job = WriteJob {
            network: network.clone(),
            mutations,
            checkpoint: checkpoint.clone(),
        };
        if queue.send(job).is_err() {
            error!(self.logger, "write worker gone, dropping job"; "network" => network.to_string());
        }
    }

    /// Periodic cleanup (§4.8): run every `cleanup_interval` to evict
    /// stale forks across every registered network.
    pub fn sweep_all(&self, retention: Duration) {
        for network in self.registry.all() {
            let evicted = self.fork_tracker.sweep(&network, retention, self.fork_sweep_lag_blocks);
            if !evicted.is_empty() {
                info!(self.logger, "swept stale forks"; "network" => network.to_string(), "count" => evicted.len());
            }
        }
    }

    pub async fn run_cleanup_loop(self: Arc<Self>, interval: Duration, retention: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.sweep_all(retention);
        }
    }
}

struct WriteWorker {
    registry: Arc<NetworkRegistry>,
    metrics: Arc<IngestMetrics>,
    events: EventSender,
    write_deadline: Duration,
    write_max_retries: usize,
    backoff_base: Duration,
    backoff_max: Duration,
    logger: Logger,
}

impl WriteWorker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<WriteJob>) {
        while let Some(job) = rx.recv().await {
            self.apply(job).await;
        }
    }

    async fn apply(&self, job: WriteJob) {
        let Some(client) = self.registry.get(job.network.as_str()) else {
            error!(self.logger, "no graph client for network"; "network" => job.network.to_string());
            return;
        };

        if job.mutations.is_empty() {
            return;
        }

        let mut backoff = ExponentialBackoff::new(self.backoff_base, self.backoff_max);
        for attempt in 0..=self.write_max_retries {
            let result = tokio::time::timeout(self.write_deadline, client.write(job.mutations.clone())).await;

            match result {
                Ok(Ok(())) => {
                    self.metrics.operations_committed.inc_by(job.mutations.len() as u64);
                    let _ = self.events.send(IngestEvent::Checkpoint {
                        network: job.network.clone(),
                        block_num: job.checkpoint.block_num,
                        hash: job.checkpoint.hash.clone(),
                    });
                    return;
                }
                Ok(Err(e)) if attempt < self.write_max_retries => {
                    warn!(self.logger, "write failed, retrying"; "attempt" => attempt, "error" => %e);
                    self.metrics.write_retries.inc();
                    backoff.sleep_async().await;
                }
                Ok(Err(e)) => {
                    error!(self.logger, "write failed, exhausted retries"; "error" => %e);
                    let _ = self.events.send(IngestEvent::WriteFailed {
                        network: job.network.clone(),
                        reason: e.to_string(),
                    });
                    return;
                }
                Err(_) if attempt < self.write_max_retries => {
                    warn!(self.logger, "write timed out, retrying"; "attempt" => attempt);
                    self.metrics.write_retries.inc();
                    backoff.sleep_async().await;
                }
                Err(_) => {
                    error!(self.logger, "write timed out, exhausted retries");
                    let _ = self.events.send(IngestEvent::WriteFailed {
                        network: job.network.clone(),
                        reason: "write deadline exceeded".to_owned(),
                    });
                    return;
                }
            }
        }
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
