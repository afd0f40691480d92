//! A thin `prometheus` wrapper, scoped to the handful of counters the
//! ingest pipeline needs. Not exposed over HTTP here; the scrape endpoint
//! is part of the excluded read-side HTTP surface (§1).

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

pub struct IngestMetrics {
    pub operations_committed: IntCounter,
    pub forks_detected: IntCounterVec,
    pub recovery_attempts: IntCounter,
    pub write_retries: IntCounter,
    pub unknown_path_dropped: IntCounterVec,
}

impl IngestMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let operations_committed = IntCounter::new(
            "honeygraph_operations_committed_total",
            "Operations folded into a committed graph-store transaction",
        )?;
        let forks_detected = IntCounterVec::new(
            Opts::new(
                "honeygraph_forks_detected_total",
                "Competing checkpoint hashes observed at the same height",
            ),
            &["network"],
        )?;
        let recovery_attempts = IntCounter::new(
            "honeygraph_recovery_attempts_total",
            "Content-store fetches issued by the Recovery Subsystem",
        )?;
        let write_retries = IntCounter::new(
            "honeygraph_write_retries_total",
            "Retryable graph-store write failures that were retried",
        )?;
        let unknown_path_dropped = IntCounterVec::new(
            Opts::new(
                "honeygraph_unknown_path_dropped_total",
                "Operations dropped because their path's first element has no transform rule",
            ),
            &["network"],
        )?;

        registry.register(Box::new(operations_committed.clone()))?;
        registry.register(Box::new(forks_detected.clone()))?;
        registry.register(Box::new(recovery_attempts.clone()))?;
        registry.register(Box::new(write_retries.clone()))?;
        registry.register(Box::new(unknown_path_dropped.clone()))?;

        Ok(IngestMetrics {
            operations_committed,
            forks_detected,
            recovery_attempts,
            write_retries,
            unknown_path_dropped,
        })
    }
}
