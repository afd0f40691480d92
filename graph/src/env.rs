use std::fmt;
use std::time::Duration;

use envconfig::Envconfig;
use lazy_static::lazy_static;

lazy_static! {
    pub static ref ENV_VARS: EnvVars = EnvVars::init().unwrap();
}

/// Process-wide tunables, one field per environment variable, the way the
/// teacher's `graph::env::mappings::EnvVarsMapping` documents `GRAPH_*`
/// knobs. Doc comments double as the source of truth for defaults; nothing
/// here should be hardcoded a second time elsewhere.
#[derive(Clone, Envconfig)]
pub struct EnvVars {
    /// Maximum number of buffered operations per Fork before oldest-first
    /// eviction kicks in.
    ///
    /// Set by `HG_FORK_BUFFER_CAP`. Defaults to 10,000 (§3).
    #[envconfig(from = "HG_FORK_BUFFER_CAP", default = "10000")]
    pub fork_buffer_cap: usize,

    /// How long a Fork may sit without an update before the periodic
    /// cleanup orphans it.
    ///
    /// Set by `HG_FORK_RETENTION_SECS`. Defaults to 3600 (§4.8).
    #[envconfig(from = "HG_FORK_RETENTION_SECS", default = "3600")]
    pub fork_retention_secs: u64,

    /// Interval between periodic Fork Tracker cleanup passes.
    ///
    /// Set by `HG_CLEANUP_INTERVAL_SECS`. Defaults to 300 (§4.8).
    #[envconfig(from = "HG_CLEANUP_INTERVAL_SECS", default = "300")]
    pub cleanup_interval_secs: u64,

    /// How many blocks behind the newest accepted checkpoint a sibling
    /// Fork may lag before it is swept as stale.
    ///
    /// Set by `HG_FORK_SWEEP_LAG_BLOCKS`. Defaults to 100 (§4.8).
    #[envconfig(from = "HG_FORK_SWEEP_LAG_BLOCKS", default = "100")]
    pub fork_sweep_lag_blocks: u64,

    /// Idle time after which a connection is probed for liveness.
    ///
    /// Set by `HG_CONN_IDLE_SECS`. Defaults to 90 (§5).
    #[envconfig(from = "HG_CONN_IDLE_SECS", default = "90")]
    pub conn_idle_secs: u64,

    /// Time to wait for a liveness probe response before closing a
    /// connection.
    ///
    /// Set by `HG_CONN_PROBE_TIMEOUT_SECS`. Defaults to 30 (§5).
    #[envconfig(from = "HG_CONN_PROBE_TIMEOUT_SECS", default = "30")]
    pub conn_probe_timeout_secs: u64,

    /// Per-transaction deadline for a graph-store write.
    ///
    /// Set by `HG_WRITE_DEADLINE_SECS`. Defaults to 30 (§5).
    #[envconfig(from = "HG_WRITE_DEADLINE_SECS", default = "30")]
    pub write_deadline_secs: u64,

    /// Maximum number of retries for a `Retryable` write failure before it
    /// is surfaced as `WriteFailed`.
    ///
    /// Set by `HG_WRITE_MAX_RETRIES`. Defaults to 3 (§5, §7).
    #[envconfig(from = "HG_WRITE_MAX_RETRIES", default = "3")]
    pub write_max_retries: usize,

    /// Base delay for the exponential backoff used by both write retries
    /// and content-store fetch retries.
    ///
    /// Set by `HG_BACKOFF_BASE_MILLIS`. Defaults to 250.
    #[envconfig(from = "HG_BACKOFF_BASE_MILLIS", default = "250")]
    pub backoff_base_millis: u64,

    /// Ceiling for the exponential backoff delay.
    ///
    /// Set by `HG_BACKOFF_MAX_SECS`. Defaults to 30.
    #[envconfig(from = "HG_BACKOFF_MAX_SECS", default = "30")]
    pub backoff_max_secs: u64,

    /// Deadline for a single content-addressed store fetch.
    ///
    /// Set by `HG_CONTENT_STORE_TIMEOUT_SECS`. Defaults to 60 (§5).
    #[envconfig(from = "HG_CONTENT_STORE_TIMEOUT_SECS", default = "60")]
    pub content_store_timeout_secs: u64,

    /// Base URL of the content-addressed store, queried as
    /// `{base}/ipfs/<hash>`.
    ///
    /// Set by `HG_CONTENT_STORE_URL`. Defaults to `http://127.0.0.1:5001`.
    #[envconfig(from = "HG_CONTENT_STORE_URL", default = "http://127.0.0.1:5001")]
    pub content_store_url: String,

    /// Maximum gRPC message size, in bytes, accepted and sent by the Graph
    /// Client Adapter's transport in both directions.
    ///
    /// Set by `HG_GRPC_MAX_MESSAGE_BYTES`. Defaults to 50 MiB (§4.1).
    #[envconfig(from = "HG_GRPC_MAX_MESSAGE_BYTES", default = "52428800")]
    pub grpc_max_message_bytes: usize,

    /// Deadline for establishing the Graph Client Adapter's gRPC channel.
    ///
    /// Set by `HG_STORE_CONNECT_TIMEOUT_SECS`. Defaults to 10.
    #[envconfig(from = "HG_STORE_CONNECT_TIMEOUT_SECS", default = "10")]
    pub store_connect_timeout_secs: u64,

    /// Root data directory. Holds `network-registry.json`,
    /// `networks/<prefix>/`, and `checkpoints/<prefix>/<blockNum>.json`.
    ///
    /// Set by `HG_DATA_DIR`. Defaults to `./data`.
    #[envconfig(from = "HG_DATA_DIR", default = "./data")]
    pub data_dir: String,

    /// Size of the per-network bounded worker pool that applies write
    /// transactions.
    ///
    /// Set by `HG_WRITE_WORKERS`. Defaults to 4 (§5).
    #[envconfig(from = "HG_WRITE_WORKERS", default = "4")]
    pub write_workers: usize,
}

impl EnvVars {
    pub fn fork_retention(&self) -> Duration {
        Duration::from_secs(self.fork_retention_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn conn_idle(&self) -> Duration {
        Duration::from_secs(self.conn_idle_secs)
    }

    pub fn conn_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.conn_probe_timeout_secs)
    }

    pub fn write_deadline(&self) -> Duration {
        Duration::from_secs(self.write_deadline_secs)
    }

    pub fn content_store_timeout(&self) -> Duration {
        Duration::from_secs(self.content_store_timeout_secs)
    }

    pub fn store_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.store_connect_timeout_secs)
    }
}

// This does not print any values to avoid accidentally leaking a
// credential-bearing URL into a debug log line.
impl fmt::Debug for EnvVars {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "env vars")
    }
}
