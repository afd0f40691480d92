//! Command-line options, the way the teacher's `graph-node` binary parses
//! `--config` / `--node-id` / `--network-subgraphs` through `structopt`.

use std::net::SocketAddr;
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "honeygraph-node", about = "Consensus-stream ingest and graph materialization")]
pub struct Opt {
    /// Address the websocket ingest server binds to.
    #[structopt(long, default_value = "0.0.0.0:8545")]
    pub listen_addr: SocketAddr,

    /// Root data directory. Overrides `HG_DATA_DIR` when set.
    #[structopt(long, parse(from_os_str))]
    pub data_dir: Option<PathBuf>,

    /// TOML file describing the networks to register at startup.
    #[structopt(long, parse(from_os_str))]
    pub networks_file: Option<PathBuf>,

    /// Endpoint of the graph store's gRPC-style transport.
    #[structopt(long, default_value = "http://127.0.0.1:9090")]
    pub store_endpoint: String,

    /// Emit newline-delimited JSON logs instead of the terminal format.
    #[structopt(long)]
    pub json_logs: bool,
}

/// One entry of the networks file: `[[network]]` tables deserialize
/// straight into a `honeygraph_store::registry::NetworkConfig` plus the
/// prefix it gets registered under.
#[derive(Debug, serde::Deserialize)]
pub struct NetworksFile {
    #[serde(default)]
    pub network: Vec<NetworkEntry>,
}

#[derive(Debug, serde::Deserialize)]
pub struct NetworkEntry {
    pub prefix: String,
    #[serde(flatten)]
    pub config: honeygraph_store::NetworkConfig,
}
