//! `honeygraph-node`: the ingest binary. Bootstraps the Namespace
//! Registry, Fork Tracker, Recovery Subsystem and Ingest Coordinator, then
//! serves the websocket protocol described in §5, mirroring the shape of
//! the teacher's own `graph-node` startup sequence without the parts this
//! system doesn't need (no GraphQL server, no subgraph runtime, no
//! maintenance CLI).

mod config;
mod grpc_factory;
mod server;

use std::sync::Arc;

use honeygraph::content_store::HttpContentStore;
use honeygraph::env::ENV_VARS;
use honeygraph::events::event_channel;
use honeygraph::log::{json_logger, terminal_logger, LoggerFactory};
use honeygraph::metrics::IngestMetrics;
use honeygraph_core::{ForkTracker, IngestCoordinator, MajorityThenLowestHash, RecoverySubsystem};
use honeygraph_store::{FsSnapshotFacility, NetworkRegistry};
use prometheus::Registry;
use slog::{error, info};
use structopt::StructOpt;

use crate::config::{NetworksFile, Opt};
use crate::grpc_factory::GrpcGraphClientFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    let root_logger = if opt.json_logs { json_logger() } else { terminal_logger() };
    let loggers = LoggerFactory::new(root_logger);
    let logger = loggers.component_logger("main");

    let data_dir = opt
        .data_dir
        .clone()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| ENV_VARS.data_dir.clone());

    let metrics_registry = Registry::new();
    let metrics = Arc::new(IngestMetrics::new(&metrics_registry)?);

    let (events, _receiver) = event_channel();

    let content_store = Arc::new(HttpContentStore::new(
        ENV_VARS.content_store_url.clone(),
        ENV_VARS.content_store_timeout(),
        std::time::Duration::from_millis(ENV_VARS.backoff_base_millis),
        std::time::Duration::from_secs(ENV_VARS.backoff_max_secs),
        loggers.component_logger("content_store"),
    ));
    let snapshot_facility = Arc::new(FsSnapshotFacility::new(&data_dir));
    let recovery = Arc::new(RecoverySubsystem::new(
        content_store,
        snapshot_facility,
        Arc::new(MajorityThenLowestHash),
        loggers.component_logger("recovery"),
    ));

    let graph_client_factory = Arc::new(GrpcGraphClientFactory::new(
        opt.store_endpoint.clone(),
        ENV_VARS.grpc_max_message_bytes,
        ENV_VARS.store_connect_timeout(),
        loggers.component_logger("graph_client"),
    ));
    let registry = Arc::new(
        NetworkRegistry::load(&data_dir, graph_client_factory, loggers.component_logger("network_registry")).await?,
    );

    if let Some(path) = &opt.networks_file {
        register_networks_from_file(&registry, path, &logger).await?;
    }

    let fork_tracker = Arc::new(ForkTracker::new(ENV_VARS.fork_buffer_cap));

    let coordinator = Arc::new(IngestCoordinator::new(
        registry,
        fork_tracker,
        recovery,
        metrics,
        events,
        ENV_VARS.write_deadline(),
        ENV_VARS.write_max_retries,
        std::time::Duration::from_millis(ENV_VARS.backoff_base_millis),
        std::time::Duration::from_secs(ENV_VARS.backoff_max_secs),
        ENV_VARS.fork_sweep_lag_blocks,
        loggers.component_logger("ingest_coordinator"),
    ));

    tokio::spawn(
        coordinator
            .clone()
            .run_cleanup_loop(ENV_VARS.cleanup_interval(), ENV_VARS.fork_retention()),
    );

    info!(logger, "honeygraph-node starting"; "listen_addr" => %opt.listen_addr);
    if let Err(e) = server::run(opt.listen_addr, coordinator, loggers.component_logger("server")).await {
        error!(logger, "ingest server exited"; "error" => %e);
        return Err(e);
    }

    Ok(())
}

async fn register_networks_from_file(
    registry: &NetworkRegistry,
    path: &std::path::Path,
    logger: &slog::Logger,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(path).await?;
    let parsed: NetworksFile = toml::from_str(&text)?;

    for entry in parsed.network {
        match registry.register(&entry.prefix, entry.config).await {
            Ok(()) => info!(logger, "registered network from file"; "prefix" => &entry.prefix),
            Err(e) => error!(logger, "failed to register network from file";
                "prefix" => &entry.prefix, "error" => %e),
        }
    }
    Ok(())
}
