#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use anyhow::Context;
use clap::Parser;
use config::{CliArgs, NodeConfig};
use std::sync::Arc;
use telemetry::init_telemetry;
use tokio::{signal, task::JoinSet, time::timeout};
use xid::{Encoder, IdGenStatus, extract_node, extract_sequence, extract_time};
use xid_coord::{Allocation, MemoryCoordinator, NodeAllocator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = NodeConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let coord = Arc::new(MemoryCoordinator::new());
    let allocator = NodeAllocator::new(Arc::clone(&coord), config.key.clone())
        .with_namespace(config.namespace.clone())
        .with_lease_ttl(config.lease_ttl)
        .with_session_options(config.session)
        .with_registration(config.registration);

    let allocations = allocate_all(&allocator, &config).await?;

    let result = mint_all(&allocations, &config).await;

    if result.is_ok() && config.hold {
        tracing::info!(
            nodes = allocations.len(),
            "holding registrations, press Ctrl+C to release"
        );
        shutdown_signal().await;
    }

    for allocation in allocations {
        allocation.shutdown().await;
    }
    let remaining = coord.list_keys(&allocator.config().prefix()).len();
    tracing::info!(remaining, "registrations released");

    result
}

/// Allocates one node id per simulated process, concurrently.
async fn allocate_all(
    allocator: &NodeAllocator<MemoryCoordinator>,
    config: &NodeConfig,
) -> anyhow::Result<Vec<Allocation>> {
    let mut tasks = JoinSet::new();
    for process in 0..config.nodes {
        let allocator = allocator.clone();
        let deadline = config.allocate_timeout;
        tasks.spawn(async move {
            let allocation = timeout(deadline, allocator.allocate())
                .await
                .with_context(|| format!("process {process}: allocation timed out"))?
                .with_context(|| format!("process {process}: allocation failed"))?;
            anyhow::Ok(allocation)
        });
    }

    let mut allocations = Vec::with_capacity(config.nodes);
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("allocation task panicked").and_then(|r| r) {
            Ok(allocation) => allocations.push(allocation),
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "allocation failed");
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        for allocation in allocations {
            allocation.shutdown().await;
        }
        return Err(e);
    }

    allocations.sort_by_key(Allocation::node_id);
    Ok(allocations)
}

/// Mints `config.count` ids from every allocated node and logs them decoded.
/// The lowest node id also drives the process-wide encoder.
async fn mint_all(allocations: &[Allocation], config: &NodeConfig) -> anyhow::Result<()> {
    if let Some(first) = allocations.first() {
        xid::global::init(first.configure(Encoder::builder()).epoch(config.epoch))
            .context("failed to initialize the global encoder")?;
        tracing::info!(node_id = first.node_id(), id = xid::global::next(), "global encoder ready");
    }

    for allocation in allocations {
        let encoder = allocation
            .configure(Encoder::builder())
            .epoch(config.epoch)
            .build()
            .with_context(|| format!("node {}: invalid encoder settings", allocation.node_id()))?;
        let count = config.count;

        // Minting may sleep out an exhausted second; keep it off the runtime.
        let ids = tokio::task::spawn_blocking(move || {
            let mut ids = Vec::with_capacity(count);
            while ids.len() < count {
                match encoder.next_id() {
                    IdGenStatus::Ready { id } => ids.push((id, encoder.unix_secs(id))),
                    IdGenStatus::Pending { yield_for } => {
                        tracing::warn!(yield_for, "clock moved backwards, retrying");
                        std::thread::yield_now();
                    }
                }
            }
            ids
        })
        .await
        .context("minting task panicked")?;

        for (id, unix_secs) in ids {
            let raw = id.to_i64();
            tracing::info!(
                id = raw,
                unix_secs,
                timestamp = extract_time(raw),
                node_id = extract_node(raw),
                sequence = extract_sequence(raw),
                "minted"
            );
        }
    }
    Ok(())
}

fn log_startup_info(config: &NodeConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting xid-node with full config: {:#?}", config);
    } else {
        tracing::info!(
            namespace = %config.namespace,
            key = %config.key,
            nodes = config.nodes,
            "Starting xid-node"
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
