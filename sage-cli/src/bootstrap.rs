//! ABOUTME: Process bootstrap: Core construction, listener startup, and graceful shutdown

use std::net::SocketAddr;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sage_config::Config;
use sage_coordinator::Core;
use sage_providers::SimulatedModelAdapter;
use sage_storage::{HashingEmbedder, InMemoryVectorIndex, VectorIndex};
use sage_transport::{build_router, SageServer, SageService};
use tracing::{error, info, warn};

/// Construct the [`Core`] value from the loaded configuration.
///
/// The real embedding and generation models are out-of-scope black-box
/// collaborators (see the serving core's own scope notes); this wires the
/// in-process stand-ins behind the same [`VectorIndex`]/`ModelAdapter`
/// abstractions a production deployment would swap in.
///
/// # Errors
///
/// Returns an error if the vector store directory cannot be opened.
pub fn build_core(config: &Config) -> anyhow::Result<Arc<Core>> {
    let embedder = Arc::new(HashingEmbedder::default());
    let index: Arc<dyn VectorIndex> =
        Arc::new(InMemoryVectorIndex::open(embedder, config.paths.vector_store_dir.clone())
            .context("failed to open vector store")?);
    let model: Arc<dyn sage_providers::ModelAdapter> = Arc::new(SimulatedModelAdapter::new(4096));
    let cache_capacity = if config.cache.enable_caching { config.cache.max_cache_size } else { 1 };
    Ok(Arc::new(Core::new(index, model, 4096, cache_capacity)))
}

/// Start the HTTP listener and run until shutdown is requested.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn run_http(core: Arc<Core>, addr: SocketAddr, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await.context("failed to bind HTTP listener")?;
    info!(%addr, "HTTP listener bound");
    let router = build_router(core);
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await.context("HTTP server failed")
}

/// Start the gRPC listener, attempting exactly one bind-contention reclaim:
/// identify and terminate the holding process, wait, and retry once. If
/// the retry also fails, gRPC is disabled for this process lifetime and
/// HTTP continues to serve alone — this is best-effort operational
/// behavior, not a correctness requirement.
pub async fn run_grpc(
    core: Arc<Core>,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) {
    let service = SageServer::new(SageService::new(Arc::clone(&core)));

    let listener = match bind_with_reclaim(addr).await {
        Some(listener) => listener,
        None => {
            warn!(%addr, "gRPC disabled for this process lifetime after failed bind reclaim");
            return;
        }
    };

    info!(%addr, "gRPC listener bound");
    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let result = tonic::transport::Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(incoming, shutdown)
        .await;
    if let Err(err) = result {
        error!(error = %err, "gRPC server exited with an error");
    }
}

async fn bind_with_reclaim(addr: SocketAddr) -> Option<tokio::net::TcpListener> {
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => return Some(listener),
        Err(err) => warn!(%addr, error = %err, "gRPC bind failed, attempting one reclaim"),
    }

    if let Some(pid) = holder_pid(addr.port()) {
        warn!(pid, port = addr.port(), "terminating process holding gRPC port");
        let _ = Command::new("kill").arg("-9").arg(pid.to_string()).status();
    } else {
        warn!(port = addr.port(), "no holder process found for gRPC port");
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            error!(%addr, error = %err, "gRPC bind retry failed; giving up");
            None
        }
    }
}

fn holder_pid(port: u16) -> Option<u32> {
    let output = Command::new("lsof").arg("-ti").arg(format!("tcp:{port}")).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).lines().next()?.trim().parse().ok()
}

/// Resolves once either Ctrl-C or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
