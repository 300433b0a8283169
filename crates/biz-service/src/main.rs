//! Biz node
//!
//! # Servers
//!
//! - gRPC `biz.Biz` signaling service (default: 0.0.0.0:5551)
//! - HTTP room introspection, health and metrics (default: 0.0.0.0:3095)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Build the node state from the configured neighbor set
//! 4. Start the HTTP server
//! 5. Start the gRPC server, then mark ready
//! 6. Start the stat task
//! 7. Wait for shutdown signal

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use biz_service::bus::{NodeDirectory, StaticNodeDirectory};
use biz_service::config::Config;
use biz_service::grpc::BizSignalService;
use biz_service::node::BizNode;
use biz_service::observability::{
    health_router, init_metrics_recorder, rooms_router, HealthState,
};
use biz_service::tasks::run_stat_task;
use proto_gen::biz::biz_server::BizServer;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time given to in-flight sessions to release their rooms after cancel.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biz_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting biz node");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        node_id = %config.node_id,
        grpc_bind_address = %config.grpc_bind_address,
        http_bind_address = %config.http_bind_address,
        neighbors = config.neighbors.len(),
        islb_rpc_timeout_seconds = config.islb_rpc_timeout_seconds,
        stat_interval_seconds = config.stat_interval_seconds,
        peer_mailbox_capacity = config.peer_mailbox_capacity,
        "Configuration loaded successfully"
    );

    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());

    let directory: Arc<dyn NodeDirectory> = Arc::new(StaticNodeDirectory::new(
        config.neighbors.clone(),
        config.islb_rpc_timeout(),
    ));
    let node = Arc::new(BizNode::new(
        config.node_id.clone(),
        directory,
        config.peer_mailbox_capacity,
    ));

    let shutdown_token = CancellationToken::new();

    // HTTP: rooms, health, metrics
    let http_addr: SocketAddr = config.http_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.http_bind_address, "Invalid HTTP bind address");
        format!("Invalid HTTP bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );

    let app = rooms_router(Arc::clone(node.registry()))
        .merge(health_router(Arc::clone(&health_state)))
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http());

    // Bind BEFORE spawning to fail fast on bind errors
    let http_listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %http_addr, "Failed to bind HTTP server");
            format!("Failed to bind HTTP server to {http_addr}: {e}")
        })?;

    let http_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %http_addr, "HTTP server starting");
        let server = axum::serve(http_listener, app).with_graceful_shutdown(async move {
            http_shutdown_token.cancelled().await;
            info!("HTTP server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });

    // gRPC: Biz signaling
    let grpc_addr: SocketAddr = config.grpc_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.grpc_bind_address, "Invalid gRPC bind address");
        format!("Invalid gRPC bind address: {e}")
    })?;

    let grpc_listener = tokio::net::TcpListener::bind(grpc_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %grpc_addr, "Failed to bind gRPC server");
            format!("Failed to bind gRPC server to {grpc_addr}: {e}")
        })?;

    let grpc_shutdown_token = shutdown_token.child_token();
    let grpc_server = tonic::transport::Server::builder()
        .add_service(BizServer::new(BizSignalService::new(Arc::clone(&node))))
        .serve_with_incoming_shutdown(TcpListenerStream::new(grpc_listener), async move {
            grpc_shutdown_token.cancelled().await;
            info!("gRPC server shutting down");
        });

    tokio::spawn(async move {
        info!(addr = %grpc_addr, "gRPC server starting");
        if let Err(e) = grpc_server.await {
            error!(error = %e, "gRPC server failed");
        }
    });

    health_state.set_ready();
    info!(node_id = %node.node_id(), "Biz node ready");

    let stat_token = shutdown_token.child_token();
    let stat_registry = Arc::clone(node.registry());
    let stat_interval = config.stat_interval();
    tokio::spawn(async move {
        run_stat_task(stat_registry, stat_interval, stat_token).await;
    });

    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Stop advertising readiness before the listeners close
    health_state.set_not_ready();

    shutdown_token.cancel();

    tokio::time::sleep(SHUTDOWN_GRACE).await;

    info!("Biz node shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
