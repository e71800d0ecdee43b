//! CCAPI Admin - Financing proposal review service
//!
//! Admins review financing proposals and move them between pending, approved
//! and rejected. Every decision is persisted, the submitting user gets a
//! notification, and dashboards waiting on `/api/refresh` are woken up.

mod config;
mod dashboard;
mod error;
mod models;
mod proposal;
mod routes;
mod state;
mod storage;

use crate::config::Settings;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting CCAPI Admin - Proposal Review Desk...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");
    info!(
        "   Transition policy: {:?}, message locale: {:?}",
        settings.workflow.policy, settings.workflow.locale
    );

    let state = Arc::new(AppState::new(&settings).await?);
    if settings.storage.backend == config::StorageBackend::Memory {
        warn!("⚠️  Proposals will not survive a restart");
    }

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   GET  /health                     - Health check");
    info!("   GET  /api/overview               - Counters and recent proposals");
    info!("   GET  /api/proposals              - List proposals (?specialist=)");
    info!("   GET  /api/proposals/{{id}}         - Proposal details");
    info!("   POST /api/proposals/{{id}}/status  - Approve, hold or reject");
    info!("   GET  /api/notifications          - Notifications for ?userId=");
    info!("   GET  /api/refresh                - Wait for the next change");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ccapi_admin=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
