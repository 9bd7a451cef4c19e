//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start background tasks (config watcher, signal handler)
//! - Bind listeners and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::path::PathBuf;
use tokio::net::TcpListener;

use crate::admin::setup_admin_router;
use crate::config::watcher::{apply_updates, ConfigWatcher};
use crate::config::GatewayConfig;
use crate::gateway::Gateway;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

/// Run the gateway until a shutdown signal arrives.
///
/// Logging must already be initialized. `config_path`, when set, is watched
/// for endpoint changes.
pub async fn run(
    config: GatewayConfig,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = Gateway::new(config.clone())?;
    let shutdown = Shutdown::new();

    // Kept alive until the end of `run`.
    let _watcher = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            match watcher.run() {
                Ok(handle) => {
                    tokio::spawn(apply_updates(gateway.clone(), updates, shutdown.subscribe()));
                    Some(handle)
                }
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Config watcher unavailable, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(gateway.clone(), &config.admin.api_key);
        let mut stop = shutdown.subscribe();
        Some(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin server failed");
            }
        }))
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "Listening for connections"
    );

    signals::spawn_signal_handler(shutdown.clone());
    HttpServer::new(gateway).run(listener, shutdown.subscribe()).await?;

    if let Some(task) = admin_task {
        let _ = task.await;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
