//! Hot reload of downstream endpoints.
//!
//! # Responsibilities
//! - Watch the config file and re-load it on change
//! - Forward only validated configs
//! - Apply the new service table to the running gateway
//!
//! # Design Decisions
//! - A broken edit is logged and ignored; the running config stays in place
//! - Unchanged service tables are not re-applied (editors emit several events per save)

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::config::loader::load_config;
use crate::config::schema::{GatewayConfig, ServiceConfig};
use crate::gateway::Gateway;

/// Sends a freshly validated config on every relevant file event.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Keep the returned handle alive as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    match load_config(&path) {
                        Ok(config) => {
                            tracing::info!(path = ?path, "Config file changed, reloaded");
                            let _ = tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Config reload rejected, keeping current configuration");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Apply reloaded service tables to `gateway` until shutdown or the
/// watcher goes away.
pub async fn apply_updates(
    gateway: Gateway,
    mut updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut current: Vec<ServiceConfig> = gateway.config().services.clone();
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                if config.services == current {
                    tracing::debug!("Reloaded config has unchanged services, nothing to apply");
                    continue;
                }
                gateway.update_services(&config.services);
                current = config.services;
            }
            _ = shutdown.recv() => break,
        }
    }
    tracing::info!("Config updates stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReasoningEngine;
    use std::sync::Arc;

    struct NoEngine;

    impl ReasoningEngine for NoEngine {
        fn handle<'a>(
            &'a self,
            _message: &'a str,
            _session_id: &'a str,
            _context: &'a crate::agents::TenantContext,
            _toolbox: &'a crate::engine::Toolbox,
        ) -> futures_util::future::BoxFuture<'a, crate::client::types::GatewayResult<String>> {
            Box::pin(async { Ok(String::new()) })
        }
    }

    #[tokio::test]
    async fn test_updates_swap_service_table() {
        let gateway = Gateway::with_engine(GatewayConfig::default(), Arc::new(NoEngine)).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(apply_updates(gateway.clone(), rx, shutdown_rx));

        let mut config = GatewayConfig::default();
        config.services.push(ServiceConfig {
            name: "informacion".into(),
            url: "http://127.0.0.1:9100/ws".into(),
        });
        tx.send(config).unwrap();

        for _ in 0..50 {
            if gateway.client().directory().get("informacion").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(gateway.client().directory().names(), vec!["informacion".to_string()]);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }
}
