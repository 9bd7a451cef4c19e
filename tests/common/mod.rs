//! Shared utilities for integration tests.

#![allow(dead_code)]

use agent_gateway::config::{GatewayConfig, ServiceConfig};
use agent_gateway::engine::ReasoningEngine;
use agent_gateway::{Gateway, HttpServer, Shutdown};
use axum::{extract::State, http::StatusCode, Json, Router};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

type Reply = Pin<Box<dyn Future<Output = (u16, Value)> + Send>>;
type Handler = Arc<dyn Fn(Value) -> Reply + Send + Sync>;

/// Start a JSON backend on an ephemeral port. Every POST body is handed to `f`.
pub async fn start_json_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Value)> + Send + 'static,
{
    let handler: Handler = Arc::new(move |body| -> Reply { Box::pin(f(body)) });
    let app = Router::new()
        .fallback(|State(handler): State<Handler>, Json(body): Json<Value>| async move {
            let (status, body) = handler(body).await;
            (StatusCode::from_u16(status).unwrap_or(StatusCode::OK), Json(body))
        })
        .with_state(handler);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Backend answering every request with the same body, counting calls.
pub async fn start_fixed_backend(status: u16, body: Value) -> (SocketAddr, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = start_json_backend(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        let body = body.clone();
        async move { (status, body) }
    })
    .await;
    (addr, calls)
}

/// Backend that accepts connections and closes them without answering.
pub async fn start_dropping_backend() -> (SocketAddr, Arc<AtomicU32>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicU32::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    drop(socket);
                }
                Err(_) => break,
            }
        }
    });
    (addr, accepted)
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn service(name: &str, addr: SocketAddr) -> ServiceConfig {
    ServiceConfig {
        name: name.to_string(),
        url: format!("http://{}/ws", addr),
    }
}

/// Defaults tuned for fast tests.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.retries.wait_min_ms = 10;
    config.retries.wait_max_ms = 20;
    config.client.timeout_secs = 2;
    config.client.connect_timeout_secs = 1;
    config.timeouts.request_secs = 10;
    config.observability.metrics_enabled = false;
    config
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub gateway: Gateway,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

async fn serve(gateway: Gateway) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(gateway.clone());
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    TestGateway { addr, gateway, shutdown }
}

/// Gateway with its remote engine at `config.engine.url`, served on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    serve(Gateway::new(config).unwrap()).await
}

/// Gateway around an in-process engine.
pub async fn start_gateway_with_engine(config: GatewayConfig, engine: Arc<dyn ReasoningEngine>) -> TestGateway {
    serve(Gateway::with_engine(config, engine).unwrap()).await
}
