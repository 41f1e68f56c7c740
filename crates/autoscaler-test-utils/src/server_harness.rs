//! Ephemeral scrape-server harness for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use autoscaler_metrics::{serve, MetricsRegistry};
use tokio_util::sync::CancellationToken;

/// A metrics server bound to an ephemeral localhost port.
///
/// The listener is bound before the serve task is spawned, so requests
/// issued immediately after `spawn` returns are queued rather than refused.
/// Dropping the harness cancels the server.
pub struct TestMetricsServer {
    addr: SocketAddr,
    registry: Arc<MetricsRegistry>,
    shutdown: CancellationToken,
}

impl TestMetricsServer {
    /// Spawn a server around a fresh, isolated registry.
    pub async fn spawn() -> Result<Self> {
        let registry = Arc::new(MetricsRegistry::new()?);
        Self::spawn_with_registry(registry).await
    }

    /// Spawn a server around an existing registry.
    pub async fn spawn_with_registry(registry: Arc<MetricsRegistry>) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();

        let serve_registry = Arc::clone(&registry);
        let serve_token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = serve(listener, serve_registry, serve_token).await {
                eprintln!("test metrics server failed: {e}");
            }
        });

        Ok(Self {
            addr,
            registry,
            shutdown,
        })
    }

    /// Base URL of the server, e.g. `http://127.0.0.1:49152`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The registry backing this server.
    pub fn registry(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.registry)
    }

    /// Trigger graceful shutdown of the server task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for TestMetricsServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
