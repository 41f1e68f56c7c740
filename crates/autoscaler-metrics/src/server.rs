//! Scrape endpoint for the metrics registry.
//!
//! Publishes the registry in Prometheus text exposition format:
//! - `GET /metrics` - current series values for collector scrapes
//! - `GET /health` - liveness probe (is the process running?)
//!
//! The surrounding process owns the network binding: it binds the listener
//! (typically at the address from [`MetricsConfig`]) and hands it to
//! [`serve`] together with a cancellation token for graceful shutdown.
//!
//! # Security
//!
//! The endpoint is unauthenticated to allow collector scrapes. No PII or
//! secrets are exposed; only operational series with bounded-cardinality
//! labels.
//!
//! [`MetricsConfig`]: crate::config::MetricsConfig

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::MetricsError;
use crate::registry::MetricsRegistry;

/// Create the scrape router for a registry.
///
/// Routes: `GET /metrics` (exposition text) and `GET /health` (liveness).
/// Unknown routes return 404.
#[must_use]
pub fn metrics_router(registry: &MetricsRegistry) -> Router {
    Router::new()
        .route("/metrics", get(scrape_handler))
        .route("/health", get(liveness_handler))
        .with_state(registry.handle())
}

/// Serve the scrape router on an already-bound listener until `shutdown`
/// is cancelled.
///
/// Scrapes run concurrently with registry updates; each series reads
/// last-write-wins, with no cross-series consistency within one scrape.
///
/// # Errors
///
/// Returns [`MetricsError::Io`] if the listener address cannot be read or
/// the server loop fails. Callers treat this as fatal.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<MetricsRegistry>,
    shutdown: CancellationToken,
) -> Result<(), MetricsError> {
    let addr = listener.local_addr()?;
    let app = metrics_router(&registry);

    info!(addr = %addr, "Metrics server starting");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Metrics server shutting down");
        })
        .await?;

    Ok(())
}

/// Handler for GET /metrics.
///
/// Renders all series in Prometheus text format, e.g.:
/// ```text
/// # HELP cluster_autoscaler_node_group_size Current size of the node group.
/// # TYPE cluster_autoscaler_node_group_size gauge
/// cluster_autoscaler_node_group_size{node_group="pool-a"} 6
/// ```
#[tracing::instrument(skip_all, name = "autoscaler.metrics.scrape")]
async fn scrape_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

/// Liveness probe handler. Returns 200 OK while the process is running.
async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}
