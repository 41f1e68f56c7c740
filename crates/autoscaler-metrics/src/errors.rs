//! Metrics surface error types.
//!
//! Per-series update operations are deliberately infallible so that
//! instrumentation can never fail the control loop. Only two things can go
//! wrong: bringing the exposition sink up at startup and serving scrapes.
//! Both are fatal to the caller that hits them.

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;

/// Metrics surface error type.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The exposition sink could not be configured at startup.
    #[error("Failed to initialize metrics recorder: {0}")]
    Recorder(#[from] BuildError),

    /// Scrape endpoint I/O failure (bind, accept, serve).
    #[error("Metrics server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
