//! # Autoscaler Test Utilities
//!
//! Shared test utilities for the autoscaler metrics surface.
//!
//! This crate provides:
//! - Server test harness ([`TestMetricsServer`] for end-to-end scrape tests)
//! - Exposition-text assertion helpers ([`sample_value`], [`has_series`])
//! - Tracing initialization for tests ([`init_tracing`])
//!
//! ## Usage
//!
//! ```rust,ignore
//! use autoscaler_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestMetricsServer::spawn().await?;
//!     server.registry().node_added("pool-a");
//!
//!     let body = reqwest::get(format!("{}/metrics", server.url()))
//!         .await?
//!         .text()
//!         .await?;
//!
//!     assert_eq!(
//!         sample_value(&body, "cluster_autoscaler_node_group_size",
//!                      &[("node_group", "pool-a")]),
//!         Some(1.0)
//!     );
//!     Ok(())
//! }
//! ```

pub mod exposition;
pub mod server_harness;

// Re-export commonly used items
pub use exposition::{has_series, sample_value};
pub use server_harness::TestMetricsServer;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for a test binary.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// Honors `RUST_LOG`, defaulting to debug output for the crates under test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoscaler_metrics=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
