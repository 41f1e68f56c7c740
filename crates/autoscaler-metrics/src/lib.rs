//! Cluster Autoscaler Metrics
//!
//! Instrumentation surface for a cluster-scaling control loop: records
//! timing of control-loop phases and the size/bounds/failure counts of
//! managed node groups, and exposes them to a pull-based collector in
//! Prometheus text format. The scaling decision logic itself lives with the
//! callers; this crate must never become a source of control-loop failure,
//! so every update operation is infallible and safe for concurrent use.
//!
//! # Series
//!
//! All series carry the `cluster_autoscaler_` namespace prefix:
//!
//! | Series | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `last_time_seconds` | Gauge | `main` | Unix time of most recent phase start |
//! | `last_duration_microseconds` | Gauge | `main` | Duration of most recent completed phase |
//! | `duration_microseconds` | Summary | `main` | Running summary of all phase durations |
//! | `node_group_min_spec` | Gauge | `node_group` | Configured minimum size |
//! | `node_group_max_spec` | Gauge | `node_group` | Configured maximum size |
//! | `node_group_size` | Gauge | `node_group` | Observed size, ±1 incrementable |
//! | `node_group_scaling_failures` | Counter | `node_group`, `type` | Failed scaling attempts |
//!
//! # Usage
//!
//! Construct one [`MetricsRegistry`] at startup, treat construction failure
//! as fatal, and share it by `Arc` with the control loop and the node-group
//! managers:
//!
//! ```rust,ignore
//! let registry = Arc::new(MetricsRegistry::new()?);
//!
//! // control loop phase timing
//! registry.record_phase_start("main");
//! let start = Instant::now();
//! // ... run the phase ...
//! registry.record_phase_duration("main", start);
//!
//! // node group reconciliation
//! registry.set_node_group_min("pool-a", 3);
//! registry.set_node_group_max("pool-a", 10);
//! registry.set_node_group_size("pool-a", 5);
//! registry.node_added("pool-a");
//! registry.record_scale_failure("pool-a", "quota");
//!
//! // scrape endpoint, on a listener bound by the surrounding process
//! let listener = TcpListener::bind(config.bind_address).await?;
//! tokio::spawn(serve(listener, Arc::clone(&registry), shutdown.child_token()));
//! ```
//!
//! # Modules
//!
//! - [`registry`] - the series and their update operations
//! - [`server`] - `/metrics` + `/health` scrape endpoint
//! - [`config`] - exposition endpoint configuration from environment
//! - [`errors`] - fatal initialization/serve errors

pub mod config;
pub mod errors;
pub mod registry;
pub mod server;

// Re-exports for convenience
pub use config::MetricsConfig;
pub use errors::MetricsError;
pub use registry::MetricsRegistry;
pub use server::{metrics_router, serve};
