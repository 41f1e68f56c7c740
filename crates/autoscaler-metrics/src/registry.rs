//! Metric series for the cluster-scaling control loop.
//!
//! All series live under the `cluster_autoscaler_` namespace. Names and label
//! sets are a compatibility contract with existing dashboards and alerts and
//! must not change.
//!
//! # Cardinality
//!
//! Labels are bounded by what the control loop observes:
//! - `main`: one value per loop phase (a handful)
//! - `node_group`: one value per managed node group
//! - `type`: one value per scaling failure category
//!
//! A label combination creates its series on first use and the series lives
//! for the registry lifetime; cardinality grows monotonically with the set of
//! distinct phases, node groups and failure types ever observed.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use metrics::{Gauge, Histogram, Key, KeyName, Label, Level, Metadata, Recorder, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::errors::MetricsError;

const LAST_TIME_SECONDS: &str = "cluster_autoscaler_last_time_seconds";
const LAST_DURATION_MICROSECONDS: &str = "cluster_autoscaler_last_duration_microseconds";
const DURATION_MICROSECONDS: &str = "cluster_autoscaler_duration_microseconds";
const NODE_GROUP_MIN_SPEC: &str = "cluster_autoscaler_node_group_min_spec";
const NODE_GROUP_MAX_SPEC: &str = "cluster_autoscaler_node_group_max_spec";
const NODE_GROUP_SIZE: &str = "cluster_autoscaler_node_group_size";
const NODE_GROUP_SCALING_FAILURES: &str = "cluster_autoscaler_node_group_scaling_failures";

/// Label key identifying the control-loop phase.
const PHASE_LABEL: &str = "main";
/// Label key identifying the node group.
const NODE_GROUP_LABEL: &str = "node_group";
/// Label key identifying the scaling failure category.
const FAILURE_TYPE_LABEL: &str = "type";

/// Quantiles estimated for the `duration_microseconds` summary.
const DURATION_QUANTILES: &[f64] = &[0.5, 0.9, 0.99];

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// Registry of the control loop's metric series.
///
/// Owns a private Prometheus recorder, so each instance is fully isolated:
/// tests construct their own registry instead of sharing process-global
/// state. Production code constructs one at startup and shares it by `Arc`
/// with every call site; a collector scrapes it through [`metrics_router`]
/// or [`MetricsRegistry::render`].
///
/// Every update operation is infallible and safe for concurrent invocation
/// without caller-side locking. Per-label storage is an atomic cell created
/// race-safely on first use; updates to different label values never block
/// each other, and a concurrent scrape observes last-write-wins values per
/// series.
///
/// [`metrics_router`]: crate::server::metrics_router
pub struct MetricsRegistry {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Create a registry with all series described on its exposition sink.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Recorder`] if the exposition sink cannot be
    /// configured. Callers must treat this as a fatal startup error; series
    /// identity is fixed for the process lifetime.
    pub fn new() -> Result<Self, MetricsError> {
        let recorder = PrometheusBuilder::new()
            .set_quantiles(DURATION_QUANTILES)?
            .build_recorder();
        let handle = recorder.handle();

        let registry = Self { recorder, handle };
        registry.describe_series();
        Ok(registry)
    }

    /// Record that the control loop entered `phase`.
    ///
    /// Sets `last_time_seconds{main=phase}` to the current wall clock in
    /// whole seconds since the Unix epoch. Safe to call repeatedly; the last
    /// call wins.
    pub fn record_phase_start(&self, phase: &str) {
        // A clock before the epoch reads as zero rather than failing the caller.
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |since_epoch| since_epoch.as_secs());

        #[allow(clippy::cast_precision_loss)]
        self.phase_gauge(LAST_TIME_SECONDS, phase).set(now as f64);
    }

    /// Record that the control loop finished a `phase` started at `start`.
    ///
    /// Computes the elapsed whole microseconds once, sets
    /// `last_duration_microseconds{main=phase}` to that value and feeds the
    /// same value as one observation into `duration_microseconds{main=phase}`.
    /// Pairing with [`record_phase_start`] is not enforced; the duration is
    /// relative to whatever `start` the caller supplies.
    ///
    /// [`record_phase_start`]: MetricsRegistry::record_phase_start
    pub fn record_phase_duration(&self, phase: &str, start: Instant) {
        let elapsed = elapsed_micros(start);
        self.phase_gauge(LAST_DURATION_MICROSECONDS, phase)
            .set(elapsed);
        self.phase_histogram(DURATION_MICROSECONDS, phase)
            .record(elapsed);
    }

    /// Record the configured minimum size of `node_group`.
    ///
    /// No validation against the maximum bound; that is the caller's
    /// responsibility.
    pub fn set_node_group_min(&self, node_group: &str, min: i64) {
        #[allow(clippy::cast_precision_loss)]
        self.group_gauge(NODE_GROUP_MIN_SPEC, node_group).set(min as f64);
    }

    /// Record the configured maximum size of `node_group`.
    pub fn set_node_group_max(&self, node_group: &str, max: i64) {
        #[allow(clippy::cast_precision_loss)]
        self.group_gauge(NODE_GROUP_MAX_SPEC, node_group).set(max as f64);
    }

    /// Record the observed size of `node_group`.
    ///
    /// Absolute set; no ordering guarantee relative to concurrent
    /// [`node_added`]/[`node_removed`] deltas from other callers.
    ///
    /// [`node_added`]: MetricsRegistry::node_added
    /// [`node_removed`]: MetricsRegistry::node_removed
    pub fn set_node_group_size(&self, node_group: &str, size: i64) {
        #[allow(clippy::cast_precision_loss)]
        self.group_gauge(NODE_GROUP_SIZE, node_group).set(size as f64);
    }

    /// Increment the size of `node_group` by one.
    pub fn node_added(&self, node_group: &str) {
        self.group_gauge(NODE_GROUP_SIZE, node_group).increment(1.0);
    }

    /// Decrement the size of `node_group` by one.
    pub fn node_removed(&self, node_group: &str) {
        self.group_gauge(NODE_GROUP_SIZE, node_group).decrement(1.0);
    }

    /// Count a failed scaling attempt for `node_group`, by failure category.
    ///
    /// The counter never decrements and never resets. Categories count
    /// independently of each other.
    pub fn record_scale_failure(&self, node_group: &str, failure_type: &str) {
        let key = Key::from_parts(
            NODE_GROUP_SCALING_FAILURES,
            vec![
                Label::new(NODE_GROUP_LABEL, node_group.to_string()),
                Label::new(FAILURE_TYPE_LABEL, failure_type.to_string()),
            ],
        );
        self.recorder.register_counter(&key, &METADATA).increment(1);
    }

    /// Handle for serving the scrape endpoint.
    #[must_use]
    pub fn handle(&self) -> PrometheusHandle {
        self.handle.clone()
    }

    /// Render the current series values in Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Describe all series on the sink. Names are crate-private constants,
    /// described exactly once here, so identity collisions cannot arise at
    /// runtime.
    fn describe_series(&self) {
        self.recorder.describe_gauge(
            KeyName::from_const_str(LAST_TIME_SECONDS),
            Some(Unit::Seconds),
            "Last time the autoscaler ran a main loop fragment.".into(),
        );
        self.recorder.describe_gauge(
            KeyName::from_const_str(LAST_DURATION_MICROSECONDS),
            Some(Unit::Microseconds),
            "Time spent in the last main loop fragment in microseconds.".into(),
        );
        self.recorder.describe_histogram(
            KeyName::from_const_str(DURATION_MICROSECONDS),
            Some(Unit::Microseconds),
            "Time spent in main loop fragments in microseconds.".into(),
        );
        self.recorder.describe_gauge(
            KeyName::from_const_str(NODE_GROUP_MIN_SPEC),
            Some(Unit::Count),
            "Current minimum bound of the node group.".into(),
        );
        self.recorder.describe_gauge(
            KeyName::from_const_str(NODE_GROUP_MAX_SPEC),
            Some(Unit::Count),
            "Current maximum bound of the node group.".into(),
        );
        self.recorder.describe_gauge(
            KeyName::from_const_str(NODE_GROUP_SIZE),
            Some(Unit::Count),
            "Current size of the node group.".into(),
        );
        self.recorder.describe_counter(
            KeyName::from_const_str(NODE_GROUP_SCALING_FAILURES),
            Some(Unit::Count),
            "Failed scaling attempts of the node group by failure type.".into(),
        );
    }

    fn phase_gauge(&self, name: &'static str, phase: &str) -> Gauge {
        let key = Key::from_parts(name, vec![Label::new(PHASE_LABEL, phase.to_string())]);
        self.recorder.register_gauge(&key, &METADATA)
    }

    fn phase_histogram(&self, name: &'static str, phase: &str) -> Histogram {
        let key = Key::from_parts(name, vec![Label::new(PHASE_LABEL, phase.to_string())]);
        self.recorder.register_histogram(&key, &METADATA)
    }

    fn group_gauge(&self, name: &'static str, node_group: &str) -> Gauge {
        let key = Key::from_parts(
            name,
            vec![Label::new(NODE_GROUP_LABEL, node_group.to_string())],
        );
        self.recorder.register_gauge(&key, &METADATA)
    }
}

/// Elapsed whole microseconds since `start`.
///
/// Truncated by integer division, not rounded, to stay numerically
/// compatible with historical series data.
#[allow(clippy::cast_precision_loss)]
fn elapsed_micros(start: Instant) -> f64 {
    start.elapsed().as_micros() as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use autoscaler_test_utils::{has_series, sample_value};
    use std::time::Duration;

    fn registry() -> MetricsRegistry {
        MetricsRegistry::new().expect("registry should construct")
    }

    fn unix_now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn phase_start_records_wall_clock_seconds() {
        let registry = registry();

        let before = unix_now_secs();
        registry.record_phase_start("main");
        let after = unix_now_secs();

        let recorded = sample_value(
            &registry.render(),
            "cluster_autoscaler_last_time_seconds",
            &[("main", "main")],
        )
        .expect("series should exist after first start");

        #[allow(clippy::cast_precision_loss)]
        {
            assert!(recorded >= before as f64);
            assert!(recorded <= after as f64);
        }
        // Whole seconds, as the collector contract requires
        assert_eq!(recorded.fract(), 0.0);
    }

    #[test]
    fn phase_start_last_call_wins() {
        let registry = registry();

        registry.record_phase_start("scale_up");
        registry.record_phase_start("scale_up");

        // Exactly one sample line for the phase, holding the latest value
        let rendered = registry.render();
        let matching = rendered
            .lines()
            .filter(|line| {
                line.starts_with("cluster_autoscaler_last_time_seconds{")
                    && line.contains("main=\"scale_up\"")
            })
            .count();
        assert_eq!(matching, 1);
    }

    #[test]
    fn phase_duration_sets_gauge_and_feeds_summary_from_one_sample() {
        let registry = registry();
        let start = Instant::now()
            .checked_sub(Duration::from_millis(2))
            .unwrap();

        registry.record_phase_duration("scale_down", start);

        let rendered = registry.render();
        let gauge = sample_value(
            &rendered,
            "cluster_autoscaler_last_duration_microseconds",
            &[("main", "scale_down")],
        )
        .unwrap();
        let sum = sample_value(
            &rendered,
            "cluster_autoscaler_duration_microseconds_sum",
            &[("main", "scale_down")],
        )
        .unwrap();
        let count = sample_value(
            &rendered,
            "cluster_autoscaler_duration_microseconds_count",
            &[("main", "scale_down")],
        )
        .unwrap();

        assert!(gauge >= 2_000.0, "elapsed should cover the backdated start");
        assert!(gauge < 60_000_000.0, "sanity bound on elapsed");
        // Truncation to whole microseconds
        assert_eq!(gauge.fract(), 0.0);
        // The gauge and the summary observation share one elapsed computation
        assert_eq!(count, 1.0);
        assert!((sum - gauge).abs() < f64::EPSILON);
    }

    #[test]
    fn phase_duration_accumulates_summary_observations() {
        let registry = registry();

        registry.record_phase_duration("main", Instant::now());
        registry.record_phase_duration("main", Instant::now());
        registry.record_phase_duration("main", Instant::now());

        let count = sample_value(
            &registry.render(),
            "cluster_autoscaler_duration_microseconds_count",
            &[("main", "main")],
        )
        .unwrap();
        assert_eq!(count, 3.0);
    }

    #[test]
    fn phase_duration_without_prior_start_is_valid() {
        let registry = registry();

        // No record_phase_start for this phase; duration is relative to the
        // caller-supplied start
        registry.record_phase_duration("orphan", Instant::now());

        assert!(has_series(
            &registry.render(),
            "cluster_autoscaler_last_duration_microseconds",
        ));
        assert!(!has_series(
            &registry.render(),
            "cluster_autoscaler_last_time_seconds",
        ));
    }

    #[test]
    fn phases_record_independently() {
        let registry = registry();

        registry.record_phase_duration("scale_up", Instant::now());
        registry.record_phase_duration("scale_down", Instant::now());
        registry.record_phase_duration("scale_down", Instant::now());

        let rendered = registry.render();
        let up = sample_value(
            &rendered,
            "cluster_autoscaler_duration_microseconds_count",
            &[("main", "scale_up")],
        )
        .unwrap();
        let down = sample_value(
            &rendered,
            "cluster_autoscaler_duration_microseconds_count",
            &[("main", "scale_down")],
        )
        .unwrap();
        assert_eq!(up, 1.0);
        assert_eq!(down, 2.0);
    }

    #[test]
    fn min_and_max_bounds_set_independently_in_either_order() {
        let registry = registry();
        registry.set_node_group_min("pool-a", 3);
        registry.set_node_group_max("pool-a", 10);

        let swapped = MetricsRegistry::new().unwrap();
        swapped.set_node_group_max("pool-a", 10);
        swapped.set_node_group_min("pool-a", 3);

        for rendered in [registry.render(), swapped.render()] {
            assert_eq!(
                sample_value(
                    &rendered,
                    "cluster_autoscaler_node_group_min_spec",
                    &[("node_group", "pool-a")],
                ),
                Some(3.0)
            );
            assert_eq!(
                sample_value(
                    &rendered,
                    "cluster_autoscaler_node_group_max_spec",
                    &[("node_group", "pool-a")],
                ),
                Some(10.0)
            );
        }
    }

    #[test]
    fn bounds_accept_unvalidated_values() {
        let registry = registry();

        // min > max is the caller's problem, not the registry's
        registry.set_node_group_min("pool-a", 10);
        registry.set_node_group_max("pool-a", 3);

        let rendered = registry.render();
        assert_eq!(
            sample_value(
                &rendered,
                "cluster_autoscaler_node_group_min_spec",
                &[("node_group", "pool-a")],
            ),
            Some(10.0)
        );
        assert_eq!(
            sample_value(
                &rendered,
                "cluster_autoscaler_node_group_max_spec",
                &[("node_group", "pool-a")],
            ),
            Some(3.0)
        );
    }

    #[test]
    fn size_deltas_compose_with_absolute_set() {
        let registry = registry();

        registry.set_node_group_size("pool-a", 5);
        registry.node_added("pool-a");
        registry.node_added("pool-a");
        registry.node_removed("pool-a");

        assert_eq!(
            sample_value(
                &registry.render(),
                "cluster_autoscaler_node_group_size",
                &[("node_group", "pool-a")],
            ),
            Some(6.0)
        );
    }

    #[test]
    fn size_deltas_from_zero_baseline() {
        let registry = registry();

        registry.node_added("pool-b");
        registry.node_added("pool-b");
        registry.node_added("pool-b");
        registry.node_removed("pool-b");

        assert_eq!(
            sample_value(
                &registry.render(),
                "cluster_autoscaler_node_group_size",
                &[("node_group", "pool-b")],
            ),
            Some(2.0)
        );
    }

    #[test]
    fn node_groups_do_not_interfere() {
        let registry = registry();

        registry.set_node_group_size("pool-a", 4);
        registry.node_added("pool-b");

        let rendered = registry.render();
        assert_eq!(
            sample_value(
                &rendered,
                "cluster_autoscaler_node_group_size",
                &[("node_group", "pool-a")],
            ),
            Some(4.0)
        );
        assert_eq!(
            sample_value(
                &rendered,
                "cluster_autoscaler_node_group_size",
                &[("node_group", "pool-b")],
            ),
            Some(1.0)
        );
    }

    #[test]
    fn scale_failures_count_per_type() {
        let registry = registry();

        registry.record_scale_failure("pool-a", "quota");
        registry.record_scale_failure("pool-a", "quota");
        registry.record_scale_failure("pool-a", "quota");
        registry.record_scale_failure("pool-a", "timeout");

        let rendered = registry.render();
        assert_eq!(
            sample_value(
                &rendered,
                "cluster_autoscaler_node_group_scaling_failures",
                &[("node_group", "pool-a"), ("type", "quota")],
            ),
            Some(3.0)
        );
        assert_eq!(
            sample_value(
                &rendered,
                "cluster_autoscaler_node_group_scaling_failures",
                &[("node_group", "pool-a"), ("type", "timeout")],
            ),
            Some(1.0)
        );
    }

    #[test]
    fn series_are_absent_until_first_touch() {
        let registry = registry();
        let rendered = registry.render();

        assert!(!has_series(&rendered, "cluster_autoscaler_node_group_size"));
        assert!(!has_series(
            &rendered,
            "cluster_autoscaler_node_group_scaling_failures",
        ));

        registry.node_added("pool-a");
        assert!(has_series(
            &registry.render(),
            "cluster_autoscaler_node_group_size",
        ));
    }

    #[test]
    fn unknown_label_values_are_silently_accepted() {
        let registry = registry();

        registry.set_node_group_size("", 1);
        registry.record_scale_failure("pool/with/slashes", "weird type");

        let rendered = registry.render();
        assert_eq!(
            sample_value(
                &rendered,
                "cluster_autoscaler_node_group_size",
                &[("node_group", "")],
            ),
            Some(1.0)
        );
        assert_eq!(
            sample_value(
                &rendered,
                "cluster_autoscaler_node_group_scaling_failures",
                &[("node_group", "pool/with/slashes"), ("type", "weird type")],
            ),
            Some(1.0)
        );
    }

    #[test]
    fn registry_instances_are_isolated() {
        let first = registry();
        let second = registry();

        first.set_node_group_size("pool-a", 7);

        assert!(has_series(
            &first.render(),
            "cluster_autoscaler_node_group_size",
        ));
        assert!(!has_series(
            &second.render(),
            "cluster_autoscaler_node_group_size",
        ));
    }
}
