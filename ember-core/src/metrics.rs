use std::fmt::Debug;

/// Narrow metrics sink contract (`spec.md` §6). The Prometheus registry
/// itself is out of scope per `spec.md` §1; this trait is the seam an
/// external registry implementation plugs into. Carried as ambient stack
/// even though the registry is a non-goal, per `SPEC_FULL.md` §2.
pub trait MetricsSink: Send + Sync + Debug {
    fn incr_counter(&self, name: &'static str, labels: &[(&'static str, &str)]);
    fn set_gauge(&self, name: &'static str, value: f64, labels: &[(&'static str, &str)]);
    fn observe_histogram(&self, name: &'static str, value: f64, labels: &[(&'static str, &str)]);
}

/// No-op sink used by default and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn incr_counter(&self, _name: &'static str, _labels: &[(&'static str, &str)]) {}
    fn set_gauge(&self, _name: &'static str, _value: f64, _labels: &[(&'static str, &str)]) {}
    fn observe_histogram(&self, _name: &'static str, _value: f64, _labels: &[(&'static str, &str)]) {}
}
