/// Telemetry sink collaborator. The decompress-archive pipeline emits
/// exactly two counters per run: `size` (sum of declared entry sizes in
/// bytes) and `count` (non-directory entries materialized).
pub trait MetricSink {
    fn record_counter(&self, name: &str, value: u64);
}

/// Discards all metrics. For callers without a telemetry collaborator.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetrics;

impl MetricSink for NullMetrics {
    fn record_counter(&self, _name: &str, _value: u64) {}
}
