use fleet_types::MetricHistoryEntry;

const LATENCY_HIGH_SECONDS: f64 = 2.0;
const ERROR_RATE_HIGH: f64 = 0.05;
const QUEUE_DEPTH_HIGH: u64 = 100;

const LATENCY_LOW_SECONDS: f64 = 1.0;
const ERROR_RATE_LOW: f64 = 0.01;
const QUEUE_DEPTH_LOW: u64 = 10;

/// True when any custom metric on this history entry is over its
/// high-water mark. Meant to be folded over a window via `sustained::sustained_recent`.
pub fn over_high_water_mark(e: &MetricHistoryEntry) -> bool {
    e.latency.is_some_and(|v| v > LATENCY_HIGH_SECONDS)
        || e.error_rate.is_some_and(|v| v > ERROR_RATE_HIGH)
        || e.queue_depth.is_some_and(|v| v > QUEUE_DEPTH_HIGH)
}

/// True only when every custom metric present on this entry is below its
/// low-water mark; a metric that was never reported does not block scale-down.
pub fn under_low_water_mark(e: &MetricHistoryEntry) -> bool {
    e.latency.is_none_or(|v| v < LATENCY_LOW_SECONDS)
        && e.error_rate.is_none_or(|v| v < ERROR_RATE_LOW)
        && e.queue_depth.is_none_or(|v| v < QUEUE_DEPTH_LOW)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(latency: Option<f64>, error: Option<f64>, queue: Option<u64>) -> MetricHistoryEntry {
        MetricHistoryEntry {
            t: 0,
            cpu: 0.0,
            mem: 0.0,
            pending: 0,
            latency,
            error_rate: error,
            queue_depth: queue,
        }
    }

    #[test]
    fn high_latency_triggers_up() {
        assert!(over_high_water_mark(&entry(Some(2.5), None, None)));
        assert!(!over_high_water_mark(&entry(Some(1.0), None, None)));
    }

    #[test]
    fn absent_metrics_never_block_scale_down() {
        assert!(under_low_water_mark(&entry(None, None, None)));
    }

    #[test]
    fn present_metric_must_clear_its_low_mark() {
        assert!(!under_low_water_mark(&entry(Some(1.5), None, None)));
        assert!(under_low_water_mark(&entry(Some(0.5), Some(0.005), Some(3))));
    }
}
