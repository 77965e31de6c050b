use chrono::{DateTime, Utc};
use fleet_types::{ClusterState, HistoricalMetric, MetricSample, ScalingConfig, ScalingIntent, Urgency};

use super::{custom_metrics, predictive, sustained};

/// Evidence that a lock just reclaimed from expiry still has unsettled
/// work in flight (rule 3): untagged pending instances, or nodes stuck
/// not-ready past `join_deadline`. Computed by the reconciler from
/// provider/cluster-registry inventory, never by the engine itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProgressEvidence {
    pub stuck_instances: bool,
}

/// Pure, total function over (config, state, sample, history, clock,
/// in-progress evidence) -> ScalingIntent. Performs no I/O and never fails;
/// the only invalid inputs it could receive are configuration-validation
/// errors, which are rejected before this is ever called.
#[allow(clippy::too_many_arguments)]
pub fn decide(
    config: &ScalingConfig,
    state: &ClusterState,
    sample: &MetricSample,
    history_with_current: &[fleet_types::MetricHistoryEntry],
    forecast_history: &[HistoricalMetric],
    now: DateTime<Utc>,
    evidence: InProgressEvidence,
) -> ScalingIntent {
    // Rule 3: in-progress guard dominates every trigger below.
    if evidence.stuck_instances {
        return ScalingIntent::noop("IN_PROGRESS_GUARD");
    }

    let candidate = evaluate_triggers(config, state, sample, history_with_current, forecast_history, now);

    // Rule 1: hard cap.
    if candidate.action == fleet_types::ActionKind::Up && state.desired_worker_count >= config.max_workers {
        return ScalingIntent::noop("AT_CAPACITY");
    }

    // Rule 2: hard floor.
    if candidate.action == fleet_types::ActionKind::Down && state.desired_worker_count <= config.min_workers {
        return ScalingIntent::noop("AT_FLOOR");
    }

    candidate
}

fn evaluate_triggers(
    config: &ScalingConfig,
    state: &ClusterState,
    sample: &MetricSample,
    history: &[fleet_types::MetricHistoryEntry],
    forecast_history: &[HistoricalMetric],
    now: DateTime<Utc>,
) -> ScalingIntent {
    let now_epoch = now.timestamp();

    // Rule 4: critical up, ignores the up-cooldown entirely.
    if sample.pending_pods > config.urgency_pending_pods {
        return ScalingIntent::up(2, Urgency::Critical, "CRIT_PENDING");
    }
    if sample.cpu_pct > config.urgency_cpu_pct {
        return ScalingIntent::up(2, Urgency::Critical, "CRIT_CPU");
    }

    let cooldown_up_elapsed = now_epoch >= state.cooldown_up_until;
    let cooldown_down_elapsed = now_epoch >= state.cooldown_down_until;

    // Rule 5: reactive up, two-sample sustained confirmation.
    if cooldown_up_elapsed {
        if sustained::sustained_recent(history, config.sustained_samples, |e| e.cpu > config.cpu_up_pct) {
            return ScalingIntent::up(1, Urgency::Normal, "CPU_SUSTAINED");
        }
        if sustained::sustained_recent(history, config.sustained_samples, |e| e.pending > 0) {
            return ScalingIntent::up(1, Urgency::Normal, "PENDING_SUSTAINED");
        }
        if sustained::sustained_recent(history, config.sustained_samples, |e| e.mem > config.mem_up_pct) {
            return ScalingIntent::up(1, Urgency::Normal, "MEM_SUSTAINED");
        }
    }

    // Rule 6: custom-metric up, two-sample sustained confirmation, same
    // confirmation family as rule 5.
    if config.enable_custom_metrics
        && cooldown_up_elapsed
        && sustained::sustained_recent(history, config.sustained_samples, custom_metrics::over_high_water_mark)
    {
        return ScalingIntent::up(1, Urgency::Custom, "CUSTOM_METRIC_SUSTAINED");
    }

    // Rule 7: predictive up, gated to the prescale window near the hour
    // boundary so a forecast doesn't keep re-firing for the full hour.
    if config.enable_predictive && cooldown_up_elapsed && predictive::in_prescale_window(now) {
        if let Some(predicted) = predictive::predict(now, forecast_history) {
            if predictive::should_prescale(predicted, sample.cpu_pct, config.cpu_up_pct) {
                return ScalingIntent::up(1, Urgency::Predictive, "PREDICTIVE_PRESCALE");
            }
        }
    }

    // Rule 8: reactive down, full-window sustained confirmation. Pending
    // pods block a scale-down outright, with their own reason code, rather
    // than falling through to the generic stable noop.
    if cooldown_down_elapsed && sample.pending_pods > 0 {
        return ScalingIntent::noop("PENDING_PRESENT");
    }
    if cooldown_down_elapsed
        && sustained::sustained_window(history, config.history_size, |e| e.cpu < config.cpu_down_pct)
        && sustained::sustained_window(history, config.history_size, |e| e.pending == 0)
        && sustained::sustained_window(history, config.history_size, |e| e.mem < config.mem_down_pct)
        && (!config.enable_custom_metrics
            || sustained::sustained_window(history, config.history_size, custom_metrics::under_low_water_mark))
    {
        return ScalingIntent::down(1, "REACTIVE_DOWN");
    }

    ScalingIntent::noop("STABLE")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fleet_types::MetricHistoryEntry;

    fn config() -> ScalingConfig {
        ScalingConfig {
            cluster_id: "c1".into(),
            min_workers: 2,
            max_workers: 10,
            tick_interval_secs: 120,
            cooldown_up_secs: 300,
            cooldown_down_secs: 600,
            cpu_up_pct: 70.0,
            cpu_down_pct: 30.0,
            mem_up_pct: 75.0,
            mem_down_pct: 50.0,
            sustained_samples: 2,
            history_size: 10,
            join_deadline_secs: 300,
            drain_timeout_secs: 300,
            spot_percentage: 70.0,
            enable_predictive: false,
            enable_custom_metrics: false,
            lock_ttl_secs: 330,
            metrics_query_deadline_secs: 10,
            urgency_cpu_pct: 90.0,
            urgency_pending_pods: 10,
        }
    }

    fn sample(cpu: f64, mem: f64, pending: u32) -> MetricSample {
        MetricSample {
            captured_at: 0,
            cpu_pct: cpu,
            mem_pct: mem,
            pending_pods: pending,
            api_latency_p95_seconds: None,
            error_rate_ratio: None,
            queue_depth: None,
        }
    }

    fn entry(cpu: f64, pending: u32) -> MetricHistoryEntry {
        MetricHistoryEntry {
            t: 0,
            cpu,
            mem: 40.0,
            pending,
            latency: None,
            error_rate: None,
            queue_depth: None,
        }
    }

    fn custom_entry(cpu: f64, pending: u32, latency: Option<f64>) -> MetricHistoryEntry {
        MetricHistoryEntry {
            t: 0,
            cpu,
            mem: 40.0,
            pending,
            latency,
            error_rate: None,
            queue_depth: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    // Scenario 1: critical scale-up on pending pods.
    #[test]
    fn critical_scale_up_on_pending_pods() {
        let cfg = config();
        let mut state = ClusterState::new("c1", 3);
        state.push_history(entry(40.0, 0), 10);
        let m = sample(45.0, 50.0, 12);
        let history = {
            let mut h = state.metric_history.clone();
            h.push(m.to_history_entry());
            h
        };
        let intent = decide(&cfg, &state, &m, &history, &[], now(), InProgressEvidence::default());
        assert_eq!(intent.action, fleet_types::ActionKind::Up);
        assert_eq!(intent.magnitude, 2);
        assert_eq!(intent.urgency, Urgency::Critical);
        assert_eq!(intent.reason, "CRIT_PENDING");
    }

    // Scenario 2: reactive scale-up requires two samples.
    #[test]
    fn reactive_scale_up_requires_two_samples() {
        let cfg = config();
        let mut state = ClusterState::new("c1", 4);
        state.push_history(entry(78.0, 0), 10);
        let m = sample(72.0, 40.0, 0);
        let history = {
            let mut h = state.metric_history.clone();
            h.push(m.to_history_entry());
            h
        };
        let intent = decide(&cfg, &state, &m, &history, &[], now(), InProgressEvidence::default());
        assert_eq!(intent.action, fleet_types::ActionKind::Up);
        assert_eq!(intent.magnitude, 1);
        assert_eq!(intent.reason, "CPU_SUSTAINED");
    }

    // Scenario 3: single-spike suppression.
    #[test]
    fn single_spike_is_suppressed() {
        let cfg = config();
        let mut state = ClusterState::new("c1", 4);
        state.push_history(entry(40.0, 0), 10);
        let m = sample(85.0, 40.0, 0);
        let history = {
            let mut h = state.metric_history.clone();
            h.push(m.to_history_entry());
            h
        };
        let intent = decide(&cfg, &state, &m, &history, &[], now(), InProgressEvidence::default());
        assert_eq!(intent.action, fleet_types::ActionKind::Noop);
    }

    // Scenario 4: scale-down blocked by pending pods.
    #[test]
    fn scale_down_blocked_by_pending_pods() {
        let cfg = config();
        let mut state = ClusterState::new("c1", 4);
        for _ in 0..9 {
            state.push_history(entry(20.0, 0), 10);
        }
        let m = sample(20.0, 35.0, 1);
        let history = {
            let mut h = state.metric_history.clone();
            h.push(m.to_history_entry());
            h
        };
        let intent = decide(&cfg, &state, &m, &history, &[], now(), InProgressEvidence::default());
        assert_eq!(intent.action, fleet_types::ActionKind::Noop);
        assert_eq!(intent.reason, "PENDING_PRESENT");
    }

    // Scenario 7: ceiling respected.
    #[test]
    fn ceiling_is_respected() {
        let cfg = config();
        let mut state = ClusterState::new("c1", 10);
        state.push_history(entry(90.0, 20), 10);
        let m = sample(90.0, 50.0, 20);
        let history = {
            let mut h = state.metric_history.clone();
            h.push(m.to_history_entry());
            h
        };
        let intent = decide(&cfg, &state, &m, &history, &[], now(), InProgressEvidence::default());
        assert_eq!(intent.action, fleet_types::ActionKind::Noop);
        assert_eq!(intent.reason, "AT_CAPACITY");
    }

    #[test]
    fn floor_blocks_scale_down() {
        let cfg = config();
        let mut state = ClusterState::new("c1", 2);
        for _ in 0..10 {
            state.push_history(entry(10.0, 0), 10);
        }
        let m = sample(10.0, 20.0, 0);
        let history = state.metric_history.clone();
        let intent = decide(&cfg, &state, &m, &history, &[], now(), InProgressEvidence::default());
        assert_eq!(intent.action, fleet_types::ActionKind::Noop);
        assert_eq!(intent.reason, "AT_FLOOR");
    }

    #[test]
    fn in_progress_guard_overrides_every_trigger() {
        let cfg = config();
        let mut state = ClusterState::new("c1", 3);
        state.push_history(entry(40.0, 0), 10);
        let m = sample(95.0, 50.0, 50);
        let history = state.metric_history.clone();
        let evidence = InProgressEvidence { stuck_instances: true };
        let intent = decide(&cfg, &state, &m, &history, &[], now(), evidence);
        assert_eq!(intent.action, fleet_types::ActionKind::Noop);
        assert_eq!(intent.reason, "IN_PROGRESS_GUARD");
    }

    // Scenario 6: custom-metric scale-up requires two sustained samples, the
    // same confirmation family as CPU/mem, never a single-tick spike.
    #[test]
    fn custom_metric_single_spike_is_suppressed() {
        let mut cfg = config();
        cfg.enable_custom_metrics = true;
        let mut state = ClusterState::new("c1", 4);
        state.push_history(custom_entry(40.0, 0, Some(0.5)), 10);
        let m = MetricSample {
            captured_at: 0,
            cpu_pct: 40.0,
            mem_pct: 40.0,
            pending_pods: 0,
            api_latency_p95_seconds: Some(3.0),
            error_rate_ratio: None,
            queue_depth: None,
        };
        let history = {
            let mut h = state.metric_history.clone();
            h.push(m.to_history_entry());
            h
        };
        let intent = decide(&cfg, &state, &m, &history, &[], now(), InProgressEvidence::default());
        assert_eq!(intent.action, fleet_types::ActionKind::Noop);
    }

    #[test]
    fn custom_metric_scale_up_requires_two_samples() {
        let mut cfg = config();
        cfg.enable_custom_metrics = true;
        let mut state = ClusterState::new("c1", 4);
        state.push_history(custom_entry(40.0, 0, Some(3.0)), 10);
        let m = MetricSample {
            captured_at: 0,
            cpu_pct: 40.0,
            mem_pct: 40.0,
            pending_pods: 0,
            api_latency_p95_seconds: Some(3.0),
            error_rate_ratio: None,
            queue_depth: None,
        };
        let history = {
            let mut h = state.metric_history.clone();
            h.push(m.to_history_entry());
            h
        };
        let intent = decide(&cfg, &state, &m, &history, &[], now(), InProgressEvidence::default());
        assert_eq!(intent.action, fleet_types::ActionKind::Up);
        assert_eq!(intent.reason, "CUSTOM_METRIC_SUSTAINED");
    }
}
