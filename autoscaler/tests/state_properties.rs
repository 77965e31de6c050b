use std::collections::BTreeMap;

use fleet_autoscaler::provisioner;
use fleet_types::{ClusterState, MetricHistoryEntry};
use proptest::prelude::*;

fn arb_entries(len: usize) -> impl Strategy<Value = Vec<MetricHistoryEntry>> {
    proptest::collection::vec((0.0f64..100.0, 0.0f64..100.0, 0u32..30), len).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (cpu, mem, pending))| MetricHistoryEntry {
                t: i as i64,
                cpu,
                mem,
                pending,
                latency: None,
                error_rate: None,
                queue_depth: None,
            })
            .collect()
    })
}

proptest! {
    /// Serializing and deserializing `ClusterState` round-trips exactly,
    /// preserving history order.
    #[test]
    fn cluster_state_round_trips_through_json(
        count in 0u32..50,
        entries in arb_entries(12),
    ) {
        let mut state = ClusterState::new("prop-cluster", count);
        for e in entries {
            state.push_history(e, 10);
        }
        let encoded = serde_json::to_string(&state).unwrap();
        let decoded: ClusterState = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(state, decoded);
    }

    /// History is always trimmed to the configured bound, and the
    /// surviving entries are always the most recently pushed ones in order.
    #[test]
    fn history_bound_keeps_most_recent_in_order(
        entries in arb_entries(30),
        bound in 1usize..15,
    ) {
        let mut state = ClusterState::new("c1", 3);
        for e in &entries {
            state.push_history(*e, bound);
        }
        prop_assert!(state.metric_history.len() <= bound);
        let expected_tail = &entries[entries.len().saturating_sub(bound)..];
        prop_assert_eq!(&state.metric_history, expected_tail);
    }

    /// `mix_plan` always allocates exactly `n` new workers between the two
    /// markets, never more and never fewer.
    #[test]
    fn mix_plan_allocates_exactly_n(
        existing_spot in 0u32..50,
        existing_ondemand in 0u32..50,
        n in 0u32..20,
        spot_pct in 0.0f64..100.0,
    ) {
        let (spot, ondemand) = provisioner::plan::mix_plan(existing_spot, existing_ondemand, n, spot_pct);
        prop_assert_eq!(spot + ondemand, n);
    }

    /// `plan_zones` always returns exactly `n` placements, and after
    /// folding them into the starting counts, no zone's count exceeds
    /// another's by more than 1 when zones started balanced.
    #[test]
    fn plan_zones_stays_balanced_from_even_start(
        zone_count in 1usize..5,
        per_zone in 0u32..20,
        n in 0u32..20,
    ) {
        let counts: BTreeMap<String, u32> = (0..zone_count)
            .map(|i| (format!("zone-{i}"), per_zone))
            .collect();
        let plan = provisioner::plan::plan_zones(&counts, n);
        prop_assert_eq!(plan.len(), n as usize);

        let mut after = counts.clone();
        for zone in &plan {
            *after.entry(zone.clone()).or_insert(0) += 1;
        }
        let min = *after.values().min().unwrap();
        let max = *after.values().max().unwrap();
        prop_assert!(max - min <= 1);
    }
}
