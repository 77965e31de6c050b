use std::collections::BTreeMap;

/// Target spot/on-demand split for `n` new workers, preferring spot up to
/// the deficit from the configured target ratio.
pub fn mix_plan(existing_spot: u32, existing_ondemand: u32, n: u32, spot_percentage: f64) -> (u32, u32) {
    let total_after = existing_spot + existing_ondemand + n;
    let target_spot = (total_after as f64 * spot_percentage / 100.0).round() as u32;
    let deficit = target_spot.saturating_sub(existing_spot);
    let spot_to_add = deficit.min(n);
    (spot_to_add, n - spot_to_add)
}

/// Picks zones for `n` new workers one at a time, always placing the next
/// worker in the zone with the lowest current count (ties by name), and
/// updating the running count before picking the next zone.
pub fn plan_zones(zone_counts: &BTreeMap<String, u32>, n: u32) -> Vec<String> {
    let mut counts = zone_counts.clone();
    let mut plan = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let zone = counts
            .iter()
            .min_by_key(|(name, count)| (**count, name.to_string()))
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| "default".to_string());
        *counts.entry(zone.clone()).or_insert(0) += 1;
        plan.push(zone);
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_plan_prefers_spot_up_to_deficit() {
        assert_eq!(mix_plan(0, 0, 10, 70.0), (7, 3));
        assert_eq!(mix_plan(7, 3, 2, 70.0), (1, 1));
        assert_eq!(mix_plan(10, 0, 5, 70.0), (1, 4));
    }

    #[test]
    fn zone_plan_balances_across_calls() {
        let counts = BTreeMap::from([("a".to_string(), 3), ("b".to_string(), 1)]);
        let plan = plan_zones(&counts, 3);
        assert_eq!(plan, vec!["b", "b", "a"]);
    }

    #[test]
    fn zone_plan_ties_break_by_name() {
        let counts = BTreeMap::from([("z".to_string(), 0), ("a".to_string(), 0)]);
        let plan = plan_zones(&counts, 1);
        assert_eq!(plan, vec!["a"]);
    }
}
