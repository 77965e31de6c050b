use std::collections::BTreeMap;

/// A worker plus the facts the victim-selection algorithm needs, gathered
/// by the reconciler from the cluster registry and compute provider.
#[derive(Debug, Clone)]
pub struct DrainCandidate {
    pub instance_id: String,
    pub zone: String,
    pub non_system_pod_count: u32,
    pub hosts_unready_singleton: bool,
    pub violates_disruption_budget: bool,
    pub idle_since: i64,
}

/// Picks `k` victims in priority order: prefer the most-populated zone
/// without dropping any zone below its fair share, then fewest non-system
/// pods, then longest idle time, tie-broken by instance id. Excludes
/// workers whose removal would orphan a singleton workload or violate a
/// disruption budget outright.
pub fn select_victims(candidates: &[DrainCandidate], k: u32) -> Vec<String> {
    let mut zone_counts: BTreeMap<String, u32> = BTreeMap::new();
    for c in candidates {
        *zone_counts.entry(c.zone.clone()).or_insert(0) += 1;
    }

    let mut remaining: Vec<DrainCandidate> = candidates
        .iter()
        .filter(|c| !c.hosts_unready_singleton && !c.violates_disruption_budget)
        .cloned()
        .collect();

    let mut chosen = Vec::with_capacity(k as usize);
    for _ in 0..k {
        let eligible: Vec<&DrainCandidate> = remaining
            .iter()
            .filter(|c| az_floor_allows_removal(&zone_counts, &c.zone))
            .collect();
        let Some(victim) = eligible
            .into_iter()
            .max_by_key(|c| *zone_counts.get(&c.zone).unwrap_or(&0))
            .into_iter()
            .min_by_key(|c| {
                (
                    std::cmp::Reverse(*zone_counts.get(&c.zone).unwrap_or(&0)),
                    c.non_system_pod_count,
                    std::cmp::Reverse(c.idle_since),
                    c.instance_id.clone(),
                )
            })
        else {
            break;
        };
        let victim_id = victim.instance_id.clone();
        let zone = victim.zone.clone();
        *zone_counts.get_mut(&zone).unwrap() -= 1;
        remaining.retain(|c| c.instance_id != victim_id);
        chosen.push(victim_id);
    }
    chosen
}

fn az_floor_allows_removal(zone_counts: &BTreeMap<String, u32>, zone: &str) -> bool {
    let this_count = *zone_counts.get(zone).unwrap_or(&0);
    if this_count > 1 {
        return true;
    }
    // Removing the last worker in this zone is only safe if no other zone
    // still holds more than one worker.
    !zone_counts.iter().any(|(z, c)| z != zone && *c > 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, zone: &str, pods: u32, idle: i64) -> DrainCandidate {
        DrainCandidate {
            instance_id: id.to_string(),
            zone: zone.to_string(),
            non_system_pod_count: pods,
            hosts_unready_singleton: false,
            violates_disruption_budget: false,
            idle_since: idle,
        }
    }

    // Scenario 5: scale-down removes least-loaded victim respecting AZ floor.
    #[test]
    fn prefers_most_populated_zone_respecting_az_floor() {
        let candidates = vec![
            candidate("a1", "A", 1, 100),
            candidate("a2", "A", 0, 200),
            candidate("a3", "A", 2, 50),
            candidate("b1", "B", 0, 300),
        ];
        let victims = select_victims(&candidates, 1);
        assert_eq!(victims, vec!["a2".to_string()]);
    }

    #[test]
    fn az_floor_blocks_draining_last_worker_in_minority_zone() {
        let candidates = vec![candidate("a1", "A", 0, 100), candidate("b1", "B", 0, 200)];
        // Zone A and B both have exactly one worker; neither can be
        // drained to zero while the other holds more than one, but
        // neither holds more than one, so removal is allowed here.
        let victims = select_victims(&candidates, 1);
        assert_eq!(victims.len(), 1);
    }

    #[test]
    fn excludes_singleton_hosts_and_budget_violators() {
        let mut candidates = vec![candidate("a1", "A", 0, 100), candidate("a2", "A", 0, 200)];
        candidates[0].hosts_unready_singleton = true;
        let victims = select_victims(&candidates, 1);
        assert_eq!(victims, vec!["a2".to_string()]);
    }

    #[test]
    fn ties_break_by_longest_idle_then_instance_id() {
        let candidates = vec![candidate("z1", "A", 0, 50), candidate("a1", "A", 0, 50)];
        let victims = select_victims(&candidates, 1);
        assert_eq!(victims, vec!["a1".to_string()]);
    }
}
