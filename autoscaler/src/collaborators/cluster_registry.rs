use k8s_openapi::api::apps::v1::{ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::{
    Api, Client,
    api::{EvictParams, ListParams, Patch, PatchParams},
};

use crate::util::Error;

/// Per-node facts `select_victims` needs beyond zone and idle time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainSignal {
    pub non_system_pod_count: u32,
    pub hosts_unready_singleton: bool,
    pub violates_disruption_budget: bool,
}

/// Read/write interface over the cluster's node objects: list, cordon,
/// uncordon, evict-pods-on-node, delete-node. Backed directly by
/// `kube::Api<Node>`/`kube::Api<Pod>` rather than a custom resource, since
/// the autoscaler manages real cluster nodes, not a CRD it owns.
pub struct ClusterRegistry {
    client: Client,
}

impl ClusterRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Lists node names currently carrying the given tag/label value.
    pub async fn list_tagged_nodes(&self, cluster_id: &str) -> Result<Vec<Node>, Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        let lp = ListParams::default().labels(&format!(
            "{}={},{}={}",
            fleet_common::tags::CLUSTER_ID,
            cluster_id,
            fleet_common::tags::MANAGED_BY,
            fleet_common::tags::MANAGED_BY_VALUE
        ));
        Ok(api.list(&lp).await?.items)
    }

    pub async fn cordon(&self, node_name: &str) -> Result<(), Error> {
        self.set_unschedulable(node_name, true).await
    }

    pub async fn uncordon(&self, node_name: &str) -> Result<(), Error> {
        self.set_unschedulable(node_name, false).await
    }

    async fn set_unschedulable(&self, node_name: &str, unschedulable: bool) -> Result<(), Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        let patch = serde_json::json!({ "spec": { "unschedulable": unschedulable } });
        api.patch(
            node_name,
            &PatchParams::apply("fleet-autoscaler"),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }

    /// Lists non-system, non-daemon pods currently scheduled on a node.
    pub async fn evictable_pods_on_node(&self, node_name: &str) -> Result<Vec<Pod>, Error> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let lp = ListParams::default().fields(&format!("spec.nodeName={node_name}"));
        let pods = api.list(&lp).await?.items;
        Ok(pods
            .into_iter()
            .filter(|p| !is_system_namespace(p) && !is_daemonset_owned(p))
            .collect())
    }

    /// Aggregates the facts victim selection needs for one node: how many
    /// live workload pods it hosts, whether any of them is the last ready
    /// replica of its owner, and whether evicting any of them would push a
    /// PodDisruptionBudget below its minimum.
    pub async fn drain_signal_for_node(&self, node_name: &str) -> Result<DrainSignal, Error> {
        let pods = self.evictable_pods_on_node(node_name).await?;
        let mut hosts_unready_singleton = false;
        for pod in &pods {
            if self.is_last_ready_replica(pod).await? {
                hosts_unready_singleton = true;
            }
        }
        let violates_disruption_budget = self.any_pod_blocks_disruption_budget(&pods).await?;
        Ok(DrainSignal {
            non_system_pod_count: pods.len() as u32,
            hosts_unready_singleton,
            violates_disruption_budget,
        })
    }

    async fn is_last_ready_replica(&self, pod: &Pod) -> Result<bool, Error> {
        let (Some(ns), Some(owner)) = (
            pod.metadata.namespace.as_deref(),
            pod.metadata.owner_references.as_ref().and_then(|refs| refs.first()),
        ) else {
            return Ok(false);
        };
        let ready_replicas = match owner.kind.as_str() {
            "ReplicaSet" => {
                let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), ns);
                api.get(&owner.name).await.ok().and_then(|rs| rs.status).and_then(|s| s.ready_replicas)
            }
            "StatefulSet" => {
                let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), ns);
                api.get(&owner.name).await.ok().and_then(|s| s.status).and_then(|s| s.ready_replicas)
            }
            _ => return Ok(false),
        };
        Ok(ready_replicas.unwrap_or(0) <= 1)
    }

    async fn any_pod_blocks_disruption_budget(&self, pods: &[Pod]) -> Result<bool, Error> {
        let mut namespaces: Vec<&str> = pods.iter().filter_map(|p| p.metadata.namespace.as_deref()).collect();
        namespaces.sort_unstable();
        namespaces.dedup();
        for ns in namespaces {
            let api: Api<PodDisruptionBudget> = Api::namespaced(self.client.clone(), ns);
            let pdbs = api.list(&ListParams::default()).await?.items;
            for pdb in &pdbs {
                let at_floor = pdb.status.as_ref().is_some_and(|s| s.disruptions_allowed <= 0);
                if !at_floor {
                    continue;
                }
                let Some(selector) = pdb.spec.as_ref().and_then(|s| s.selector.as_ref()) else {
                    continue;
                };
                let blocks = pods
                    .iter()
                    .any(|p| p.metadata.namespace.as_deref() == Some(ns) && selector_matches(selector, p));
                if blocks {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    pub async fn evict_pod(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.evict(name, &EvictParams::default()).await?;
        Ok(())
    }

    pub async fn delete_node(&self, node_name: &str) -> Result<(), Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        api.delete(node_name, &Default::default()).await?;
        Ok(())
    }
}

fn is_system_namespace(pod: &Pod) -> bool {
    pod.metadata
        .namespace
        .as_deref()
        .is_some_and(|ns| ns == "kube-system")
}

fn is_daemonset_owned(pod: &Pod) -> bool {
    pod.metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.kind == "DaemonSet"))
}

/// Matches only `matchLabels`; `matchExpressions` selectors are treated as
/// non-matching, which is conservative (never over-reports a violation).
fn selector_matches(selector: &LabelSelector, pod: &Pod) -> bool {
    let Some(match_labels) = selector.match_labels.as_ref() else {
        return false;
    };
    let Some(pod_labels) = pod.metadata.labels.as_ref() else {
        return false;
    };
    match_labels.iter().all(|(k, v)| pod_labels.get(k) == Some(v))
}
