mod victims;

use std::time::Duration;

use crate::collaborators::{ClusterRegistry, ComputeProvider};
use crate::util::Error;

pub use victims::{DrainCandidate, select_victims};

#[derive(Debug, Clone)]
pub enum DrainOutcome {
    Terminated { instance_id: String },
    Aborted { instance_id: String, reason: &'static str },
}

/// Given `Remove(k)` victims, gracefully removes them: cordon, evict,
/// verify, terminate. A victim that fails to drain in time is
/// uncordoned and left running; it is never retried within the same tick.
pub struct Drainer {
    registry: std::sync::Arc<ClusterRegistry>,
    provider: std::sync::Arc<dyn ComputeProvider>,
    drain_timeout: Duration,
}

impl Drainer {
    pub fn new(
        registry: std::sync::Arc<ClusterRegistry>,
        provider: std::sync::Arc<dyn ComputeProvider>,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            provider,
            drain_timeout,
        }
    }

    pub async fn remove(&self, victim_instance_ids: &[String]) -> Result<Vec<DrainOutcome>, Error> {
        let mut outcomes = Vec::with_capacity(victim_instance_ids.len());
        for instance_id in victim_instance_ids {
            outcomes.push(self.drain_one(instance_id).await?);
        }
        Ok(outcomes)
    }

    async fn drain_one(&self, instance_id: &str) -> Result<DrainOutcome, Error> {
        // Node name equals instance id in this cluster registry's naming
        // convention (the join process registers nodes by instance id).
        let node_name = instance_id;

        self.registry.cordon(node_name).await?;

        let pods = self.registry.evictable_pods_on_node(node_name).await?;
        for pod in &pods {
            if let (Some(ns), Some(name)) = (&pod.metadata.namespace, &pod.metadata.name) {
                if let Err(e) = self.registry.evict_pod(ns, name).await {
                    tracing::warn!(node = node_name, pod = name, error = %e, "eviction request failed");
                }
            }
        }

        let deadline = tokio::time::Instant::now() + self.drain_timeout;
        loop {
            let remaining = self.registry.evictable_pods_on_node(node_name).await?;
            if remaining.is_empty() {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                self.registry.uncordon(node_name).await?;
                let err = Error::DrainTimeout {
                    node: node_name.to_string(),
                };
                tracing::warn!(code = err.code(), error = %err, "drain deadline exceeded, uncordoning");
                return Ok(DrainOutcome::Aborted {
                    instance_id: instance_id.to_string(),
                    reason: "DRAIN_TIMEOUT",
                });
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }

        self.provider.terminate_instances(std::slice::from_ref(&instance_id.to_string())).await?;
        self.registry.delete_node(node_name).await?;
        Ok(DrainOutcome::Terminated {
            instance_id: instance_id.to_string(),
        })
    }
}
