pub mod plan;

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use fleet_types::{Market, Urgency, WorkerInstance};

use crate::collaborators::{ComputeProvider, InstanceStatus};
use crate::util::Error;

#[derive(Debug, Default)]
pub struct AddResult {
    pub launched: Vec<WorkerInstance>,
    pub joined: Vec<WorkerInstance>,
    pub failed: Vec<String>,
    pub causes: Vec<String>,
}

/// Turns an `Add(n, urgency)` intent into instances joining the cluster,
/// honouring the configured spot/on-demand mix and zone balance.
pub struct Provisioner {
    provider: Arc<dyn ComputeProvider>,
    template_id: String,
    cluster_id: String,
    spot_percentage: f64,
    join_deadline: Duration,
    join_token: Option<String>,
}

impl Provisioner {
    pub fn new(
        provider: Arc<dyn ComputeProvider>,
        template_id: String,
        cluster_id: String,
        spot_percentage: f64,
        join_deadline: Duration,
        join_token: Option<String>,
    ) -> Self {
        Self {
            provider,
            template_id,
            cluster_id,
            spot_percentage,
            join_deadline,
            join_token,
        }
    }

    pub async fn add(&self, n: u32, _urgency: Urgency) -> Result<AddResult, Error> {
        let inventory = self.provider.list_instances(&self.cluster_id).await?;

        let mut zone_counts: BTreeMap<String, u32> = BTreeMap::new();
        let mut spot_count = 0u32;
        let mut ondemand_count = 0u32;
        for instance in &inventory {
            *zone_counts.entry(instance.zone.clone()).or_insert(0) += 1;
            match instance.market {
                Market::Spot => spot_count += 1,
                Market::OnDemand => ondemand_count += 1,
            }
        }

        let (spot_to_add, ondemand_to_add) = plan::mix_plan(spot_count, ondemand_count, n, self.spot_percentage);
        let zones = plan::plan_zones(&zone_counts, n);
        let markets: Vec<Market> = std::iter::repeat_n(Market::Spot, spot_to_add as usize)
            .chain(std::iter::repeat_n(Market::OnDemand, ondemand_to_add as usize))
            .collect();

        let mut result = AddResult::default();
        for (zone, market) in zones.into_iter().zip(markets) {
            let tags = worker_tags(&self.cluster_id, market, self.join_token.as_deref());
            match self.provider.launch_from_template(&self.template_id, market, &zone, &tags).await {
                Ok(instance) => result.launched.push(instance),
                Err(Error::SpotUnavailable { .. }) if market == Market::Spot => {
                    match self.provider.launch_from_template(&self.template_id, Market::OnDemand, &zone, &tags).await {
                        Ok(instance) => result.launched.push(instance),
                        Err(Error::QuotaExceeded) => {
                            result.causes.push("quota".to_string());
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(zone, error = %e, "on-demand fallback launch failed");
                            result.causes.push("transport".to_string());
                        }
                    }
                }
                Err(Error::QuotaExceeded) => {
                    result.causes.push("quota".to_string());
                    break;
                }
                Err(e) => {
                    tracing::warn!(zone, error = %e, "launch failed");
                    result.causes.push("transport".to_string());
                }
            }
        }

        self.wait_for_join(&mut result).await?;
        Ok(result)
    }

    async fn wait_for_join(&self, result: &mut AddResult) -> Result<(), Error> {
        if result.launched.is_empty() {
            return Ok(());
        }
        let deadline = tokio::time::Instant::now() + self.join_deadline;
        let mut pending: Vec<WorkerInstance> = result.launched.clone();

        while !pending.is_empty() && tokio::time::Instant::now() < deadline {
            let ids: Vec<String> = pending.iter().map(|i| i.instance_id.clone()).collect();
            let statuses = self.provider.describe_instance_status(&ids).await?;
            let mut still_pending = Vec::new();
            for (instance, status) in pending.into_iter().zip(statuses) {
                match status {
                    InstanceStatus::Ready => {
                        let mut joined = instance;
                        joined.join_time = Some(crate::util::now_epoch());
                        result.joined.push(joined);
                    }
                    InstanceStatus::Failed => result.failed.push(instance.instance_id),
                    InstanceStatus::Pending => still_pending.push(instance),
                }
            }
            pending = still_pending;
            if !pending.is_empty() {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }

        if !pending.is_empty() {
            let ids: Vec<String> = pending.iter().map(|i| i.instance_id.clone()).collect();
            for instance_id in &ids {
                let err = Error::JoinTimeout {
                    instance_id: instance_id.clone(),
                };
                tracing::warn!(code = err.code(), error = %err, "instance join timed out");
            }
            self.provider.terminate_instances(&ids).await?;
            result.failed.extend(ids);
        }
        Ok(())
    }
}

fn worker_tags(cluster_id: &str, market: Market, join_token: Option<&str>) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::from([
        (fleet_common::tags::ROLE.to_string(), fleet_common::tags::ROLE_WORKER.to_string()),
        (fleet_common::tags::CLUSTER_ID.to_string(), cluster_id.to_string()),
        (
            fleet_common::tags::MANAGED_BY.to_string(),
            fleet_common::tags::MANAGED_BY_VALUE.to_string(),
        ),
        (fleet_common::tags::MARKET.to_string(), market.to_string()),
    ]);
    if let Some(token) = join_token {
        tags.insert("join_token".to_string(), token.to_string());
    }
    tags
}
