use std::collections::BTreeMap;

use async_trait::async_trait;
use fleet_types::{Market, WorkerInstance};
use serde::{Deserialize, Serialize};

use crate::util::Error;

/// The cloud-resource provisioner's control surface. Deliberately a
/// generic HTTP interface rather than a cloud-specific SDK: the actual
/// VPC/IAM/instance machinery is explicitly out of scope, only the
/// operations the Provisioner drives need exposing.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    async fn launch_from_template(
        &self,
        template_id: &str,
        market: Market,
        zone: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<WorkerInstance, Error>;

    async fn list_instances(&self, cluster_id: &str) -> Result<Vec<WorkerInstance>, Error>;

    async fn terminate_instances(&self, instance_ids: &[String]) -> Result<(), Error>;

    async fn describe_instance_status(&self, instance_ids: &[String]) -> Result<Vec<InstanceStatus>, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum InstanceStatus {
    Pending,
    Ready,
    Failed,
}

/// Reqwest-backed adapter speaking a plain JSON control API, matching the
/// shape of this repo's other external service clients.
pub struct HttpComputeProvider {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpComputeProvider {
    pub fn new(base_url: String, auth_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[derive(Serialize)]
struct LaunchRequest<'a> {
    template_id: &'a str,
    market: Market,
    zone: &'a str,
    tags: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct LaunchResponse {
    instance_id: String,
    launch_time: i64,
}

#[derive(Deserialize)]
struct ListInstancesResponse {
    instances: Vec<WorkerInstance>,
}

#[derive(Serialize)]
struct TerminateRequest<'a> {
    instance_ids: &'a [String],
}

#[derive(Serialize)]
struct DescribeRequest<'a> {
    instance_ids: &'a [String],
}

#[derive(Deserialize)]
struct DescribeResponse {
    statuses: Vec<InstanceStatus>,
}

#[async_trait]
impl ComputeProvider for HttpComputeProvider {
    async fn launch_from_template(
        &self,
        template_id: &str,
        market: Market,
        zone: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<WorkerInstance, Error> {
        let url = format!("{}/instances/launch", self.base_url);
        let resp = self
            .authed(self.client.post(&url))
            .json(&LaunchRequest {
                template_id,
                market,
                zone,
                tags,
            })
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::CONFLICT {
            return Err(Error::QuotaExceeded);
        }
        if resp.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(Error::SpotUnavailable { zone: zone.to_string() });
        }
        let launched: LaunchResponse = resp.error_for_status()?.json().await?;
        Ok(WorkerInstance {
            instance_id: launched.instance_id,
            zone: zone.to_string(),
            market,
            launch_time: launched.launch_time,
            join_time: None,
            tags: tags.clone(),
        })
    }

    async fn list_instances(&self, cluster_id: &str) -> Result<Vec<WorkerInstance>, Error> {
        let url = format!("{}/instances", self.base_url);
        let resp: ListInstancesResponse = self
            .authed(self.client.get(&url))
            .query(&[("cluster_id", cluster_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.instances)
    }

    async fn terminate_instances(&self, instance_ids: &[String]) -> Result<(), Error> {
        let url = format!("{}/instances/terminate", self.base_url);
        self.authed(self.client.post(&url))
            .json(&TerminateRequest { instance_ids })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn describe_instance_status(&self, instance_ids: &[String]) -> Result<Vec<InstanceStatus>, Error> {
        let url = format!("{}/instances/status", self.base_url);
        let resp: DescribeResponse = self
            .authed(self.client.post(&url))
            .json(&DescribeRequest { instance_ids })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.statuses)
    }
}
