use deadpool_redis::Pool;
use fleet_types::{ClusterState, HistoricalMetric};
use redis::AsyncCommands;

use crate::util::Error;

const HISTORICAL_TTL_SECS: i64 = 30 * 24 * 3600;

/// Durable per-cluster record plus the append-only historical-metric table.
/// Exclusivity is provided by `DistributedLock`, not by this store: a
/// single `SET`/`GET` pair is atomic enough once only the lock holder is
/// writing.
pub struct StateStore {
    pool: Pool,
}

impl StateStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn state_key(cluster_id: &str) -> String {
        format!("cluster:{cluster_id}:state")
    }

    fn history_key(cluster_id: &str) -> String {
        format!("cluster:{cluster_id}:historical")
    }

    fn audit_stream_key(cluster_id: &str) -> String {
        format!("cluster:{cluster_id}:audit")
    }

    pub async fn get_state(&self, cluster_id: &str) -> Result<Option<ClusterState>, Error> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = conn.get(Self::state_key(cluster_id)).await?;
        Ok(match raw {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    pub async fn put_state(&self, state: &ClusterState) -> Result<(), Error> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(state)?;
        let _: () = conn.set(Self::state_key(&state.cluster_id), json).await?;
        Ok(())
    }

    /// Appends to the audit change-feed (Redis stream). Best-effort and
    /// never consulted by the core itself; the audit sink is an external
    /// collaborator that tails this stream.
    pub async fn append_audit_event(&self, cluster_id: &str, state: &ClusterState) -> Result<(), Error> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(state)?;
        let _: () = conn
            .xadd(Self::audit_stream_key(cluster_id), "*", &[("state", json.as_str())])
            .await?;
        Ok(())
    }

    /// Appends a `HistoricalMetric` and evicts entries past their 30-day TTL.
    pub async fn append_historical(&self, metric: &HistoricalMetric) -> Result<(), Error> {
        let mut conn = self.pool.get().await?;
        let key = Self::history_key(&metric.cluster_id);
        let json = serde_json::to_string(metric)?;
        let _: () = conn.zadd(&key, json, metric.timestamp.timestamp()).await?;
        let cutoff = metric.timestamp.timestamp() - HISTORICAL_TTL_SECS;
        let _: () = conn.zrembyscore(&key, "-inf", cutoff).await?;
        Ok(())
    }

    /// Returns the full non-expired historical window for predictive scoring.
    pub async fn query_historical(&self, cluster_id: &str) -> Result<Vec<HistoricalMetric>, Error> {
        let mut conn = self.pool.get().await?;
        let key = Self::history_key(cluster_id);
        let raw: Vec<String> = conn.zrange(&key, 0, -1).await?;
        Ok(raw
            .into_iter()
            .filter_map(|s| serde_json::from_str(&s).ok())
            .collect())
    }
}
