use std::time::{Duration, Instant};

use fleet_types::{MetricHistoryEntry, MetricSample};
use tokio::sync::Mutex;

use crate::util::Error;

const STALENESS_BOUND: Duration = Duration::from_secs(5 * 60);
const MAX_ATTEMPTS: u32 = 2;

/// Translates the metrics source's named-query HTTP endpoint into a
/// `MetricSample`, shielding the Decision Engine from transport faults.
/// The last-good sample is an explicit field on the adapter value, never
/// module-level state, and is per-process, not shared across reconciler
/// replicas.
pub struct MetricsSourceAdapter {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    last_good: Mutex<Option<(Instant, MetricSample)>>,
}

impl MetricsSourceAdapter {
    pub fn new(base_url: String, auth_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            auth_token,
            last_good: Mutex::new(None),
        }
    }

    async fn query_once(&self, name: &str) -> Result<f64, reqwest::Error> {
        let url = format!("{}/query", self.base_url);
        let mut req = self.client.get(&url).query(&[("name", name)]);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?.error_for_status()?;
        resp.json::<QueryResponse>().await.map(|r| r.value)
    }

    async fn query_with_retry(&self, name: &str) -> Option<f64> {
        for attempt in 0..MAX_ATTEMPTS {
            match self.query_once(name).await {
                Ok(value) => return Some(value),
                Err(e) => {
                    tracing::warn!(query = name, attempt, error = %e, "metrics query failed");
                }
            }
        }
        None
    }

    /// Fetches a fresh sample within `deadline`, falling back to the last
    /// cached sample when the source fails and the cache is still within
    /// the staleness bound. Fails with `MetricsUnavailable` only when both
    /// are missing. The three required queries run under their own timeout,
    /// independent of the three optional custom-metric queries (skipped
    /// entirely when `enable_custom_metrics` is off), so a hang on an
    /// unused optional query can never discard already-fetched required data.
    pub async fn sample(&self, deadline: Duration, now_epoch: i64, enable_custom_metrics: bool) -> Result<MetricSample, Error> {
        let required = async {
            let cpu = self.query_with_retry("cpu_utilization_pct").await;
            let mem = self.query_with_retry("memory_utilization_pct").await;
            let pending = self.query_with_retry("pending_pods_count").await;
            (cpu, mem, pending)
        };
        let optional = async {
            if !enable_custom_metrics {
                return (None, None, None);
            }
            let latency = self.query_with_retry("api_latency_p95_seconds").await;
            let error_rate = self.query_with_retry("error_rate_ratio").await;
            let queue_depth = self.query_with_retry("queue_depth").await;
            (latency, error_rate, queue_depth)
        };

        let (required_result, optional_result) =
            tokio::join!(tokio::time::timeout(deadline, required), tokio::time::timeout(deadline, optional));

        let Ok((Some(cpu), Some(mem), Some(pending))) = required_result else {
            let cached = self.last_good.lock().await;
            return match cached.as_ref() {
                Some((fetched_at, sample)) if fetched_at.elapsed() <= STALENESS_BOUND => Ok(sample.clone()),
                _ => Err(Error::MetricsUnavailable),
            };
        };
        let (latency, error_rate, queue_depth) = optional_result.unwrap_or((None, None, None));

        let sample = MetricSample {
            captured_at: now_epoch,
            cpu_pct: cpu,
            mem_pct: mem,
            pending_pods: pending as u32,
            api_latency_p95_seconds: latency,
            error_rate_ratio: error_rate,
            queue_depth: queue_depth.map(|v| v as u64),
        };
        *self.last_good.lock().await = Some((Instant::now(), sample.clone()));
        Ok(sample)
    }

    /// Seeds the cache from the state store's most recent history entry so
    /// a freshly started process has something to fall back on.
    pub async fn seed_cache(&self, entry: &MetricHistoryEntry) {
        let sample = MetricSample {
            captured_at: entry.t,
            cpu_pct: entry.cpu,
            mem_pct: entry.mem,
            pending_pods: entry.pending,
            api_latency_p95_seconds: None,
            error_rate_ratio: None,
            queue_depth: None,
        };
        *self.last_good.lock().await = Some((Instant::now(), sample));
    }
}

#[derive(serde::Deserialize)]
struct QueryResponse {
    value: f64,
}
