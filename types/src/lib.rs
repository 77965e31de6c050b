use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

pub type Epoch = i64;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Up,
    Down,
    Noop,
}

impl Default for ActionKind {
    fn default() -> Self {
        Self::Noop
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Up => write!(f, "up"),
            ActionKind::Down => write!(f, "down"),
            ActionKind::Noop => write!(f, "noop"),
        }
    }
}

impl FromStr for ActionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(ActionKind::Up),
            "down" => Ok(ActionKind::Down),
            "noop" => Ok(ActionKind::Noop),
            _ => Err(()),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Critical,
    Predictive,
    Custom,
}

impl Default for Urgency {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Urgency::Normal => write!(f, "normal"),
            Urgency::Critical => write!(f, "critical"),
            Urgency::Predictive => write!(f, "predictive"),
            Urgency::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Market {
    Spot,
    OnDemand,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Spot => write!(f, "spot"),
            Market::OnDemand => write!(f, "on_demand"),
        }
    }
}

impl FromStr for Market {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spot" => Ok(Market::Spot),
            "on_demand" | "ondemand" => Ok(Market::OnDemand),
            _ => Err(()),
        }
    }
}

/// A single reading of cluster-level signals, taken once per tick.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MetricSample {
    pub captured_at: Epoch,
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub pending_pods: u32,
    pub api_latency_p95_seconds: Option<f64>,
    pub error_rate_ratio: Option<f64>,
    pub queue_depth: Option<u64>,
}

impl MetricSample {
    /// Compresses a sample into the shorter form kept on `ClusterState.metric_history`.
    pub fn to_history_entry(&self) -> MetricHistoryEntry {
        MetricHistoryEntry {
            t: self.captured_at,
            cpu: self.cpu_pct,
            mem: self.mem_pct,
            pending: self.pending_pods,
            latency: self.api_latency_p95_seconds,
            error_rate: self.error_rate_ratio,
            queue_depth: self.queue_depth,
        }
    }
}

/// Compact form of a `MetricSample` kept inline on `ClusterState`, matching
/// the wire layout documented for the state store record. The optional
/// custom-metric fields mirror `MetricSample`'s so sustained confirmation
/// can be evaluated over history, not just the latest sample.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct MetricHistoryEntry {
    pub t: Epoch,
    pub cpu: f64,
    pub mem: f64,
    pub pending: u32,
    pub latency: Option<f64>,
    pub error_rate: Option<f64>,
    pub queue_depth: Option<u64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default)]
pub struct LastAction {
    pub kind: ActionKind,
    pub at: Epoch,
    pub reason: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Lock {
    pub holder_id: String,
    pub acquired_at: Epoch,
    pub expires_at: Epoch,
}

/// Durable, conditionally-updatable record held in the state store, keyed by
/// `cluster_id`. Mutated only while `lock` is held by the caller.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ClusterState {
    pub cluster_id: String,
    pub desired_worker_count: u32,
    pub last_action: LastAction,
    pub cooldown_up_until: Epoch,
    pub cooldown_down_until: Epoch,
    pub lock: Option<Lock>,
    pub metric_history: Vec<MetricHistoryEntry>,
}

impl ClusterState {
    pub fn new(cluster_id: impl Into<String>, initial_count: u32) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            desired_worker_count: initial_count,
            last_action: LastAction::default(),
            cooldown_up_until: 0,
            cooldown_down_until: 0,
            lock: None,
            metric_history: Vec::new(),
        }
    }

    /// Appends a sample to history, trimming to the configured bound.
    pub fn push_history(&mut self, entry: MetricHistoryEntry, bound: usize) {
        self.metric_history.push(entry);
        if self.metric_history.len() > bound {
            let overflow = self.metric_history.len() - bound;
            self.metric_history.drain(0..overflow);
        }
    }
}

/// Long-lived record in the historical-metric table, used by the predictive
/// evaluator. Expires automatically via `ttl`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct HistoricalMetric {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub cluster_id: String,
    pub hour_of_day: u8,
    pub day_of_week: u8,
    pub cpu_pct: f64,
    pub pending_pods: u32,
    pub ttl: Epoch,
}

/// Value object returned by the Decision Engine; lives for one tick.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ScalingIntent {
    pub action: ActionKind,
    pub magnitude: u32,
    pub urgency: Urgency,
    pub reason: &'static str,
}

impl ScalingIntent {
    pub fn noop(reason: &'static str) -> Self {
        Self {
            action: ActionKind::Noop,
            magnitude: 0,
            urgency: Urgency::Normal,
            reason,
        }
    }

    pub fn up(magnitude: u32, urgency: Urgency, reason: &'static str) -> Self {
        Self {
            action: ActionKind::Up,
            magnitude,
            urgency,
            reason,
        }
    }

    pub fn down(magnitude: u32, reason: &'static str) -> Self {
        Self {
            action: ActionKind::Down,
            magnitude,
            urgency: Urgency::Normal,
            reason,
        }
    }
}

/// A single cloud instance backing a cluster worker node.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct WorkerInstance {
    pub instance_id: String,
    pub zone: String,
    pub market: Market,
    pub launch_time: Epoch,
    pub join_time: Option<Epoch>,
    pub tags: BTreeMap<String, String>,
}

impl WorkerInstance {
    pub fn is_joined(&self) -> bool {
        self.join_time.is_some()
    }
}

/// Structured event emitted to the notification sink for every non-noop
/// outcome (and for a handful of noop outcomes that still warrant an alert,
/// such as `AT_CAPACITY`).
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ScalingNotification {
    pub schema_version: u32,
    pub kind: ActionKind,
    pub magnitude: u32,
    pub reason: String,
    pub before_count: u32,
    pub after_count: u32,
    pub zone_breakdown: BTreeMap<String, u32>,
    pub market_breakdown: BTreeMap<String, u32>,
    pub duration_ms: u64,
}

pub const NOTIFICATION_SCHEMA_VERSION: u32 = 1;

impl ScalingNotification {
    pub fn new(
        kind: ActionKind,
        magnitude: u32,
        reason: impl Into<String>,
        before_count: u32,
        after_count: u32,
        zone_breakdown: BTreeMap<String, u32>,
        market_breakdown: BTreeMap<String, u32>,
        duration_ms: u64,
    ) -> Self {
        Self {
            schema_version: NOTIFICATION_SCHEMA_VERSION,
            kind,
            magnitude,
            reason: reason.into(),
            before_count,
            after_count,
            zone_breakdown,
            market_breakdown,
            duration_ms,
        }
    }
}

/// The immutable configuration surface, built once via `clap` and
/// passed by value into every component. Never read from inside the
/// Decision Engine directly, always as this already-parsed snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalingConfig {
    pub cluster_id: String,
    pub min_workers: u32,
    pub max_workers: u32,
    pub tick_interval_secs: u64,
    pub cooldown_up_secs: i64,
    pub cooldown_down_secs: i64,
    pub cpu_up_pct: f64,
    pub cpu_down_pct: f64,
    pub mem_up_pct: f64,
    pub mem_down_pct: f64,
    pub sustained_samples: usize,
    pub history_size: usize,
    pub join_deadline_secs: u64,
    pub drain_timeout_secs: u64,
    pub spot_percentage: f64,
    pub enable_predictive: bool,
    pub enable_custom_metrics: bool,
    pub lock_ttl_secs: i64,
    pub metrics_query_deadline_secs: u64,
    pub urgency_cpu_pct: f64,
    pub urgency_pending_pods: u32,
}
