use clap::{Parser, Subcommand};
use fleet_common::args::RedisArgs;
use fleet_types::ScalingConfig;

#[derive(Parser, Debug)]
#[command(name = "fleet-autoscaler")]
#[command(about = "Cluster autoscaling control loop")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the resident reconciler daemon on an internal timer.
    Run(ScalingArgs),
    /// Run exactly one reconciliation tick and exit.
    Tick(ScalingArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ScalingArgs {
    /// Identity of the cluster this process scales.
    #[arg(long, env = "CLUSTER_ID")]
    pub cluster_id: String,

    #[arg(long, env = "MIN_WORKERS", default_value_t = 2)]
    pub min_workers: u32,

    #[arg(long, env = "MAX_WORKERS", default_value_t = 10)]
    pub max_workers: u32,

    #[arg(long, env = "TICK_INTERVAL_SECS", default_value_t = 120)]
    pub tick_interval_secs: u64,

    #[arg(long, env = "COOLDOWN_UP_SECS", default_value_t = 300)]
    pub cooldown_up_secs: i64,

    #[arg(long, env = "COOLDOWN_DOWN_SECS", default_value_t = 600)]
    pub cooldown_down_secs: i64,

    #[arg(long, env = "CPU_UP_PCT", default_value_t = 70.0)]
    pub cpu_up_pct: f64,

    #[arg(long, env = "CPU_DOWN_PCT", default_value_t = 30.0)]
    pub cpu_down_pct: f64,

    #[arg(long, env = "MEM_UP_PCT", default_value_t = 75.0)]
    pub mem_up_pct: f64,

    #[arg(long, env = "MEM_DOWN_PCT", default_value_t = 50.0)]
    pub mem_down_pct: f64,

    #[arg(long, env = "SUSTAINED_SAMPLES", default_value_t = 2)]
    pub sustained_samples: usize,

    #[arg(long, env = "HISTORY_SIZE", default_value_t = 10)]
    pub history_size: usize,

    #[arg(long, env = "JOIN_DEADLINE_SECS", default_value_t = 300)]
    pub join_deadline_secs: u64,

    #[arg(long, env = "DRAIN_TIMEOUT_SECS", default_value_t = 300)]
    pub drain_timeout_secs: u64,

    #[arg(long, env = "SPOT_PERCENTAGE", default_value_t = 70.0)]
    pub spot_percentage: f64,

    #[arg(long, env = "ENABLE_PREDICTIVE", default_value_t = false)]
    pub enable_predictive: bool,

    #[arg(long, env = "ENABLE_CUSTOM_METRICS", default_value_t = false)]
    pub enable_custom_metrics: bool,

    #[arg(long, env = "LOCK_TTL_SECS", default_value_t = 330)]
    pub lock_ttl_secs: i64,

    #[arg(long, env = "METRICS_QUERY_DEADLINE_SECS", default_value_t = 10)]
    pub metrics_query_deadline_secs: u64,

    #[arg(long, env = "URGENCY_CPU_PCT", default_value_t = 90.0)]
    pub urgency_cpu_pct: f64,

    #[arg(long, env = "URGENCY_PENDING_PODS", default_value_t = 10)]
    pub urgency_pending_pods: u32,

    /// Base URL of the metrics source's read-only query endpoint.
    #[arg(long, env = "METRICS_SOURCE_URL")]
    pub metrics_source_url: String,

    /// Base URL of the compute provider's control API.
    #[arg(long, env = "COMPUTE_PROVIDER_URL")]
    pub compute_provider_url: String,

    /// Identifier of the launch template new workers are created from.
    #[arg(long, env = "INSTANCE_TEMPLATE_ID")]
    pub instance_template_id: String,

    /// Base URL of the notification sink.
    #[arg(long, env = "NOTIFIER_URL")]
    pub notifier_url: Option<String>,

    /// Base URL of the secret store; when set, the cluster join token and
    /// the compute-provider/metrics-source/notifier auth tokens are fetched
    /// from it at cold start instead of being passed in directly.
    #[arg(long, env = "SECRET_STORE_URL")]
    pub secret_store_url: Option<String>,

    /// Path to a kubeconfig file; falls back to in-cluster config when unset.
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Prometheus exporter port; omit to disable the metrics server.
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[clap(flatten)]
    pub redis: RedisArgs,
}

impl ScalingArgs {
    pub fn to_scaling_config(&self) -> ScalingConfig {
        ScalingConfig {
            cluster_id: self.cluster_id.clone(),
            min_workers: self.min_workers,
            max_workers: self.max_workers,
            tick_interval_secs: self.tick_interval_secs,
            cooldown_up_secs: self.cooldown_up_secs,
            cooldown_down_secs: self.cooldown_down_secs,
            cpu_up_pct: self.cpu_up_pct,
            cpu_down_pct: self.cpu_down_pct,
            mem_up_pct: self.mem_up_pct,
            mem_down_pct: self.mem_down_pct,
            sustained_samples: self.sustained_samples,
            history_size: self.history_size,
            join_deadline_secs: self.join_deadline_secs,
            drain_timeout_secs: self.drain_timeout_secs,
            spot_percentage: self.spot_percentage,
            enable_predictive: self.enable_predictive,
            enable_custom_metrics: self.enable_custom_metrics,
            lock_ttl_secs: self.lock_ttl_secs,
            metrics_query_deadline_secs: self.metrics_query_deadline_secs,
            urgency_cpu_pct: self.urgency_cpu_pct,
            urgency_pending_pods: self.urgency_pending_pods,
        }
    }
}
