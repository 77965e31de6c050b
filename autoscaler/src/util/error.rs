#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("lock is held by another reconciler")]
    LockContended,

    #[error("metrics unavailable: fresh and cached samples both missing")]
    MetricsUnavailable,

    #[error("provider refused launch: quota exceeded")]
    QuotaExceeded,

    #[error("no spot capacity available in zone {zone}")]
    SpotUnavailable { zone: String },

    #[error("instance {instance_id} did not become ready before the join deadline")]
    JoinTimeout { instance_id: String },

    #[error("pods on {node} did not evict before the drain deadline")]
    DrainTimeout { node: String },

    #[error("conditional state write was rejected; lock presumed lost")]
    StateConflict,

    #[error("transient transport error: {source}")]
    TransportError {
        #[from]
        source: reqwest::Error,
    },

    #[error("kubernetes API error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("redis error: {source}")]
    Redis {
        #[from]
        source: redis::RedisError,
    },

    #[error("redis pool error: {source}")]
    RedisPool {
        #[from]
        source: deadpool_redis::PoolError,
    },

    #[error("json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Stable machine-readable code, attached to notifications and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Error::LockContended => "LOCK_CONTENDED",
            Error::MetricsUnavailable => "METRICS_UNAVAILABLE",
            Error::QuotaExceeded => "QUOTA_EXCEEDED",
            Error::SpotUnavailable { .. } => "SPOT_UNAVAILABLE",
            Error::JoinTimeout { .. } => "JOIN_TIMEOUT",
            Error::DrainTimeout { .. } => "DRAIN_TIMEOUT",
            Error::StateConflict => "STATE_CONFLICT",
            Error::TransportError { .. } => "TRANSPORT_ERROR",
            Error::Kube { .. } => "TRANSPORT_ERROR",
            Error::Redis { .. } => "TRANSPORT_ERROR",
            Error::RedisPool { .. } => "TRANSPORT_ERROR",
            Error::Json { .. } => "TRANSPORT_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
        }
    }
}
