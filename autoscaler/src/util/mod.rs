use std::time::Duration;

pub mod colors;
mod error;

pub use error::Error;

/// Default tick cadence; the actual value always comes from `Config`, this
/// only backs the `--tick-interval` default.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(120);

pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
