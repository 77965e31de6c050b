mod custom_metrics;
mod engine;
mod predictive;
mod sustained;

pub use engine::{InProgressEvidence, decide};
