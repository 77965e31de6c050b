pub mod cluster_registry;
pub mod compute_provider;
pub mod notifier;
pub mod secret_store;

pub use cluster_registry::{ClusterRegistry, DrainSignal};
pub use compute_provider::{ComputeProvider, HttpComputeProvider, InstanceStatus};
pub use notifier::Notifier;
pub use secret_store::SecretStore;
