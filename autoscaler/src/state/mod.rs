mod lock;
mod store;

pub use lock::{DistributedLock, LockGuard};
pub use store::StateStore;
