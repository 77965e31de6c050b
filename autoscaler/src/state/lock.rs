use deadpool_redis::Pool;
use redis::Script;

use crate::util::Error;

const ACQUIRE_LUA: &str = r#"
-- KEYS[1] = lock key
-- ARGV[1] = holder_id
-- ARGV[2] = now (epoch seconds)
-- ARGV[3] = ttl seconds
-- Returns 1 if acquired, 0 if still held by someone else.
local existing = redis.call('HGET', KEYS[1], 'expires_at')
if (not existing) or tonumber(existing) < tonumber(ARGV[2]) then
  redis.call('HSET', KEYS[1], 'holder_id', ARGV[1], 'acquired_at', ARGV[2], 'expires_at', tonumber(ARGV[2]) + tonumber(ARGV[3]))
  return 1
else
  return 0
end
"#;

const RELEASE_LUA: &str = r#"
-- KEYS[1] = lock key
-- ARGV[1] = holder_id
-- Returns 1 if released, 0 if held by someone else (no-op).
local holder = redis.call('HGET', KEYS[1], 'holder_id')
if holder == ARGV[1] then
  redis.call('DEL', KEYS[1])
  return 1
else
  return 0
end
"#;

/// Per-cluster distributed lock backed by a Redis hash, acquired and
/// released through atomic Lua scripts so the compare-and-set discipline
/// holds even with multiple reconciler replicas racing the same key.
pub struct DistributedLock {
    pool: Pool,
    acquire_script: Script,
    release_script: Script,
}

/// An acquired lock, released automatically via `release`. The caller must
/// await this explicitly; Rust's `Drop` cannot run async code, so a lock
/// leaked without calling `release` simply expires at `expires_at`, the
/// documented recovery path.
pub struct LockGuard {
    pub holder_id: String,
    pub expires_at: i64,
}

impl DistributedLock {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            acquire_script: Script::new(ACQUIRE_LUA),
            release_script: Script::new(RELEASE_LUA),
        }
    }

    fn key(cluster_id: &str) -> String {
        format!("cluster:{cluster_id}:lock")
    }

    pub async fn try_acquire(
        &self,
        cluster_id: &str,
        holder_id: &str,
        now: i64,
        ttl_secs: i64,
    ) -> Result<Option<LockGuard>, Error> {
        let mut conn = self.pool.get().await?;
        let acquired: i32 = self
            .acquire_script
            .key(Self::key(cluster_id))
            .arg(holder_id)
            .arg(now)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        if acquired == 1 {
            Ok(Some(LockGuard {
                holder_id: holder_id.to_string(),
                expires_at: now + ttl_secs,
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn release(&self, cluster_id: &str, holder_id: &str) -> Result<bool, Error> {
        let mut conn = self.pool.get().await?;
        let released: i32 = self
            .release_script
            .key(Self::key(cluster_id))
            .arg(holder_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(released == 1)
    }
}
