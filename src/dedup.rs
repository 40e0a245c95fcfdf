// src/dedup.rs
// External key-existence store with TTL, consulted by sources before emission.

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::error::{PipelineError, Result};

/// TTL-backed existence store keyed by record id, value is the last-seen
/// unix timestamp.
///
/// The exists-then-write sequence is only weakly atomic: two concurrent
/// producers for the same key can both pass `exists` before either saves.
/// Accepted under the at-least-once design; consumer-level dedup is the
/// backstop.
///
/// All operations fail loudly when the store is unreachable. There is no
/// local fallback cache.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Write `key` unless it already exists with an unexpired value.
    async fn check_and_save(&self, key: &str, ttl_secs: Option<u64>) -> Result<()>;

    /// Write `key` unconditionally, unless a `ttl_secs` is given and the
    /// existing value is younger than it.
    async fn save_or_overwrite(&self, key: &str, ttl_secs: Option<u64>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;
}

/// Redis-backed dedup memory. The connection is established lazily on first
/// use and shared by every caller holding the same instance; redis serializes
/// the commands, no client-side locking beyond the connection cell.
pub struct RedisDedupMemory {
    redis_url: String,
    conn: Mutex<Option<redis::aio::MultiplexedConnection>>,
}

impl RedisDedupMemory {
    pub fn new(redis_url: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            conn: Mutex::new(None),
        }
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let client = redis::Client::open(self.redis_url.as_str()).map_err(PipelineError::DedupStore)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(PipelineError::DedupStore)?;
        tracing::debug!("dedup memory connected");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    fn now_secs() -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

#[async_trait]
impl DedupStore for RedisDedupMemory {
    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        conn.exists(key).await.map_err(PipelineError::DedupStore)
    }

    async fn check_and_save(&self, key: &str, ttl_secs: Option<u64>) -> Result<()> {
        if self.exists(key).await? {
            tracing::debug!(key, "dedup key exists, not renewing");
            return Ok(());
        }
        self.save_or_overwrite(key, ttl_secs).await
    }

    async fn save_or_overwrite(&self, key: &str, ttl_secs: Option<u64>) -> Result<()> {
        let now = Self::now_secs();
        if let Some(ttl) = ttl_secs {
            // Keep the existing value while it has not expired.
            if let Some(existing) = self.get(key).await? {
                let existing_ts = existing.parse::<u64>().unwrap_or(0);
                if existing_ts > now.saturating_sub(ttl) {
                    tracing::debug!(key, "dedup key still fresh, not renewing");
                    return Ok(());
                }
            }
        }
        let mut conn = self.conn().await?;
        let _: () = conn
            .set(key, now.to_string())
            .await
            .map_err(PipelineError::DedupStore)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await.map_err(PipelineError::DedupStore)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        conn.get(key).await.map_err(PipelineError::DedupStore)
    }
}
