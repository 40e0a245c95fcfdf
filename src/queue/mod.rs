// src/queue/mod.rs
// At-least-once transport between sources and the gatherer.
pub mod redis;

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;

pub use self::redis::RedisMessageQueue;

/// Abstract message transport. Sources `put`, the gatherer `get`s.
///
/// `put` validates and delegates to `enqueue`; implementations only provide
/// the raw transport operations. A transport connection is owned by exactly
/// one producer or one gatherer; instances are never shared across them for
/// the networked backend.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Establish the transport connection/subscription. Safe to call once
    /// before first use; no-op for the in-process backend.
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// Validate and enqueue an encoded record. Returns `false` without
    /// enqueuing when `encoded` is not well-formed JSON; transport failures
    /// still surface as errors.
    async fn put(&self, encoded: &str) -> Result<bool> {
        if serde_json::from_str::<serde_json::Value>(encoded).is_err() {
            tracing::warn!(payload = %encoded.chars().take(120).collect::<String>(),
                "rejecting malformed message at put");
            return Ok(false);
        }
        self.enqueue(encoded).await?;
        Ok(true)
    }

    /// Transport hook behind `put`. Callers go through `put`.
    async fn enqueue(&self, encoded: &str) -> Result<()>;

    /// Collect up to `batch_size` available messages. The in-process backend
    /// returns whatever is immediately available (possibly none); the pub/sub
    /// backend polls, so wall-clock time scales with message arrival rate.
    async fn get(&self, batch_size: usize) -> Result<Vec<String>>;

    /// Best-effort liveness probe. Backends without a peek API report
    /// `false` so the gatherer never stalls on a false-empty signal.
    async fn empty(&self) -> bool;

    /// Release transport resources. Safe to call even if never connected.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// In-process FIFO queue. Unbounded; producers are never blocked, the
/// gatherer's sequential dispatch is the only backpressure.
#[derive(Default)]
pub struct SimpleMessageQueue {
    inner: Mutex<VecDeque<String>>,
}

impl SimpleMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[async_trait]
impl MessageQueue for SimpleMessageQueue {
    async fn enqueue(&self, encoded: &str) -> Result<()> {
        self.inner.lock().await.push_back(encoded.to_string());
        Ok(())
    }

    async fn get(&self, batch_size: usize) -> Result<Vec<String>> {
        let mut q = self.inner.lock().await;
        let take = batch_size.min(q.len());
        Ok(q.drain(..take).collect())
    }

    async fn empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drain_preserves_fifo_order_within_one_producer() {
        let q = SimpleMessageQueue::new();
        for i in 1..=3 {
            assert!(q.put(&format!("{{\"id\":\"{i}\"}}")).await.unwrap());
        }
        let got = q.get(3).await.unwrap();
        assert_eq!(got.len(), 3);
        assert!(got[0].contains("\"1\""));
        assert!(got[2].contains("\"3\""));
        assert!(q.empty().await);
    }

    #[tokio::test]
    async fn get_on_empty_queue_returns_nothing() {
        let q = SimpleMessageQueue::new();
        assert!(q.get(4).await.unwrap().is_empty());
    }
}
