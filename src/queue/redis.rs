// src/queue/redis.rs
// Pub/sub-backed distributed queue.
//
// Wire behavior: publish/subscribe on a named channel. Subscribers connected
// before a `put` receive the message; subscribers connecting after it never
// see it (no replay/persistence). Deliberate simplicity tradeoff.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::QueueConfig;
use crate::error::{PipelineError, Result};
use crate::queue::MessageQueue;

pub struct RedisMessageQueue {
    redis_url: String,
    channel: String,
    poll_sleep: Duration,
    max_wait: Duration,
    // Publish side, lazily established by the first `put`.
    publish_conn: Mutex<Option<redis::aio::MultiplexedConnection>>,
    // Subscribe side, established by `connect` (gatherer only).
    pubsub: Mutex<Option<redis::aio::PubSub>>,
}

impl RedisMessageQueue {
    pub fn new(cfg: &QueueConfig) -> Result<Self> {
        let redis_url = cfg
            .redis_url
            .clone()
            .ok_or_else(|| PipelineError::config("queue.redis_url is required for the redis backend"))?;
        Ok(Self {
            redis_url,
            channel: cfg.channel.clone(),
            poll_sleep: Duration::from_millis(cfg.poll_sleep_ms),
            max_wait: Duration::from_secs(cfg.max_wait_secs),
            publish_conn: Mutex::new(None),
            pubsub: Mutex::new(None),
        })
    }

    async fn publisher(&self) -> Result<redis::aio::MultiplexedConnection> {
        let mut guard = self.publish_conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let client = redis::Client::open(self.redis_url.as_str()).map_err(PipelineError::Transport)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(PipelineError::Transport)?;
        *guard = Some(conn.clone());
        Ok(conn)
    }
}

#[async_trait]
impl MessageQueue for RedisMessageQueue {
    /// Subscribe to the channel. Call once before the first `get`.
    async fn connect(&self) -> Result<()> {
        let mut guard = self.pubsub.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let client = redis::Client::open(self.redis_url.as_str()).map_err(PipelineError::Transport)?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(PipelineError::Transport)?;
        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(PipelineError::Transport)?;
        tracing::info!(channel = %self.channel, "subscribed to redis channel");
        *guard = Some(pubsub);
        Ok(())
    }

    async fn enqueue(&self, encoded: &str) -> Result<()> {
        let mut conn = self.publisher().await?;
        let _receivers: i64 = conn
            .publish(&self.channel, encoded)
            .await
            .map_err(PipelineError::Transport)?;
        Ok(())
    }

    /// Poll for up to `batch_size` messages, sleeping `poll_sleep` between
    /// empty polls, and give up once `max_wait` has elapsed so a shutdown is
    /// never stuck behind an idle channel.
    async fn get(&self, batch_size: usize) -> Result<Vec<String>> {
        let mut guard = self.pubsub.lock().await;
        let pubsub = guard
            .as_mut()
            .ok_or_else(|| PipelineError::config("get called before connect"))?;

        let deadline = Instant::now() + self.max_wait;
        let mut messages = Vec::with_capacity(batch_size);
        while messages.len() < batch_size && Instant::now() < deadline {
            let mut stream = pubsub.on_message();
            // The timeout doubles as the sleep between empty polls.
            match tokio::time::timeout(self.poll_sleep, stream.next()).await {
                Ok(Some(msg)) => {
                    let payload: String = msg.get_payload().map_err(PipelineError::Transport)?;
                    messages.push(payload);
                }
                // Subscription ended under us.
                Ok(None) => break,
                Err(_elapsed) => continue,
            }
        }
        Ok(messages)
    }

    /// Redis pub/sub has no peek API, so this can never truthfully answer;
    /// always report "not empty" and let a zero-length `get` stand in.
    async fn empty(&self) -> bool {
        false
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut pubsub) = self.pubsub.lock().await.take() {
            pubsub
                .unsubscribe(&self.channel)
                .await
                .map_err(PipelineError::Transport)?;
        }
        self.publish_conn.lock().await.take();
        tracing::debug!(channel = %self.channel, "redis queue closed");
        Ok(())
    }
}
