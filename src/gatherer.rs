// src/gatherer.rs
// The central scheduling construct: pull batches off the queue on a timer,
// parse, and dispatch to the consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::config::GathererConfig;
use crate::consumer::Consumer;
use crate::error::Result;
use crate::queue::MessageQueue;
use crate::record::{Information, RecordMap};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_batches_total", "Batches dispatched to the consumer.");
        describe_counter!("pipeline_records_total", "Records dispatched to the consumer.");
        describe_counter!(
            "pipeline_parse_errors_total",
            "Malformed entries hit while parsing a batch."
        );
        describe_counter!(
            "source_records_enqueued_total",
            "Records accepted by a sink queue."
        );
        describe_counter!(
            "source_dedup_dropped_total",
            "Records dropped by the dedup memory before enqueue."
        );
    });
}

/// What to do when a batch contains an entry that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePolicy {
    /// Drop the whole batch with an error log. Reference behavior.
    AbortBatch,
    /// Drop only the offending entries and keep the rest.
    SkipMalformed,
}

pub struct Gatherer {
    queue: Arc<dyn MessageQueue>,
    consumer: Box<dyn Consumer>,
    batch_size: usize,
    fetch_interval: Duration,
    parse_policy: ParsePolicy,
    running: Arc<AtomicBool>,
}

impl Gatherer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        consumer: Box<dyn Consumer>,
        cfg: &GathererConfig,
    ) -> Result<Self> {
        cfg.validate()?;
        ensure_metrics_described();
        Ok(Self {
            queue,
            consumer,
            batch_size: cfg.batch_size,
            fetch_interval: Duration::from_secs(cfg.fetch_interval_secs),
            parse_policy: cfg.parse_policy,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Cooperative cancellation flag. Flip to `false` to stop the loop at
    /// its next check; the in-flight `process` call always completes first.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Fetch-and-dispatch loop. Exits only when the running flag is cleared.
    ///
    /// A zero-length `get` result is treated the same as an empty queue
    /// (sleep and retry): the queue can drain between the `empty` probe and
    /// the `get`, and the pub/sub backend can time out with nothing.
    pub async fn run(&mut self) -> Result<()> {
        self.queue.connect().await?;
        tracing::info!(
            batch_size = self.batch_size,
            fetch_interval_secs = self.fetch_interval.as_secs(),
            "gatherer started"
        );

        while self.running.load(Ordering::SeqCst) {
            while self.queue.empty().await {
                tracing::debug!(
                    wait_secs = self.fetch_interval.as_secs(),
                    "no messages, waiting"
                );
                tokio::time::sleep(self.fetch_interval).await;
                if !self.running.load(Ordering::SeqCst) {
                    tracing::info!("gatherer stopping");
                    return Ok(());
                }
            }

            let batch = self.queue.get(self.batch_size).await?;
            if batch.is_empty() {
                tokio::time::sleep(self.fetch_interval).await;
                continue;
            }

            let parsed = self.parse_batch(&batch);
            if parsed.is_empty() {
                continue;
            }
            tracing::info!(gathered = parsed.len(), "dispatching batch");
            counter!("pipeline_batches_total").increment(1);
            counter!("pipeline_records_total").increment(parsed.len() as u64);

            // Awaited in full before the next fetch. This is the system's
            // sole backpressure: a slow consumer throttles this gatherer,
            // producers keep enqueuing.
            if let Err(e) = self.consumer.process(parsed).await {
                tracing::error!(error = ?e, "consumer failed to process batch");
            }
        }

        tracing::info!("gatherer stopping");
        Ok(())
    }

    fn parse_batch(&self, batch: &[String]) -> Vec<RecordMap> {
        let mut parsed = Vec::with_capacity(batch.len());
        for encoded in batch {
            match Information::decode(encoded) {
                Ok(record) => parsed.push(record),
                Err(e) => {
                    counter!("pipeline_parse_errors_total").increment(1);
                    match self.parse_policy {
                        ParsePolicy::AbortBatch => {
                            tracing::error!(error = %e, dropped = batch.len(),
                                "malformed entry, aborting whole batch");
                            return Vec::new();
                        }
                        ParsePolicy::SkipMalformed => {
                            tracing::warn!(error = %e, "malformed entry skipped");
                        }
                    }
                }
            }
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GathererConfig;
    use crate::queue::SimpleMessageQueue;
    use async_trait::async_trait;

    struct Discard;

    #[async_trait]
    impl Consumer for Discard {
        async fn process(&mut self, _batch: Vec<RecordMap>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn gatherer_with_policy(policy: ParsePolicy) -> Gatherer {
        let cfg = GathererConfig {
            batch_size: 4,
            fetch_interval_secs: 0,
            parse_policy: policy,
        };
        Gatherer::new(Arc::new(SimpleMessageQueue::new()), Box::new(Discard), &cfg).unwrap()
    }

    #[tokio::test]
    async fn abort_policy_drops_whole_batch() {
        let g = gatherer_with_policy(ParsePolicy::AbortBatch);
        let batch = vec![
            r#"{"type":"x","id":"1"}"#.to_string(),
            "garbage".to_string(),
            r#"{"type":"x","id":"2"}"#.to_string(),
        ];
        assert!(g.parse_batch(&batch).is_empty());
    }

    #[tokio::test]
    async fn skip_policy_keeps_well_formed_entries() {
        let g = gatherer_with_policy(ParsePolicy::SkipMalformed);
        let batch = vec![
            r#"{"type":"x","id":"1"}"#.to_string(),
            "garbage".to_string(),
            r#"{"type":"x","id":"2"}"#.to_string(),
        ];
        let parsed = g.parse_batch(&batch);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].get("id").unwrap(), "2");
    }

    #[tokio::test]
    async fn invalid_batch_size_is_rejected_at_construction() {
        let cfg = GathererConfig {
            batch_size: 0,
            ..Default::default()
        };
        let res = Gatherer::new(Arc::new(SimpleMessageQueue::new()), Box::new(Discard), &cfg);
        assert!(res.is_err());
    }
}
