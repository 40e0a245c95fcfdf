// src/source/mod.rs
// Producers: normalize external events into Information records and push
// them into the sink queue.

pub mod arxiv_feed;
pub mod github_trending;
pub mod http_receiver;
pub mod social_stream;

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tokio_util::sync::CancellationToken;

use crate::dedup::DedupStore;
use crate::error::Result;
use crate::queue::MessageQueue;
use crate::record::Information;

/// A runnable producer. `run` loops until the token is cancelled and never
/// returns normally before that; `cleanup` releases any external
/// registrations and must be safe to call even if `run` never started.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()>;

    async fn cleanup(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The write side every source holds: a sink queue plus an optional dedup
/// memory. Owns the check-before-put / save-after-put ordering so the
/// variants don't repeat it.
pub struct SourceSink {
    sink: Arc<dyn MessageQueue>,
    dedup: Option<Arc<dyn DedupStore>>,
    dedup_ttl_secs: Option<u64>,
}

impl SourceSink {
    pub fn new(sink: Arc<dyn MessageQueue>) -> Self {
        crate::gatherer::ensure_metrics_described();
        Self {
            sink,
            dedup: None,
            dedup_ttl_secs: None,
        }
    }

    pub fn with_dedup(mut self, dedup: Arc<dyn DedupStore>, ttl_secs: Option<u64>) -> Self {
        self.dedup = Some(dedup);
        self.dedup_ttl_secs = ttl_secs;
        self
    }

    /// Send one record to the sink.
    ///
    /// With a dedup memory attached: a known id is dropped before the queue
    /// ever sees it; after a successful put the id is saved best-effort (a
    /// failed save only risks a future duplicate, so it is logged, not
    /// propagated). The existence check itself fails loudly.
    ///
    /// Two concurrent producers of the same id can both pass the existence
    /// check before either saves; downstream consumer dedup is the backstop.
    pub async fn send(&self, record: &Information) -> Result<bool> {
        let id = record.id();
        if let Some(dedup) = &self.dedup {
            if dedup.exists(id).await? {
                tracing::info!(id, kind = record.kind(), "duplicate record dropped");
                counter!("source_dedup_dropped_total").increment(1);
                return Ok(false);
            }
        }

        let accepted = self.sink.put(&record.encode()).await?;
        if accepted {
            counter!("source_records_enqueued_total").increment(1);
            if let Some(dedup) = &self.dedup {
                if let Err(e) = dedup.check_and_save(id, self.dedup_ttl_secs).await {
                    tracing::warn!(error = ?e, id, "dedup save failed, future duplicate possible");
                }
            }
        }
        Ok(accepted)
    }
}
