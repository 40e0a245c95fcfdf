// src/consumer/mod.rs
// Downstream boundary: the gatherer hands each parsed batch to exactly one
// consumer and waits for it to finish before fetching again.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::record::RecordMap;

/// Receives one parsed batch at a time. Whatever happens inside (LLM
/// summarization, media extraction, persistence) is out of scope for the
/// core; the contract is only that `process` is awaited to completion before
/// the gatherer advances.
#[async_trait]
pub trait Consumer: Send {
    async fn process(&mut self, batch: Vec<RecordMap>) -> Result<()>;
}

/// Filters a batch against an in-memory id set before forwarding to the
/// wrapped consumer.
///
/// The set only ever grows (process-lifetime cache, no eviction). Known
/// unbounded-growth tradeoff: the corpus of in-flight ids is expected to be
/// small relative to process lifetime.
pub struct DedupConsumer<C> {
    inner: C,
    seen: HashSet<String>,
}

impl<C: Consumer> DedupConsumer<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            seen: HashSet::new(),
        }
    }
}

#[async_trait]
impl<C: Consumer> Consumer for DedupConsumer<C> {
    async fn process(&mut self, batch: Vec<RecordMap>) -> Result<()> {
        let before = batch.len();
        let seen = &mut self.seen;
        let fresh: Vec<RecordMap> = batch
            .into_iter()
            .filter(|record| match record.get("id").and_then(Value::as_str) {
                Some(id) => seen.insert(id.to_string()),
                // Records without an id cannot be deduped; pass them through.
                None => true,
            })
            .collect();
        if before > fresh.len() {
            tracing::info!(deduped = before - fresh.len(), "consumer dropped repeated ids");
        }
        self.inner.process(fresh).await
    }
}

/// Reference consumer: logs every record it receives. Useful as a smoke
/// sink while wiring up sources.
#[derive(Default)]
pub struct PrintConsumer {
    preview_chars: usize,
}

impl PrintConsumer {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }
}

#[async_trait]
impl Consumer for PrintConsumer {
    async fn process(&mut self, batch: Vec<RecordMap>) -> Result<()> {
        tracing::info!(batch = batch.len(), "processing batch");
        for record in &batch {
            let kind = record.get("type").and_then(Value::as_str).unwrap_or("?");
            let id = record.get("id").and_then(Value::as_str).unwrap_or("?");
            let content = record.get("content").and_then(Value::as_str).unwrap_or("");
            let preview: String = if self.preview_chars > 0 {
                content.chars().take(self.preview_chars).collect()
            } else {
                content.to_string()
            };
            tracing::info!(%kind, %id, %preview, "record");
        }
        Ok(())
    }
}
