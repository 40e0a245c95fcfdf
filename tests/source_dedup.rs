// tests/source_dedup.rs
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use trendwire::dedup::DedupStore;
use trendwire::error::Result;
use trendwire::queue::{MessageQueue, SimpleMessageQueue};
use trendwire::record::Information;
use trendwire::source::SourceSink;

/// In-memory stand-in for the redis-backed dedup memory.
#[derive(Default)]
struct FakeDedup {
    keys: Mutex<HashSet<String>>,
}

#[async_trait]
impl DedupStore for FakeDedup {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.keys.lock().await.contains(key))
    }

    async fn check_and_save(&self, key: &str, _ttl_secs: Option<u64>) -> Result<()> {
        self.keys.lock().await.insert(key.to_string());
        Ok(())
    }

    async fn save_or_overwrite(&self, key: &str, _ttl_secs: Option<u64>) -> Result<()> {
        self.keys.lock().await.insert(key.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.keys.lock().await.remove(key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .keys
            .lock()
            .await
            .contains(key)
            .then(|| "0".to_string()))
    }
}

fn record(id: &str) -> Information {
    Information::new("x", id, "2024-01-01 00:00:00", "", "payload")
}

#[tokio::test]
async fn same_id_twice_results_in_exactly_one_put() {
    let queue = Arc::new(SimpleMessageQueue::new());
    let sink = SourceSink::new(Arc::clone(&queue) as Arc<dyn MessageQueue>)
        .with_dedup(Arc::new(FakeDedup::default()), None);

    assert!(sink.send(&record("1")).await.unwrap());
    assert!(!sink.send(&record("1")).await.unwrap());
    assert_eq!(queue.len().await, 1);
}

#[tokio::test]
async fn distinct_ids_all_pass() {
    let queue = Arc::new(SimpleMessageQueue::new());
    let sink = SourceSink::new(Arc::clone(&queue) as Arc<dyn MessageQueue>)
        .with_dedup(Arc::new(FakeDedup::default()), None);

    for id in ["a", "b", "c"] {
        assert!(sink.send(&record(id)).await.unwrap());
    }
    assert_eq!(queue.len().await, 3);
}

#[tokio::test]
async fn without_dedup_memory_duplicates_are_enqueued() {
    let queue = Arc::new(SimpleMessageQueue::new());
    let sink = SourceSink::new(Arc::clone(&queue) as Arc<dyn MessageQueue>);

    assert!(sink.send(&record("1")).await.unwrap());
    assert!(sink.send(&record("1")).await.unwrap());
    assert_eq!(queue.len().await, 2);
}
