// tests/queue_fifo.rs
use trendwire::queue::{MessageQueue, SimpleMessageQueue};

#[tokio::test]
async fn put_rejects_malformed_input_without_enqueuing() {
    let q = SimpleMessageQueue::new();
    assert!(!q.put("not json").await.unwrap());
    assert_eq!(q.len().await, 0);

    assert!(q.put(r#"{"a":1}"#).await.unwrap());
    assert_eq!(q.len().await, 1);
}

#[tokio::test]
async fn get_never_returns_more_than_batch_size() {
    let q = SimpleMessageQueue::new();
    for i in 0..5 {
        q.put(&format!(r#"{{"id":"{i}"}}"#)).await.unwrap();
    }
    assert_eq!(q.get(3).await.unwrap().len(), 3);
    assert_eq!(q.get(3).await.unwrap().len(), 2);
    assert!(q.get(3).await.unwrap().is_empty());
}

#[tokio::test]
async fn single_producer_messages_come_back_in_order() {
    let q = SimpleMessageQueue::new();
    let m1 = r#"{"id":"m1"}"#;
    let m2 = r#"{"id":"m2"}"#;
    let m3 = r#"{"id":"m3"}"#;
    for m in [m1, m2, m3] {
        q.put(m).await.unwrap();
    }
    assert_eq!(q.get(3).await.unwrap(), vec![m1, m2, m3]);
}

#[tokio::test]
async fn connect_and_close_are_noops_for_the_in_process_backend() {
    let q = SimpleMessageQueue::new();
    q.connect().await.unwrap();
    q.put(r#"{"id":"x"}"#).await.unwrap();
    q.close().await.unwrap();
    assert_eq!(q.len().await, 1);
}
