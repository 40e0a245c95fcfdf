// tests/record_roundtrip.rs
use serde_json::Value;
use trendwire::record::Information;

#[test]
fn roundtrip_preserves_the_field_set() {
    let record = Information::new(
        "arxiv",
        "Attention Is Not Enough",
        "2024-01-02 10:00:00",
        "http://arxiv.org/abs/2401.00001v1",
        "Title: Attention Is Not Enough",
    )
    .with_extra("paper_published", "2024-01-02T10:00:00Z")
    .with_extra("paper_updated", "2024-01-03T10:00:00Z");

    let parsed = Information::decode(&record.encode()).unwrap();
    assert_eq!(parsed.len(), record.fields().len());
    for (key, value) in record.fields() {
        assert_eq!(parsed.get(key), Some(value), "field {key} lost in transit");
    }
}

#[test]
fn non_ascii_payloads_survive_literally() {
    let record = Information::new("tweet", "id-1", "2024-01-01 00:00:00", "", "größé 饕餮 🚀");
    let encoded = record.encode();
    assert!(encoded.contains("größé 饕餮 🚀"));
    let parsed = Information::decode(&encoded).unwrap();
    assert_eq!(
        parsed.get("content").and_then(Value::as_str),
        Some("größé 饕餮 🚀")
    );
}

#[test]
fn type_and_id_are_always_present() {
    let record = Information::new("github-repo", "/acme/widget", "2024-01-01 00:00:00", "", "");
    let parsed = Information::decode(&record.encode()).unwrap();
    assert_eq!(parsed.get("type").and_then(Value::as_str), Some("github-repo"));
    assert_eq!(parsed.get("id").and_then(Value::as_str), Some("/acme/widget"));
}
