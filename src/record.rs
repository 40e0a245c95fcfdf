// src/record.rs
// The canonical record every source emits and the gatherer hands downstream.

use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

/// Parsed form of an encoded record, as handed to consumers.
/// serde_json is built with `preserve_order`, so extra fields keep the
/// insertion order the producing source wrote them in.
pub type RecordMap = Map<String, Value>;

/// The canonical unit of data moving through the pipeline.
///
/// `kind` (serialized as `"type"`) and `id` are always present; uniqueness of
/// `id` is per-kind, defined by the producing source. A record is never
/// mutated after construction; enrichment happens downstream on a new
/// mapping, not in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Information {
    data: RecordMap,
}

impl Information {
    pub fn new(
        kind: impl Into<String>,
        id: impl Into<String>,
        datetime: impl Into<String>,
        uri: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut data = RecordMap::new();
        data.insert("type".into(), Value::String(kind.into()));
        data.insert("id".into(), Value::String(id.into()));
        data.insert("datetime".into(), Value::String(datetime.into()));
        data.insert("uri".into(), Value::String(uri.into()));
        data.insert("content".into(), Value::String(content.into()));
        Self { data }
    }

    /// Attach an additional string-keyed field (builder style).
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        self.data
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.data
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn fields(&self) -> &RecordMap {
        &self.data
    }

    /// Serialize to the transport encoding: a flat JSON object in raw UTF-8
    /// (serde_json does not escape non-ASCII).
    pub fn encode(&self) -> String {
        // A Map of valid Values cannot fail to serialize.
        serde_json::to_string(&self.data).unwrap_or_default()
    }

    /// Parse an encoded record back into a field mapping.
    pub fn decode(encoded: &str) -> Result<RecordMap> {
        serde_json::from_str::<RecordMap>(encoded)
            .map_err(|e| PipelineError::validation(format!("{e} in {encoded:.120}")))
    }
}
