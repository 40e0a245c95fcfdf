// src/error.rs
use thiserror::Error;

/// Errors raised by the pipeline core.
///
/// The split mirrors how the components recover: validation failures are
/// handled locally (a `put` returns `false`, a batch parse aborts or skips),
/// transport failures surface to the gatherer for retry/backoff, enrichment
/// failures degrade to empty fields inside a source, and dedup-store failures
/// always propagate since swallowing them risks unbounded duplicate
/// processing.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("malformed record: {0}")]
    Validation(String),

    #[error("queue transport error: {0}")]
    Transport(#[source] redis::RedisError),

    #[error("enrichment fetch failed: {0}")]
    Enrichment(String),

    #[error("dedup store error: {0}")]
    DedupStore(#[source] redis::RedisError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PipelineError::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Config(msg.into())
    }

    pub fn enrichment(msg: impl Into<String>) -> Self {
        PipelineError::Enrichment(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let e = PipelineError::validation("not json");
        assert_eq!(e.to_string(), "malformed record: not json");
        let e = PipelineError::config("batch_size must be >= 1");
        assert!(e.to_string().contains("batch_size"));
    }
}
