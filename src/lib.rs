// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod consumer;
pub mod dedup;
pub mod error;
pub mod gatherer;
pub mod orchestrator;
pub mod queue;
pub mod record;
pub mod source;
pub mod util;

// ---- Re-exports for stable public API ----
pub use crate::config::PipelineConfig;
pub use crate::consumer::{Consumer, DedupConsumer, PrintConsumer};
pub use crate::dedup::{DedupStore, RedisDedupMemory};
pub use crate::error::{PipelineError, Result};
pub use crate::gatherer::{Gatherer, ParsePolicy};
pub use crate::orchestrator::Orchestrator;
pub use crate::queue::{MessageQueue, RedisMessageQueue, SimpleMessageQueue};
pub use crate::record::{Information, RecordMap};
pub use crate::source::{EventSource, SourceSink};
