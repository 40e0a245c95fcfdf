// src/config.rs
// Explicit per-component configuration. Every recognized option is a named
// field with a default; components validate at construction instead of
// pulling loose key/value bags out of global state.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::gatherer::ParsePolicy;

const ENV_PATH: &str = "TRENDWIRE_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/trendwire.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// When set, the redis pub/sub backend is used; otherwise the in-process
    /// FIFO queue.
    pub redis_url: Option<String>,
    pub channel: String,
    pub poll_sleep_ms: u64,
    /// Upper bound on one pub/sub `get` call, so shutdown never waits on an
    /// idle channel.
    pub max_wait_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            channel: "trendwire-events".into(),
            poll_sleep_ms: 100,
            max_wait_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GathererConfig {
    pub batch_size: usize,
    pub fetch_interval_secs: u64,
    pub parse_policy: ParsePolicy,
}

impl Default for GathererConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            fetch_interval_secs: 5,
            parse_policy: ParsePolicy::AbortBatch,
        }
    }
}

impl GathererConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::config("gatherer.batch_size must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Filter repeated ids in memory before the processing hook runs.
    pub dedup: bool,
    pub preview_chars: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            dedup: true,
            preview_chars: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub enabled: bool,
    pub redis_url: String,
    pub ttl_secs: Option<u64>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            redis_url: "redis://127.0.0.1/".into(),
            ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubTrendingConfig {
    pub enabled: bool,
    pub check_interval_secs: u64,
    pub readme_truncate_chars: usize,
    pub per_item_delay_secs: u64,
}

impl Default for GithubTrendingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 12 * 3600,
            readme_truncate_chars: 2000,
            per_item_delay_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArxivConfig {
    pub enabled: bool,
    pub authors: Vec<String>,
    pub days_lookback: i64,
    pub max_results: usize,
    pub check_interval_secs: u64,
    pub per_author_delay_secs: u64,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            authors: Vec::new(),
            days_lookback: 90,
            max_results: 2,
            check_interval_secs: 3 * 3600,
            per_author_delay_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SocialStreamConfig {
    pub enabled: bool,
    /// Filter rules registered with the remote stream at startup.
    pub rules: Vec<String>,
    /// Env var holding the bearer token (the token itself never lives in a
    /// config file).
    pub bearer_token_env: String,
    pub stream_url: String,
    pub rules_url: String,
    pub reconnect_delay_secs: u64,
}

impl Default for SocialStreamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rules: Vec::new(),
            bearer_token_env: "STREAM_BEARER_TOKEN".into(),
            stream_url: "https://api.twitter.com/2/tweets/search/stream".into(),
            rules_url: "https://api.twitter.com/2/tweets/search/stream/rules".into(),
            reconnect_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpReceiverConfig {
    pub enabled: bool,
    pub bind_addr: String,
    /// 0 means no cap on normalized content length.
    pub truncate_chars: usize,
}

impl Default for HttpReceiverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "0.0.0.0:6543".into(),
            truncate_chars: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue: QueueConfig,
    pub gatherer: GathererConfig,
    pub consumer: ConsumerConfig,
    pub dedup: DedupConfig,
    pub github_trending: GithubTrendingConfig,
    pub arxiv: ArxivConfig,
    pub social_stream: SocialStreamConfig,
    pub http_receiver: HttpReceiverConfig,
}

impl PipelineConfig {
    /// Load configuration with fallbacks:
    /// 1) $TRENDWIRE_CONFIG_PATH (must exist if set)
    /// 2) config/trendwire.toml
    /// 3) built-in defaults
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(PipelineError::config(format!(
                    "{ENV_PATH} points to non-existent path {}",
                    pb.display()
                )));
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        let cfg = Self::default();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("reading config from {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self =
            toml::from_str(s).map_err(|e| PipelineError::config(format!("parsing config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.gatherer.validate()?;
        if self.arxiv.enabled && self.arxiv.authors.is_empty() {
            return Err(PipelineError::config(
                "arxiv source is enabled but arxiv.authors is empty",
            ));
        }
        if self.social_stream.enabled && self.social_stream.rules.is_empty() {
            return Err(PipelineError::config(
                "social stream source is enabled but social_stream.rules is empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = PipelineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.gatherer.batch_size, 1);
        assert_eq!(cfg.queue.channel, "trendwire-events");
    }

    #[test]
    fn toml_overrides_and_policy_parse() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            [gatherer]
            batch_size = 8
            fetch_interval_secs = 1
            parse_policy = "skip_malformed"

            [queue]
            redis_url = "redis://localhost/"
            channel = "events"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.gatherer.batch_size, 8);
        assert_eq!(cfg.gatherer.parse_policy, ParsePolicy::SkipMalformed);
        assert_eq!(cfg.queue.channel, "events");
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = PipelineConfig::from_toml_str("[gatherer]\nbatch_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn enabled_arxiv_requires_authors() {
        let err = PipelineConfig::from_toml_str("[arxiv]\nenabled = true\n").unwrap_err();
        assert!(err.to_string().contains("authors"));
    }
}
