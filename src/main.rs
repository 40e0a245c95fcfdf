//! Binary entrypoint. Wires the configured sources, queue backend, gatherer, and consumer under
//! one orchestrator and runs until a termination signal drains the pipeline.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trendwire::config::PipelineConfig;
use trendwire::consumer::{Consumer, DedupConsumer, PrintConsumer};
use trendwire::dedup::{DedupStore, RedisDedupMemory};
use trendwire::gatherer::Gatherer;
use trendwire::orchestrator::Orchestrator;
use trendwire::queue::{MessageQueue, RedisMessageQueue, SimpleMessageQueue};
use trendwire::source::arxiv_feed::ArxivFeedSource;
use trendwire::source::github_trending::GithubTrendingSource;
use trendwire::source::http_receiver::HttpReceiverSource;
use trendwire::source::social_stream::{SocialStreamSource, StreamClient};
use trendwire::source::SourceSink;

/// Log level and sink are configured exactly once, here; components only
/// emit structured events.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trendwire=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Each source and the gatherer gets its own queue handle: the in-process
/// backend is a single shared instance, the redis backend a connection per
/// owner (no transport-connection sharing).
fn make_queue(
    cfg: &PipelineConfig,
    shared: &Arc<SimpleMessageQueue>,
) -> anyhow::Result<Arc<dyn MessageQueue>> {
    Ok(match &cfg.queue.redis_url {
        Some(_) => Arc::new(RedisMessageQueue::new(&cfg.queue)?) as Arc<dyn MessageQueue>,
        None => Arc::clone(shared) as Arc<dyn MessageQueue>,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op elsewhere.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = PipelineConfig::load()?;
    let shared_queue = Arc::new(SimpleMessageQueue::new());

    let dedup: Option<Arc<dyn DedupStore>> = cfg
        .dedup
        .enabled
        .then(|| Arc::new(RedisDedupMemory::new(&cfg.dedup.redis_url)) as Arc<dyn DedupStore>);

    let make_sink = |queue: Arc<dyn MessageQueue>| {
        let sink = SourceSink::new(queue);
        match &dedup {
            Some(store) => sink.with_dedup(Arc::clone(store), cfg.dedup.ttl_secs),
            None => sink,
        }
    };

    let mut orchestrator = Orchestrator::new();

    if cfg.github_trending.enabled {
        let sink = make_sink(make_queue(&cfg, &shared_queue)?);
        orchestrator.add_source(Arc::new(GithubTrendingSource::new(
            sink,
            cfg.github_trending.clone(),
        )));
    }
    if cfg.arxiv.enabled {
        let sink = make_sink(make_queue(&cfg, &shared_queue)?);
        orchestrator.add_source(Arc::new(ArxivFeedSource::new(sink, cfg.arxiv.clone())));
    }
    if cfg.social_stream.enabled {
        let token = std::env::var(&cfg.social_stream.bearer_token_env).map_err(|_| {
            anyhow::anyhow!(
                "social stream enabled but {} is not set",
                cfg.social_stream.bearer_token_env
            )
        })?;
        let sink = make_sink(make_queue(&cfg, &shared_queue)?);
        let client = StreamClient::new(token, &cfg.social_stream);
        orchestrator.add_source(Arc::new(SocialStreamSource::new(
            sink,
            client,
            cfg.social_stream.clone(),
        )));
    }
    if cfg.http_receiver.enabled {
        let sink = Arc::new(make_sink(make_queue(&cfg, &shared_queue)?));
        orchestrator.add_source(Arc::new(HttpReceiverSource::new(
            sink,
            cfg.http_receiver.clone(),
        )));
    }

    let consumer: Box<dyn Consumer> = if cfg.consumer.dedup {
        Box::new(DedupConsumer::new(PrintConsumer::new(cfg.consumer.preview_chars)))
    } else {
        Box::new(PrintConsumer::new(cfg.consumer.preview_chars))
    };
    let gatherer = Gatherer::new(make_queue(&cfg, &shared_queue)?, consumer, &cfg.gatherer)?;
    orchestrator.set_gatherer(gatherer);

    orchestrator.run().await?;
    Ok(())
}
