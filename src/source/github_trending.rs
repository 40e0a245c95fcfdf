// src/source/github_trending.rs
// Periodic scrape of the GitHub trending page, enriched with each repo's
// README.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::GithubTrendingConfig;
use crate::error::PipelineError;
use crate::record::Information;
use crate::source::{EventSource, SourceSink};
use crate::util::{normalize_text, now_datetime, truncate_chars};

const TRENDING_URL: &str = "https://github.com/trending?since=daily";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrendingRepo {
    pub name: String,
    pub url: String,
    pub desc: String,
    pub lang: String,
    pub stars: String,
    pub forks: String,
}

pub struct GithubTrendingSource {
    sink: SourceSink,
    http: reqwest::Client,
    cfg: GithubTrendingConfig,
}

impl GithubTrendingSource {
    pub fn new(sink: SourceSink, cfg: GithubTrendingConfig) -> Self {
        Self {
            sink,
            http: reqwest::Client::new(),
            cfg,
        }
    }

    async fn poll_once(&self, cancel: &CancellationToken) -> anyhow::Result<usize> {
        let body = self
            .http
            .get(TRENDING_URL)
            .header("User-Agent", "trendwire")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let repos = extract_trending_repos(&body);
        tracing::info!(repos = repos.len(), "trending page scraped");

        let mut sent = 0usize;
        for repo in repos {
            if cancel.is_cancelled() {
                break;
            }
            // Enrichment failure degrades to an empty readme, never blocks
            // the loop.
            let readme = match self.fetch_readme(&repo.name).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = ?e, repo = %repo.name, "readme fetch failed");
                    String::new()
                }
            };

            let record = Information::new("github-repo", &repo.name, now_datetime(), &repo.url, readme)
                .with_extra("repo_desc", repo.desc.as_str())
                .with_extra("repo_lang", repo.lang.as_str())
                .with_extra("repo_star", repo.stars.as_str())
                .with_extra("repo_fork", repo.forks.as_str());

            match self.sink.send(&record).await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(error = ?e, repo = %repo.name, "failed to enqueue repo"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(self.cfg.per_item_delay_secs)) => {}
            }
        }
        Ok(sent)
    }

    /// README lives on either master or main; try both before giving up.
    async fn fetch_readme(&self, repo_name: &str) -> crate::error::Result<String> {
        let mut last_status = None;
        for branch in ["master", "main"] {
            let url = format!("https://raw.githubusercontent.com{repo_name}/{branch}/README.md");
            let resp = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| PipelineError::enrichment(format!("readme fetch: {e}")))?;
            if resp.status().is_success() {
                let text = resp
                    .text()
                    .await
                    .map_err(|e| PipelineError::enrichment(format!("readme body: {e}")))?;
                return Ok(truncate_chars(&text, self.cfg.readme_truncate_chars));
            }
            last_status = Some(resp.status());
        }
        Err(PipelineError::enrichment(format!(
            "no readme found for {repo_name} (last status: {last_status:?})"
        )))
    }
}

#[async_trait]
impl EventSource for GithubTrendingSource {
    fn name(&self) -> &'static str {
        "github-trending"
    }

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        loop {
            if cancel.is_cancelled() {
                tracing::info!(source = self.name(), "stopped");
                return Ok(());
            }
            match self.poll_once(&cancel).await {
                Ok(sent) => tracing::info!(
                    sent,
                    next_check_secs = self.cfg.check_interval_secs,
                    "trending cycle finished"
                ),
                Err(e) => tracing::warn!(error = ?e, "trending cycle failed"),
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(source = self.name(), "stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(Duration::from_secs(self.cfg.check_interval_secs)) => {}
            }
        }
    }
}

/// Pull the repo blobs out of the trending page markup.
pub fn extract_trending_repos(html: &str) -> Vec<TrendingRepo> {
    static RE_BLOB: OnceCell<Regex> = OnceCell::new();
    static RE_NAME: OnceCell<Regex> = OnceCell::new();
    static RE_DESC: OnceCell<Regex> = OnceCell::new();
    static RE_LANG: OnceCell<Regex> = OnceCell::new();
    static RE_STARS: OnceCell<Regex> = OnceCell::new();
    static RE_FORKS: OnceCell<Regex> = OnceCell::new();

    let re_blob = RE_BLOB
        .get_or_init(|| Regex::new(r#"(?s)<article class="Box-row".*?</article>"#).unwrap());
    let re_name =
        RE_NAME.get_or_init(|| Regex::new(r#"(?s)<h2[^>]*>.*?<a[^>]*href="([^"]+)""#).unwrap());
    let re_desc =
        RE_DESC.get_or_init(|| Regex::new(r#"(?s)<p[^>]*class="col-9[^"]*"[^>]*>(.*?)</p>"#).unwrap());
    let re_lang = RE_LANG.get_or_init(|| {
        Regex::new(r#"<span[^>]*itemprop="programmingLanguage"[^>]*>([^<]*)</span>"#).unwrap()
    });
    let re_stars = RE_STARS
        .get_or_init(|| Regex::new(r#"(?s)<a[^>]*href="[^"]*/stargazers"[^>]*>(.*?)</a>"#).unwrap());
    let re_forks = RE_FORKS
        .get_or_init(|| Regex::new(r#"(?s)<a[^>]*href="[^"]*/forks"[^>]*>(.*?)</a>"#).unwrap());

    let mut out = Vec::new();
    for blob in re_blob.find_iter(html) {
        let blob = blob.as_str();
        let Some(name) = re_name.captures(blob).map(|c| c[1].to_string()) else {
            continue;
        };
        let capture = |re: &Regex| {
            re.captures(blob)
                .map(|c| normalize_text(&c[1], 0))
                .unwrap_or_default()
        };
        out.push(TrendingRepo {
            url: format!("https://github.com{name}"),
            desc: capture(re_desc),
            lang: capture(re_lang),
            stars: capture(re_stars),
            forks: capture(re_forks),
            name,
        });
    }
    out
}
