// src/source/arxiv_feed.rs
// Per-author polling of the arxiv Atom API with a lookback window.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::ArxivConfig;
use crate::record::Information;
use crate::source::{EventSource, SourceSink};
use crate::util::now_datetime;

const ARXIV_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    title: String,
    summary: String,
    published: String,
    updated: String,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

pub struct ArxivFeedSource {
    sink: SourceSink,
    http: reqwest::Client,
    cfg: ArxivConfig,
}

impl ArxivFeedSource {
    pub fn new(sink: SourceSink, cfg: ArxivConfig) -> Self {
        Self {
            sink,
            http: reqwest::Client::new(),
            cfg,
        }
    }

    fn query_url(&self, author: &str) -> String {
        let author_str = author.split_whitespace().collect::<Vec<_>>().join("%20");
        format!(
            "http://export.arxiv.org/api/query?search_query=au:%22{author_str}%22&max_results={}&sortBy=submittedDate&sortOrder=descending",
            self.cfg.max_results
        )
    }

    async fn fetch_feed(&self, url: &str, cancel: &CancellationToken) -> anyhow::Result<Feed> {
        let body = match self.http.get(url).send().await {
            Ok(resp) => resp.error_for_status()?.text().await?,
            Err(e) => {
                // Disconnects here usually mean the rate limit; pause and
                // retry once.
                tracing::warn!(error = ?e, "arxiv query failed, retrying after pause");
                tokio::select! {
                    _ = cancel.cancelled() => anyhow::bail!("cancelled during rate-limit pause"),
                    _ = tokio::time::sleep(RATE_LIMIT_PAUSE) => {}
                }
                self.http.get(url).send().await?.error_for_status()?.text().await?
            }
        };
        parse_feed(&body)
    }

    async fn check_author(&self, author: &str, cancel: &CancellationToken) -> anyhow::Result<usize> {
        let feed = self.fetch_feed(&self.query_url(author), cancel).await?;
        let mut sent = 0usize;
        for entry in feed.entries {
            if cancel.is_cancelled() {
                break;
            }
            if !within_lookback(&entry.published, self.cfg.days_lookback) {
                continue;
            }
            let title = entry.title.replace('\n', " ").trim().to_string();
            let authors = entry
                .authors
                .iter()
                .map(|a| a.name.trim())
                .collect::<Vec<_>>()
                .join(", ");
            let content = format!(
                "Title: {title}\n\nAuthors: {authors}\n\nAbstract: {}",
                entry.summary.trim()
            );
            let record = Information::new("arxiv", &title, now_datetime(), &entry.id, content)
                .with_extra("paper_published", entry.published.as_str())
                .with_extra("paper_updated", entry.updated.as_str());
            match self.sink.send(&record).await {
                Ok(true) => sent += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(error = ?e, %title, "failed to enqueue paper"),
            }
        }
        Ok(sent)
    }
}

#[async_trait]
impl EventSource for ArxivFeedSource {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        loop {
            for (idx, author) in self.cfg.authors.iter().enumerate() {
                if cancel.is_cancelled() {
                    tracing::info!(source = self.name(), "stopped");
                    return Ok(());
                }
                tracing::info!(
                    idx = idx + 1,
                    total = self.cfg.authors.len(),
                    author = author.as_str(),
                    "checking published papers"
                );
                match self.check_author(author, &cancel).await {
                    Ok(sent) => tracing::debug!(author = author.as_str(), sent, "author checked"),
                    Err(e) => {
                        tracing::warn!(error = ?e, author = author.as_str(), "author check failed")
                    }
                }
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(source = self.name(), "stopped");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(Duration::from_secs(self.cfg.per_author_delay_secs)) => {}
                }
            }
            tracing::info!(
                next_check_secs = self.cfg.check_interval_secs,
                "arxiv pass finished"
            );
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

fn parse_feed(xml: &str) -> anyhow::Result<Feed> {
    use anyhow::Context;
    from_str(xml).context("parsing arxiv atom feed")
}

/// Keep only papers published within the lookback window.
fn within_lookback(published: &str, days: i64) -> bool {
    let Ok(published) = NaiveDateTime::parse_from_str(published, ARXIV_TIME_FORMAT) else {
        // Unparseable timestamps pass; better a stale paper than a lost one.
        return true;
    };
    Utc::now().naive_utc() - published <= chrono::Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
      <feed xmlns="http://www.w3.org/2005/Atom">
        <title>ArXiv Query</title>
        <entry>
          <id>http://arxiv.org/abs/2401.00001v1</id>
          <title>Attention Is Not Enough</title>
          <summary>We revisit attention.</summary>
          <published>2024-01-02T10:00:00Z</published>
          <updated>2024-01-03T10:00:00Z</updated>
          <author><name>Ada Lovelace</name></author>
          <author><name>Alan Turing</name></author>
        </entry>
      </feed>"#;

    #[test]
    fn parses_atom_entries() {
        let feed = parse_feed(FEED).unwrap();
        assert_eq!(feed.entries.len(), 1);
        let entry = &feed.entries[0];
        assert_eq!(entry.title, "Attention Is Not Enough");
        assert_eq!(entry.authors.len(), 2);
        assert_eq!(entry.authors[1].name, "Alan Turing");
    }

    #[test]
    fn lookback_window_filters_old_papers() {
        let recent = Utc::now().format(ARXIV_TIME_FORMAT).to_string();
        assert!(within_lookback(&recent, 90));
        assert!(!within_lookback("2001-01-01T00:00:00Z", 90));
        // Malformed timestamps are kept.
        assert!(within_lookback("yesterday", 90));
    }
}
