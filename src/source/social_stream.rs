// src/source/social_stream.rs
// Push-driven listener on a filtered social stream. The remote API pushes
// line-delimited JSON over a long-lived HTTP response; events are rebuffered
// through an internal channel and sent to the sink like any polled source.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::SocialStreamConfig;
use crate::record::Information;
use crate::source::{EventSource, SourceSink};
use crate::util::now_datetime;

#[derive(Debug, Deserialize)]
struct StreamPayload {
    data: StreamEvent,
}

#[derive(Debug, Deserialize)]
pub struct StreamEvent {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RuleList {
    #[serde(default)]
    data: Vec<Rule>,
}

#[derive(Debug, Deserialize)]
struct Rule {
    id: String,
}

/// Transport client for the filtered stream: rule registration and the
/// long-lived event stream. The source owns one of these; it does not
/// inherit from it.
#[derive(Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    bearer_token: String,
    stream_url: String,
    rules_url: String,
}

impl StreamClient {
    pub fn new(bearer_token: String, cfg: &SocialStreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            bearer_token,
            stream_url: cfg.stream_url.clone(),
            rules_url: cfg.rules_url.clone(),
        }
    }

    /// Register filter rules with the remote stream.
    pub async fn register_rules(&self, rules: &[String]) -> anyhow::Result<()> {
        let add: Vec<_> = rules
            .iter()
            .map(|value| serde_json::json!({ "value": value }))
            .collect();
        let resp = self
            .http
            .post(&self.rules_url)
            .bearer_auth(&self.bearer_token)
            .json(&serde_json::json!({ "add": add }))
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(rules = rules.len(), status = %resp.status(), "stream rules registered");
        Ok(())
    }

    /// Fetch all currently registered rules and delete them.
    pub async fn deregister_all_rules(&self) -> anyhow::Result<()> {
        let listed: RuleList = self
            .http
            .get(&self.rules_url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if listed.data.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = listed.data.into_iter().map(|r| r.id).collect();
        self.http
            .post(&self.rules_url)
            .bearer_auth(&self.bearer_token)
            .json(&serde_json::json!({ "delete": { "ids": ids } }))
            .send()
            .await?
            .error_for_status()?;
        tracing::info!("stream rules deregistered");
        Ok(())
    }

    /// Read the stream and forward parsed events into `tx` until the
    /// connection drops, the receiver goes away, or the token cancels.
    pub async fn stream_into(
        &self,
        tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let resp = self
            .http
            .get(&self.stream_url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?
            .error_for_status()?;
        let mut body = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                chunk = body.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    buf.extend_from_slice(&bytes);
                    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        let line = line.trim();
                        if line.is_empty() {
                            // keep-alive newline
                            continue;
                        }
                        match serde_json::from_str::<StreamPayload>(line) {
                            Ok(payload) => {
                                if tx.send(payload.data).await.is_err() {
                                    return Ok(());
                                }
                            }
                            Err(e) => tracing::debug!(error = %e, "unparseable stream line"),
                        }
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            }
        }
    }
}

pub struct SocialStreamSource {
    sink: SourceSink,
    client: StreamClient,
    cfg: SocialStreamConfig,
}

impl SocialStreamSource {
    pub fn new(sink: SourceSink, client: StreamClient, cfg: SocialStreamConfig) -> Self {
        Self { sink, client, cfg }
    }
}

#[async_trait]
impl EventSource for SocialStreamSource {
    fn name(&self) -> &'static str {
        "social-stream"
    }

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        self.client.register_rules(&self.cfg.rules).await?;

        while !cancel.is_cancelled() {
            let (tx, mut rx) = mpsc::channel::<StreamEvent>(256);
            let client = self.client.clone();
            let stream_cancel = cancel.clone();
            let reader =
                tokio::spawn(async move { client.stream_into(tx, stream_cancel).await });

            while let Some(event) = rx.recv().await {
                let datetime = event.created_at.clone().unwrap_or_else(now_datetime);
                let record = Information::new("tweet", &event.id, datetime, "", &event.text);
                if let Err(e) = self.sink.send(&record).await {
                    tracing::warn!(error = ?e, id = %event.id, "failed to enqueue tweet");
                }
            }

            // Channel closed: the reader is done (EOF, error, or cancel).
            match reader.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = ?e, "stream connection dropped"),
                Err(e) => tracing::error!(error = ?e, "stream reader task failed"),
            }
            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(self.cfg.reconnect_delay_secs)) => {}
            }
        }
        tracing::info!(source = self.name(), "stopped");
        Ok(())
    }

    /// Deregister the remote rules. Safe even if `run` never started; the
    /// delete request simply finds nothing.
    async fn cleanup(&self) -> anyhow::Result<()> {
        self.client.deregister_all_rules().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_payload_parses_data_envelope() {
        let line = r#"{"data":{"id":"9","text":"hola","created_at":"2024-01-01T00:00:00Z"}}"#;
        let payload: StreamPayload = serde_json::from_str(line).unwrap();
        assert_eq!(payload.data.id, "9");
        assert_eq!(payload.data.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn rule_list_tolerates_missing_data() {
        let listed: RuleList = serde_json::from_str("{}").unwrap();
        assert!(listed.data.is_empty());
    }
}
