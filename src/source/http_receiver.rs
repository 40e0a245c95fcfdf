// src/source/http_receiver.rs
// Request-triggered producer: every accepted POST becomes exactly one
// record, normalized and sunk synchronously within the request lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::HttpReceiverConfig;
use crate::record::Information;
use crate::source::{EventSource, SourceSink};
use crate::util::{normalize_text, now_datetime};

#[derive(Clone)]
pub struct ReceiverState {
    sink: Arc<SourceSink>,
    http: reqwest::Client,
    truncate_chars: usize,
}

impl ReceiverState {
    pub fn new(sink: Arc<SourceSink>, truncate_chars: usize) -> Self {
        Self {
            sink,
            http: reqwest::Client::new(),
            truncate_chars,
        }
    }
}

pub fn router(state: ReceiverState) -> Router {
    Router::new()
        .route("/api/v1/url", post(check_url))
        .with_state(state)
}

async fn check_url(
    State(state): State<ReceiverState>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(url) = payload.get("url").and_then(Value::as_str) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing URL parameter" })),
        );
    };
    let result = match fetch_and_sink(&state, url).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = ?e, url, "url ingestion failed");
            "error"
        }
    };
    (StatusCode::OK, Json(json!({ "result": result })))
}

/// Fetch the url and, for html content, normalize it into one record.
/// Other content types are reported as "unknown"; their parsers live
/// outside this crate.
async fn fetch_and_sink(state: &ReceiverState, url: &str) -> anyhow::Result<&'static str> {
    let resp = state.http.get(url).send().await?.error_for_status()?;
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !content_type.contains("text/html") {
        tracing::debug!(url, %content_type, "unsupported content type");
        return Ok("unknown");
    }

    let body = resp.text().await?;
    let text = normalize_text(&body, state.truncate_chars);
    let record = Information::new("html", url, now_datetime(), url, text);
    state.sink.send(&record).await?;
    Ok("ok")
}

pub struct HttpReceiverSource {
    state: ReceiverState,
    cfg: HttpReceiverConfig,
}

impl HttpReceiverSource {
    pub fn new(sink: Arc<SourceSink>, cfg: HttpReceiverConfig) -> Self {
        Self {
            state: ReceiverState::new(sink, cfg.truncate_chars),
            cfg,
        }
    }
}

#[async_trait]
impl EventSource for HttpReceiverSource {
    fn name(&self) -> &'static str {
        "http-receiver"
    }

    async fn run(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let app = router(self.state.clone());
        let listener = tokio::net::TcpListener::bind(&self.cfg.bind_addr).await?;
        tracing::info!(addr = %self.cfg.bind_addr, "http receiver listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;
        tracing::info!(source = self.name(), "stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SimpleMessageQueue;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> ReceiverState {
        let sink = SourceSink::new(Arc::new(SimpleMessageQueue::new()));
        ReceiverState::new(Arc::new(sink), 0)
    }

    #[tokio::test]
    async fn missing_url_parameter_is_a_client_error() {
        let app = router(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/url")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"nope": true}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
