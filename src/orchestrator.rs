// src/orchestrator.rs
// Top-level supervisor: one task per source, one for the gatherer, one
// coordinated shutdown path.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, Result};
use crate::gatherer::Gatherer;
use crate::source::EventSource;

#[derive(Default)]
pub struct Orchestrator {
    sources: HashMap<String, Arc<dyn EventSource>>,
    gatherer: Option<Gatherer>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, source: Arc<dyn EventSource>) {
        self.sources.insert(source.name().to_string(), source);
    }

    pub fn set_gatherer(&mut self, gatherer: Gatherer) {
        self.gatherer = Some(gatherer);
    }

    /// Launch every source and the gatherer as independently cancellable
    /// tasks and wait for all of them to exit.
    ///
    /// On SIGINT/SIGTERM the gatherer's running flag is cleared first, so it
    /// drains its in-flight batch at its own cancellation point instead of
    /// being killed mid-dispatch; sources observe the shared token at their
    /// next loop boundary. Shutdown latency is therefore bounded by the
    /// slowest source's poll granularity.
    pub async fn run(mut self) -> Result<()> {
        if self.sources.is_empty() {
            tracing::error!("no sources are registered, refusing to start");
            return Err(PipelineError::config("no sources registered"));
        }
        let Some(mut gatherer) = self.gatherer.take() else {
            tracing::error!("no gatherer is set, refusing to start");
            return Err(PipelineError::config("no gatherer set"));
        };

        let cancel = CancellationToken::new();
        let running = gatherer.running_flag();
        let mut tasks = JoinSet::new();

        for (name, source) in self.sources.drain() {
            let token = cancel.clone();
            tasks.spawn(async move {
                tracing::info!(source = %name, "source task started");
                if let Err(e) = source.run(token).await {
                    tracing::error!(error = ?e, source = %name, "source exited with error");
                }
                if let Err(e) = source.cleanup().await {
                    tracing::warn!(error = ?e, source = %name, "source cleanup failed");
                }
            });
        }
        tasks.spawn(async move {
            if let Err(e) = gatherer.run().await {
                tracing::error!(error = ?e, "gatherer exited with error");
            }
        });
        tracing::info!(sources = tasks.len() - 1, "pipeline running");

        // Signal watcher: flips the gatherer flag and cancels every source.
        let drain_running = Arc::clone(&running);
        let drain_cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received, draining");
            drain_running.store(false, Ordering::SeqCst);
            drain_cancel.cancel();
        });

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = ?e, "task panicked");
            }
        }
        tracing::info!("all tasks exited, pipeline stopped");
        Ok(())
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}
