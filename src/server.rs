use crate::classifier::Classifier;
use crate::config::Config;
use crate::forensics::ForensicWriter;
use crate::handlers::{handle_ct, handle_default, handle_dmarc, handle_preflight};
use crate::metric::MetricLogger;
use anyhow::Context;
use axum::routing::post;
use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Everything a request needs, built once at startup.
pub struct CollectorState {
    pub classifier: Classifier,
    pub metrics: MetricLogger,
    pub forensics: ForensicWriter,
}

impl CollectorState {
    pub fn new(classifier: Classifier, metrics: MetricLogger, forensics: ForensicWriter) -> Self {
        CollectorState {
            classifier,
            metrics,
            forensics,
        }
    }
}

pub struct Collector {
    state: Arc<CollectorState>,
}

impl Collector {
    pub fn new(state: CollectorState) -> Self {
        Collector {
            state: Arc::new(state),
        }
    }

    /// Stdout metrics plus the optional log file and forensics root.
    pub fn from_config(
        config: &Config,
        log_path: Option<&Path>,
        forensics_root: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let classifier = Classifier::new(config)?;
        let metrics = MetricLogger::from_log_path(log_path)?;
        if let Some(root) = &forensics_root {
            log::info!("Forensic capture enabled under {}", root.display());
        }
        let forensics = ForensicWriter::new(forensics_root);
        Ok(Collector::new(CollectorState::new(
            classifier, metrics, forensics,
        )))
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(
                "/report/ct",
                post(handle_ct).options(handle_preflight),
            )
            .route(
                "/report/default",
                post(handle_default).options(handle_preflight),
            )
            .route(
                "/report/dmarc",
                post(handle_dmarc).options(handle_preflight),
            )
            .with_state(self.state.clone())
    }

    pub async fn run(&self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        log::info!("Listening for reports on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        log::info!("Collector stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Received shutdown signal, stopping...");
}
