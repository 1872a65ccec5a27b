// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flow_adapters::{AgentAdapter, DefinitionSource, JobStore};
use flow_core::{Job, JobId, SystemClock};
use flow_engine::{EngineConfig, JobError, JobService, Persister, RetryPolicy};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::env;

/// Job service with the daemon's clock
pub type DaemonService = JobService<SystemClock>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/flow)
    pub state_dir: PathBuf,
    /// Directory of `<flow>.toml` definitions
    pub flows_dir: PathBuf,
    /// Per-command output captured by the shell agent
    pub logs_path: PathBuf,
    /// Daemon log directory; stderr when `None`
    pub log_dir: Option<PathBuf>,
    pub log_filter: String,
    pub queue_capacity: usize,
    pub allow_concurrent_builds: bool,
    pub agent_timeout: Duration,
    pub max_in_flight: usize,
    pub persist_retry: RetryPolicy,
    /// Finished jobs kept in memory per flow; all when `None`
    pub finished_jobs_kept: Option<usize>,
    pub drain_timeout: Duration,
}

impl Config {
    /// Configuration rooted at `state_dir` with every tunable at its default.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        let state_dir = state_dir.as_ref().to_path_buf();
        let engine = EngineConfig::default();
        Self {
            flows_dir: state_dir.join("flows"),
            logs_path: state_dir.join("logs"),
            log_dir: None,
            log_filter: "info".to_string(),
            queue_capacity: engine.queue_capacity,
            allow_concurrent_builds: engine.allow_concurrent_builds,
            agent_timeout: Duration::from_secs(3600),
            max_in_flight: 16,
            persist_retry: engine.persist_retry,
            finished_jobs_kept: engine.finished_jobs_kept,
            drain_timeout: Duration::from_secs(5),
            state_dir,
        }
    }

    /// Load configuration from `FLOW_*` environment variables.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        let defaults = Self::new(&state_dir);
        Ok(Self {
            flows_dir: env::flows_dir().unwrap_or(defaults.flows_dir),
            log_dir: env::log_dir(),
            log_filter: env::log_filter(),
            queue_capacity: env::queue_capacity(),
            allow_concurrent_builds: env::allow_concurrent_builds(),
            agent_timeout: env::agent_timeout(),
            max_in_flight: env::max_in_flight(),
            persist_retry: env::persist_retry(),
            finished_jobs_kept: env::finished_jobs_kept(),
            drain_timeout: env::drain_timeout(),
            ..defaults
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            finished_jobs_kept: self.finished_jobs_kept,
            ..EngineConfig::default()
                .queue_capacity(self.queue_capacity)
                .allow_concurrent_builds(self.allow_concurrent_builds)
                .persist_retry(self.persist_retry)
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to set up logging: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running daemon: the job service plus its dispatcher and writer tasks.
pub struct Daemon {
    pub config: Config,
    service: Arc<DaemonService>,
    cancel: CancellationToken,
    dispatcher: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Daemon {
    /// Build the process-scoped state and spawn the background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S: JobStore, A: AgentAdapter>(
        config: Config,
        definitions: Arc<dyn DefinitionSource>,
        store: S,
        agent: A,
    ) -> Result<Self, LifecycleError> {
        std::fs::create_dir_all(&config.state_dir)?;

        let (persister, writer) = Persister::spawn(store, config.persist_retry);
        let service = Arc::new(JobService::new(
            definitions,
            persister,
            config.engine_config(),
            SystemClock,
        ));
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            Arc::clone(&service),
            agent,
            config.agent_timeout,
            config.max_in_flight,
            cancel.clone(),
        )
        .spawn();

        info!(
            state_dir = %config.state_dir.display(),
            queue_capacity = config.queue_capacity,
            max_in_flight = config.max_in_flight,
            "daemon started"
        );
        Ok(Self { config, service, cancel, dispatcher, writer })
    }

    pub fn service(&self) -> &Arc<DaemonService> {
        &self.service
    }

    /// Poll until job `id` is finished.
    pub async fn wait_finished(&self, id: JobId, poll: Duration) -> Result<Job, JobError> {
        loop {
            let job = self.service.find(id)?;
            if job.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Shutdown the daemon gracefully.
    ///
    /// Commands still executing are abandoned. Queued saves get up to the
    /// drain timeout to reach the store; whatever is left after that is lost.
    pub async fn shutdown(self) {
        info!("Shutting down daemon...");
        self.cancel.cancel();
        self.service.shutdown();

        let Self { mut dispatcher, mut writer, config, .. } = self;
        let drained = tokio::time::timeout(config.drain_timeout, async {
            if let Err(e) = (&mut dispatcher).await {
                warn!(error = %e, "dispatcher task failed");
            }
            if let Err(e) = (&mut writer).await {
                warn!(error = %e, "persistence writer failed");
            }
        })
        .await;

        if drained.is_err() {
            warn!(timeout_ms = config.drain_timeout.as_millis() as u64, "drain timed out");
            dispatcher.abort();
            writer.abort();
        }
        info!("Daemon shutdown complete");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
