// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence of job and node-result records.
//!
//! The orchestrator keeps the authoritative state in memory and writes
//! behind through a [`JobStore`]; stores never feed back into orchestration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flow_core::{Job, JobId, NodeResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Write side of the job record store.
#[async_trait]
pub trait JobStore: Clone + Send + Sync + 'static {
    /// Persist the full job snapshot, replacing any earlier one
    async fn save_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Persist one node result transition
    async fn save_node_result(&self, job_id: JobId, result: &NodeResult)
        -> Result<(), StoreError>;
}

/// On-disk snapshot of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredJob {
    pub saved_at: DateTime<Utc>,
    pub job: Job,
}

/// File-backed store.
///
/// Layout under the root directory:
/// - `jobs/<id>.json`: latest job snapshot, replaced atomically
/// - `jobs/<id>.results.jsonl`: node result transitions, one per line
#[derive(Clone, Debug)]
pub struct FileJobStore {
    root: PathBuf,
}

impl FileJobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn jobs_dir(&self) -> PathBuf {
        self.root.join("jobs")
    }

    fn job_path(&self, id: JobId) -> PathBuf {
        self.jobs_dir().join(format!("{id}.json"))
    }

    fn results_path(&self, id: JobId) -> PathBuf {
        self.jobs_dir().join(format!("{id}.results.jsonl"))
    }

    /// Read back the latest snapshot of a job, if one was saved.
    pub async fn load_job(&self, id: JobId) -> Result<Option<StoredJob>, StoreError> {
        match tokio::fs::read(self.job_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every node result transition recorded for a job, oldest first.
    pub async fn load_node_results(&self, id: JobId) -> Result<Vec<NodeResult>, StoreError> {
        let content = match tokio::fs::read_to_string(self.results_path(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StoreError::from))
            .collect()
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(self.jobs_dir()).await?;
        let stored = StoredJob { saved_at: Utc::now(), job: job.clone() };
        let bytes = serde_json::to_vec_pretty(&stored)?;
        write_atomic(&self.job_path(job.id), &bytes).await
    }

    async fn save_node_result(
        &self,
        job_id: JobId,
        result: &NodeResult,
    ) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(self.jobs_dir()).await?;
        let mut line = serde_json::to_vec(result)?;
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.results_path(job_id))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{JobStore, StoreError};
    use async_trait::async_trait;
    use flow_core::{Job, JobId, NodeResult};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeStoreState {
        jobs: HashMap<JobId, Job>,
        job_saves: usize,
        results: Vec<(JobId, NodeResult)>,
        failures_left: u32,
        attempts: u32,
    }

    /// In-memory store recording every save
    #[derive(Clone, Default)]
    pub struct FakeJobStore {
        inner: Arc<Mutex<FakeStoreState>>,
    }

    impl FakeJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `n` save calls with `StoreError::Unavailable`
        pub fn fail_next(&self, n: u32) {
            self.inner.lock().failures_left = n;
        }

        /// Latest saved snapshot of a job
        pub fn job(&self, id: JobId) -> Option<Job> {
            self.inner.lock().jobs.get(&id).cloned()
        }

        pub fn job_saves(&self) -> usize {
            self.inner.lock().job_saves
        }

        /// Node results saved for a job, in save order
        pub fn node_results(&self, id: JobId) -> Vec<NodeResult> {
            self.inner
                .lock()
                .results
                .iter()
                .filter(|(job_id, _)| *job_id == id)
                .map(|(_, r)| r.clone())
                .collect()
        }

        /// Save calls made so far, including failed ones
        pub fn attempts(&self) -> u32 {
            self.inner.lock().attempts
        }

        fn check_failure(state: &mut FakeStoreState) -> Result<(), StoreError> {
            state.attempts += 1;
            if state.failures_left > 0 {
                state.failures_left -= 1;
                return Err(StoreError::Unavailable("injected failure".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl JobStore for FakeJobStore {
        async fn save_job(&self, job: &Job) -> Result<(), StoreError> {
            let mut state = self.inner.lock();
            Self::check_failure(&mut state)?;
            state.job_saves += 1;
            state.jobs.insert(job.id, job.clone());
            Ok(())
        }

        async fn save_node_result(
            &self,
            job_id: JobId,
            result: &NodeResult,
        ) -> Result<(), StoreError> {
            let mut state = self.inner.lock();
            Self::check_failure(&mut state)?;
            state.results.push((job_id, result.clone()));
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeJobStore;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
