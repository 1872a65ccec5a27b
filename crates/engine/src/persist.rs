// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-behind persistence.
//!
//! Saves are handed to a background writer over an unbounded channel so a
//! slow or failing store never holds up orchestration. The writer retries
//! each save with backoff and logs it once attempts run out.

use crate::config::RetryPolicy;
use flow_adapters::{JobStore, StoreError};
use flow_core::{Job, JobId, NodeResult};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum PersistOp {
    SaveJob(Box<Job>),
    SaveNodeResult(JobId, NodeResult),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Handle for queueing saves
#[derive(Clone)]
pub struct Persister {
    tx: mpsc::UnboundedSender<PersistOp>,
}

impl Persister {
    /// Spawn the writer task for `store`.
    pub fn spawn<S: JobStore>(store: S, policy: RetryPolicy) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_loop(store, policy, rx));
        (Self { tx }, handle)
    }

    /// Handle whose saves go nowhere, for embedding without a store.
    pub fn disabled() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    pub fn save_job(&self, job: Box<Job>) {
        self.send(PersistOp::SaveJob(job));
    }

    pub fn save_node_result(&self, job_id: JobId, result: NodeResult) {
        self.send(PersistOp::SaveNodeResult(job_id, result));
    }

    /// Wait until every save queued before this call was attempted.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(PersistOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Ask the writer to stop after the saves already queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(PersistOp::Shutdown);
    }

    fn send(&self, op: PersistOp) {
        if self.tx.send(op).is_err() {
            tracing::debug!("persistence writer gone, dropping save");
        }
    }
}

async fn write_loop<S: JobStore>(
    store: S,
    policy: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<PersistOp>,
) {
    while let Some(op) = rx.recv().await {
        match op {
            PersistOp::SaveJob(job) => {
                let job_id = job.id;
                let result = with_retry(&policy, || store.save_job(&job)).await;
                if let Err(e) = result {
                    tracing::error!(%job_id, error = %e, "giving up saving job");
                }
            }
            PersistOp::SaveNodeResult(job_id, node_result) => {
                let result =
                    with_retry(&policy, || store.save_node_result(job_id, &node_result)).await;
                if let Err(e) = result {
                    tracing::error!(
                        %job_id,
                        node = %node_result.path,
                        error = %e,
                        "giving up saving node result"
                    );
                }
            }
            PersistOp::Flush(done) => {
                let _ = done.send(());
            }
            PersistOp::Shutdown => break,
        }
    }
    tracing::debug!("persistence writer stopped");
}

async fn with_retry<F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<(), StoreError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), StoreError>>,
{
    let mut retry = 0;
    loop {
        match attempt().await {
            Ok(()) => return Ok(()),
            Err(e) if retry + 1 >= policy.max_attempts.max(1) => return Err(e),
            Err(e) => {
                retry += 1;
                let delay = policy.backoff(retry);
                tracing::warn!(
                    error = %e,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    "save failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
