// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor

use crate::correlation::CorrelationTable;
use crate::persist::Persister;
use crate::queue::{CommandQueue, QueueError};
use crate::registry::JobRegistry;
use flow_core::{CmdQueueItem, Effect};
use std::sync::Arc;

/// Runs effects against the shared queue, correlation table and store.
///
/// Only [`Executor::persist`] may run with a job lock held.
#[derive(Clone)]
pub struct Executor {
    pub(crate) queue: Arc<CommandQueue>,
    pub(crate) correlations: Arc<CorrelationTable>,
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) persister: Persister,
}

impl Executor {
    pub async fn execute_all(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute(effect).await;
        }
    }

    /// Hand persistence effects to the writer and return the others.
    ///
    /// Never waits, so it runs while the job's lock is held.
    pub fn persist(&self, effects: Vec<Effect>) -> Vec<Effect> {
        effects
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::SaveJob { job } => {
                    self.persister.save_job(job);
                    None
                }
                Effect::SaveNodeResult { job_id, result } => {
                    self.persister.save_node_result(job_id, result);
                    None
                }
                other => Some(other),
            })
            .collect()
    }

    /// Execute a single effect with tracing
    pub async fn execute(&self, effect: Effect) {
        if effect.verbose() {
            let info = effect
                .fields()
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" ");
            tracing::debug!("executing effect={} {}", effect.name(), info);
        }

        match effect {
            Effect::Dispatch { item } => {
                if let Err(e) = self.dispatch(item).await {
                    tracing::warn!(error = %e, "dispatch dropped");
                }
            }
            Effect::CancelQueued { job_id } => {
                self.queue.cancel(job_id);
            }
            Effect::PurgeCorrelations { job_id } => {
                let purged = self.correlations.purge_job(job_id);
                if purged > 0 {
                    tracing::debug!(%job_id, purged, "purged correlations");
                }
            }
            Effect::SaveJob { job } => self.persister.save_job(job),
            Effect::SaveNodeResult { job_id, result } => {
                self.persister.save_node_result(job_id, result)
            }
        }
    }

    /// Register the correlation and enqueue the command.
    ///
    /// The job may be stopped while this waits for queue space; the command
    /// is withdrawn again if the job ended in the meantime.
    pub async fn dispatch(&self, item: CmdQueueItem) -> Result<(), QueueError> {
        let job_id = item.job_id;
        let cmd_id = item.cmd_id.clone();
        self.correlations.register(&item);
        if let Err(e) = self.queue.enqueue(item).await {
            self.correlations.remove(&cmd_id);
            return Err(e);
        }

        let finished = match self.registry.slot(job_id) {
            Some(slot) => slot.lock().is_terminal(),
            None => true,
        };
        if finished {
            tracing::debug!(%job_id, %cmd_id, "job ended during dispatch, withdrawing command");
            self.queue.cancel(job_id);
            self.correlations.purge_job(job_id);
        }
        Ok(())
    }
}
