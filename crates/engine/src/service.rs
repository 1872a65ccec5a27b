// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job service: the operations exposed to API layers and transports.
//!
//! Every operation that changes a job follows the same shape: lock the
//! job's slot, run a [`JobOrchestrator`] transition and queue its saves,
//! release the lock, then execute the remaining effects.

use crate::config::EngineConfig;
use crate::correlation::CorrelationTable;
use crate::error::JobError;
use crate::executor::Executor;
use crate::orchestrator::{CallbackOutcome, DiscardReason, JobOrchestrator};
use crate::persist::Persister;
use crate::queue::CommandQueue;
use crate::registry::{JobRegistry, JobSlot};
use flow_adapters::{DefinitionError, DefinitionSource};
use flow_core::{
    Clock, CmdQueueItem, Effect, Job, JobId, NodePath, NodeResult, TreeError, PATH_SEPARATOR,
};
use parking_lot::Mutex;
use std::sync::Arc;

pub struct JobService<C: Clock> {
    definitions: Arc<dyn DefinitionSource>,
    registry: Arc<JobRegistry>,
    correlations: Arc<CorrelationTable>,
    queue: Arc<CommandQueue>,
    executor: Executor,
    clock: C,
    config: EngineConfig,
    /// Serializes the conflict check with job registration
    create_lock: Mutex<()>,
}

impl<C: Clock> JobService<C> {
    pub fn new(
        definitions: Arc<dyn DefinitionSource>,
        persister: Persister,
        config: EngineConfig,
        clock: C,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let correlations = Arc::new(CorrelationTable::new());
        let queue = Arc::new(CommandQueue::new(config.queue_capacity));
        let executor = Executor {
            queue: Arc::clone(&queue),
            correlations: Arc::clone(&correlations),
            registry: Arc::clone(&registry),
            persister,
        };
        Self {
            definitions,
            registry,
            correlations,
            queue,
            executor,
            clock,
            config,
            create_lock: Mutex::new(()),
        }
    }

    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn correlations(&self) -> &Arc<CorrelationTable> {
        &self.correlations
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a job for the flow that `path` belongs to and start it.
    ///
    /// `path` is a flow name or any node path inside the flow; the job
    /// always runs the whole flow.
    pub async fn create_job(&self, path: &str) -> Result<Job, JobError> {
        if self.queue.is_closed() {
            return Err(JobError::QueueClosed);
        }
        let flow = path.split(PATH_SEPARATOR).next().unwrap_or(path);
        let tree = self.definitions.load_tree(flow)?;
        if !tree.contains(path) {
            return Err(DefinitionError::Invalid(TreeError::NotFound(path.to_string())).into());
        }

        let slot = {
            let _guard = self.create_lock.lock();
            if !self.config.allow_concurrent_builds {
                if let Some(running) = self.registry.running_for(flow) {
                    return Err(JobError::Conflict {
                        flow: flow.to_string(),
                        build_number: running.build_number,
                        job_id: running.id,
                    });
                }
            }
            self.registry.create(tree, self.clock.epoch_ms())
        };
        if let Some(keep) = self.config.finished_jobs_kept {
            self.registry.evict_finished(flow, keep);
        }

        let ((job, ()), effects) = self.transition(&slot, |orch| orch.start());
        tracing::info!(job_id = %job.id, flow, build = job.build_number, "job created");
        self.executor.execute_all(effects).await;
        Ok(job)
    }

    /// Apply an agent's report for a dispatched command. Never fails;
    /// the outcome says whether the report changed anything.
    pub async fn callback(&self, item: CmdQueueItem) -> CallbackOutcome {
        if !item.status.is_terminal() {
            return match self.correlations.peek(&item) {
                Some(_) => {
                    tracing::debug!(
                        cmd_id = %item.cmd_id,
                        job_id = %item.job_id,
                        node = %item.node_path,
                        status = %item.status,
                        "command progress"
                    );
                    CallbackOutcome::Acknowledged
                }
                None => self.discard(&item, DiscardReason::UnknownCommand),
            };
        }

        let Some(correlation) = self.correlations.take(&item) else {
            return self.discard(&item, DiscardReason::UnknownCommand);
        };
        let Some(slot) = self.registry.slot(correlation.job_id) else {
            return self.discard(&item, DiscardReason::JobNotFound);
        };

        let ((_, outcome), effects) = self.transition(&slot, |orch| orch.apply_result(&item));
        if let CallbackOutcome::Discarded(reason) = outcome {
            return self.discard(&item, reason);
        }
        self.executor.execute_all(effects).await;
        outcome
    }

    fn discard(&self, item: &CmdQueueItem, reason: DiscardReason) -> CallbackOutcome {
        tracing::debug!(
            cmd_id = %item.cmd_id,
            job_id = %item.job_id,
            node = %item.node_path,
            status = %item.status,
            %reason,
            "callback discarded"
        );
        CallbackOutcome::Discarded(reason)
    }

    /// Schedule one node of a job, if its turn has come.
    pub async fn run(&self, job_id: JobId, path: &NodePath) -> Result<Job, JobError> {
        let slot = self.registry.slot(job_id).ok_or_else(|| JobError::job_not_found(job_id))?;
        let ((job, result), effects) = self.transition(&slot, |orch| orch.run(path));
        result.map_err(|e| JobError::NotFound(e.to_string()))?;
        self.executor.execute_all(effects).await;
        Ok(job)
    }

    pub fn find(&self, id: JobId) -> Result<Job, JobError> {
        self.registry.find(id).ok_or_else(|| JobError::job_not_found(id))
    }

    pub fn find_by_number(&self, flow: &str, build_number: u32) -> Result<Job, JobError> {
        self.registry
            .find_by_number(flow, build_number)
            .ok_or_else(|| JobError::build_not_found(flow, build_number))
    }

    /// Jobs of the union of `flow_path` and `flow_paths`, most recent first;
    /// every job when both are empty.
    pub fn list_jobs(&self, flow_path: Option<&str>, flow_paths: &[String]) -> Vec<Job> {
        self.registry.list(flow_path, flow_paths)
    }

    pub fn list_node_results(
        &self,
        flow: &str,
        build_number: u32,
    ) -> Result<Vec<NodeResult>, JobError> {
        self.registry
            .list_node_results(flow, build_number)
            .ok_or_else(|| JobError::build_not_found(flow, build_number))
    }

    /// Hand a command to the outbound queue, registering its correlation.
    ///
    /// Commands of finished jobs are dropped.
    pub async fn enter_queue(&self, item: CmdQueueItem) -> Result<(), JobError> {
        let job = self.find(item.job_id)?;
        if job.is_terminal() {
            tracing::debug!(
                job_id = %job.id,
                cmd_id = %item.cmd_id,
                "job finished, not queueing"
            );
            return Ok(());
        }
        self.executor.dispatch(item).await.map_err(JobError::from)
    }

    /// Stop a running build. Finished builds are returned unchanged.
    pub async fn stop_job(&self, flow: &str, build_number: u32) -> Result<Job, JobError> {
        let slot = self
            .registry
            .slot_by_number(flow, build_number)
            .ok_or_else(|| JobError::build_not_found(flow, build_number))?;
        let ((job, stopped), effects) = self.transition(&slot, |orch| orch.stop());
        if !stopped {
            tracing::debug!(job_id = %job.id, status = %job.status, "stop ignored");
        }
        self.executor.execute_all(effects).await;
        Ok(job)
    }

    /// Close the queue and forget all jobs and correlations.
    pub fn shutdown(&self) {
        self.queue.close();
        self.registry.clear();
        self.correlations.clear();
        self.executor.persister.shutdown();
    }

    /// Run one transition under the job's lock. Returns the snapshot taken
    /// before the lock was released, the transition's value, and the
    /// effects still to execute.
    ///
    /// Saves are handed to the writer before the lock is released, so a
    /// job's snapshots and node results are stored in transition order.
    fn transition<T>(
        &self,
        slot: &JobSlot,
        f: impl FnOnce(&mut JobOrchestrator<'_>) -> T,
    ) -> ((Job, T), Vec<Effect>) {
        let mut job = slot.lock();
        let mut orch = JobOrchestrator::new(&mut *job, self.clock.epoch_ms());
        let value = f(&mut orch);
        let effects = self.executor.persist(orch.into_effects());
        ((job.clone(), value), effects)
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
