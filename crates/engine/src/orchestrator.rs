// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle state machine.
//!
//! A [`JobOrchestrator`] borrows one job for the duration of a single
//! operation, made while the caller holds that job's lock. It keeps no
//! state of its own: what runs next is always rebuilt from the job's node
//! results, so a job restored from a snapshot continues where it left off.
//!
//! Transitions never perform I/O. They return [`Effect`]s for the caller to
//! execute after releasing the lock.

use crate::runner::{self, NodeStart};
use flow_core::{CmdQueueItem, Effect, Job, JobStatus, NodePath, NodeStatus, TreeError};

/// What happened to a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Terminal status recorded on the node
    Applied,
    /// Intermediate status seen; the node keeps running
    Acknowledged,
    Discarded(DiscardReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// No outstanding command with that id (duplicate, late or forged)
    UnknownCommand,
    JobNotFound,
    /// The job already ended
    JobFinished,
    /// The node is not waiting on this command
    StaleResult,
}

flow_core::simple_display! {
    DiscardReason {
        UnknownCommand => "unknown command",
        JobNotFound => "job not found",
        JobFinished => "job finished",
        StaleResult => "stale result",
    }
}

pub struct JobOrchestrator<'a> {
    job: &'a mut Job,
    now_ms: u64,
    effects: Vec<Effect>,
}

impl<'a> JobOrchestrator<'a> {
    pub fn new(job: &'a mut Job, now_ms: u64) -> Self {
        Self { job, now_ms, effects: Vec::new() }
    }

    /// Effects produced so far, in the order they must run
    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }

    /// Start the job at its root.
    pub fn start(&mut self) {
        let root = self.job.root.clone();
        self.run_node(&root);
    }

    /// Schedule `path`.
    ///
    /// No-op when the job has ended, the node was already scheduled, or its
    /// turn has not come (the previous sibling is still unfinished or the
    /// parent is not running).
    pub fn run(&mut self, path: &NodePath) -> Result<(), TreeError> {
        self.job.tree.resolve(path.as_str())?;
        if !self.is_turn_of(path) {
            tracing::debug!(job_id = %self.job.id, node = %path, "node not runnable now");
            return Ok(());
        }
        self.run_node(path);
        Ok(())
    }

    fn is_turn_of(&self, path: &NodePath) -> bool {
        if self.job.node_status(path.as_str()) != NodeStatus::Pending {
            return false;
        }
        let Some(parent) = path.parent() else {
            return true;
        };
        let previous_done = match self.job.tree.previous_sibling(path) {
            Some(prev) => self.job.node_status(prev.path.as_str()).is_terminal(),
            None => true,
        };
        previous_done && self.job.node_status(parent.as_str()) == NodeStatus::Running
    }

    fn run_node(&mut self, path: &NodePath) {
        if self.job.is_terminal() {
            return;
        }
        let Some(node) = self.job.tree.get(path.as_str()).cloned() else {
            return;
        };

        if self.job.status == JobStatus::Created {
            self.job.status = JobStatus::Running;
            tracing::info!(
                job_id = %self.job.id,
                flow = %self.job.flow,
                build = self.job.build_number,
                "job running"
            );
            self.save_job();
        }
        if !self.job.result_mut(path).start(self.now_ms) {
            return;
        }

        let start = runner::start_node(self.job, &node);
        if let NodeStart::Dispatch(item) = &start {
            self.job.result_mut(path).cmd_id = Some(item.cmd_id.clone());
        }
        self.save_result(path);

        match start {
            NodeStart::Dispatch(item) => {
                tracing::info!(
                    job_id = %self.job.id,
                    node = %path,
                    cmd_id = %item.cmd_id,
                    "dispatching step"
                );
                self.effects.push(Effect::Dispatch { item });
            }
            NodeStart::Descend(child) => self.run_node(&child),
            NodeStart::Finished(status) => self.complete(path, status),
        }
    }

    /// Apply a terminal callback whose correlation was already taken.
    pub fn apply_result(&mut self, item: &CmdQueueItem) -> CallbackOutcome {
        if self.job.is_terminal() {
            return CallbackOutcome::Discarded(DiscardReason::JobFinished);
        }
        let Some(status) = runner::interpret(item.status) else {
            return CallbackOutcome::Acknowledged;
        };
        let path = &item.node_path;
        let waiting = self.job.result(path.as_str()).is_some_and(|r| {
            r.status == NodeStatus::Running && r.cmd_id.as_ref() == Some(&item.cmd_id)
        });
        if !waiting {
            return CallbackOutcome::Discarded(DiscardReason::StaleResult);
        }

        let result = self.job.result_mut(path);
        result.exit_code = item.exit_code;
        if item.log_ref.is_some() {
            result.log_ref = item.log_ref.clone();
        }
        tracing::info!(
            job_id = %self.job.id,
            node = %path,
            cmd_id = %item.cmd_id,
            status = %status,
            exit_code = ?item.exit_code,
            "step finished"
        );
        self.complete(path, status);
        CallbackOutcome::Applied
    }

    /// Record a terminal status on `path` and move on from there.
    fn complete(&mut self, path: &NodePath, status: NodeStatus) {
        if !self.job.result_mut(path).finish(status, self.now_ms) {
            return;
        }
        self.save_result(path);

        match path.parent() {
            Some(parent) => self.advance(&parent),
            None => self.finish_job(status),
        }
    }

    /// Decide what `parent` does after one of its children ended.
    fn advance(&mut self, parent_path: &NodePath) {
        if self.job.is_terminal() {
            return;
        }
        let Some(parent) = self.job.tree.get(parent_path.as_str()).cloned() else {
            return;
        };

        for child in &parent.children {
            let status = self.job.node_status(child.as_str());
            match status {
                NodeStatus::Running => return,
                NodeStatus::Pending => {
                    self.run_node(child);
                    return;
                }
                NodeStatus::Stopped => {
                    self.skip_after(child);
                    self.complete(parent_path, NodeStatus::Stopped);
                    return;
                }
                s if s.is_failure() && !parent.allow_failure => {
                    self.skip_after(child);
                    self.complete(parent_path, s);
                    return;
                }
                _ => {}
            }
        }
        // Every child ended and none short-circuited
        self.complete(parent_path, NodeStatus::Success);
    }

    /// Mark every sibling after `child` skipped
    fn skip_after(&mut self, child: &NodePath) {
        let rest: Vec<NodePath> =
            self.job.tree.following_siblings(child).into_iter().map(|n| n.path.clone()).collect();
        for sibling in &rest {
            if self.job.result_mut(sibling).finish(NodeStatus::Skipped, self.now_ms) {
                self.save_result(sibling);
            }
        }
    }

    fn finish_job(&mut self, root_status: NodeStatus) {
        let Some(status) = root_status.job_status() else {
            return;
        };
        if !self.job.finish(status, self.now_ms) {
            return;
        }
        tracing::info!(
            job_id = %self.job.id,
            flow = %self.job.flow,
            build = self.job.build_number,
            %status,
            "job finished"
        );
        self.close();
    }

    /// Stop a running job: the job and every pending or running node become
    /// `Stopped`. Returns false (and changes nothing) unless it was running.
    pub fn stop(&mut self) -> bool {
        if self.job.status != JobStatus::Running {
            return false;
        }
        let open: Vec<NodePath> = self
            .job
            .node_results()
            .into_iter()
            .filter(|r| !r.is_terminal())
            .map(|r| r.path)
            .collect();
        for path in &open {
            if self.job.result_mut(path).finish(NodeStatus::Stopped, self.now_ms) {
                self.save_result(path);
            }
        }
        self.job.finish(JobStatus::Stopped, self.now_ms);
        tracing::info!(
            job_id = %self.job.id,
            flow = %self.job.flow,
            build = self.job.build_number,
            "job stopped"
        );
        self.close();
        true
    }

    fn close(&mut self) {
        self.save_job();
        let job_id = self.job.id;
        self.effects.push(Effect::CancelQueued { job_id });
        self.effects.push(Effect::PurgeCorrelations { job_id });
    }

    fn save_job(&mut self) {
        self.effects.push(Effect::SaveJob { job: Box::new(self.job.clone()) });
    }

    fn save_result(&mut self, path: &NodePath) {
        if let Some(result) = self.job.result(path.as_str()) {
            let effect = Effect::SaveNodeResult { job_id: self.job.id, result: result.clone() };
            self.effects.push(effect);
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
